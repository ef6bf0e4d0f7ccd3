mod assemble;
mod cookies;
mod error;
mod extractor;
mod fetch;
mod formats;
mod gateway;
mod merge;
mod platform;
pub(crate) mod types;
mod ytdlp;

#[cfg(test)]
pub(crate) mod testing;

pub use cookies::provision;
pub use error::{ExtractionError, MediaError};
pub use gateway::DownloadRequest;
pub use merge::{FfmpegMerger, Merger};
pub use types::ResolutionResult;
pub use ytdlp::YtDlpExtractor;

use anyhow::{Context, Result};
use extractor::Extractor;
use fetch::HttpFetcher;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use types::PlatformId;

/// Entry point for both request kinds. Holds no per-request state: the
/// readiness flag and collaborators are fixed at startup and only read.
pub struct MediaGateway {
    extractor: Arc<dyn Extractor>,
    merger: Arc<dyn Merger>,
    fetcher: HttpFetcher,
    ffmpeg_available: bool,
    scratch_root: PathBuf,
}

impl MediaGateway {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        merger: Arc<dyn Merger>,
        ffmpeg_available: bool,
        scratch_root: PathBuf,
    ) -> Result<Self> {
        std::fs::create_dir_all(&scratch_root).with_context(|| {
            format!("Failed to create scratch directory {}", scratch_root.display())
        })?;

        info!(
            "Media gateway initialized - extractor: {}, ffmpeg available: {}, scratch: {}",
            extractor.name(),
            ffmpeg_available,
            scratch_root.display()
        );

        Ok(Self {
            extractor,
            merger,
            fetcher: HttpFetcher::new()?,
            ffmpeg_available,
            scratch_root,
        })
    }

    pub fn ffmpeg_available(&self) -> bool {
        self.ffmpeg_available
    }

    /// Resolve a URL into its media items and download options.
    pub async fn analyze(&self, url: &str) -> std::result::Result<ResolutionResult, MediaError> {
        let (source_url, platform) = validate_url(url)?;
        info!("Analyzing {} URL: {}", platform, source_url);

        let metadata = self.extractor.extract(&source_url).await?;
        if metadata.entries.is_empty() {
            return Err(MediaError::NoDownloadableMedia);
        }

        let result = assemble::assemble(&metadata, platform, &source_url, self.ffmpeg_available);
        info!(
            "Resolved {} item(s) for {}",
            result.items.len(),
            source_url
        );
        Ok(result)
    }
}

/// Canonical URL plus its platform, or the request-level failure.
fn validate_url(url: &str) -> std::result::Result<(String, PlatformId), MediaError> {
    if url.trim().is_empty() {
        return Err(MediaError::InvalidInput("Enter a URL.".to_string()));
    }

    let parsed = platform::parse_web_url(url).ok_or_else(|| {
        MediaError::InvalidInput("Enter a valid http(s) URL.".to_string())
    })?;
    let source_url = parsed.to_string();

    match platform::resolve(&source_url) {
        PlatformId::Unknown => Err(MediaError::UnsupportedPlatform(
            platform::supported_names(),
        )),
        platform => Ok((source_url, platform)),
    }
}
