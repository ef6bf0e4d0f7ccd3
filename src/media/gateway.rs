use super::assemble::item_title;
use super::error::MediaError;
use super::extractor::{guarded, ByteStream, Target};
use super::formats::merge_container;
use super::merge::MergeToolMissing;
use super::types::{RawEntry, RawFormat};
use super::{validate_url, MediaGateway};
use crate::utils::{attachment_filename, content_type_for};
use futures::StreamExt;
use std::fmt;
use std::path::Path;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Selector handed to the collaborator when it may fetch and merge by itself.
const BEST_MERGED_SELECTOR: &str = "bestvideo*+bestaudio/best";
const BEST_SINGLE_SELECTOR: &str = "best";

/// Everything needed to re-derive one download: no server-side session state.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub index: Option<usize>,
    pub format_id: Option<String>,
}

pub struct Download {
    pub filename: String,
    pub content_type: &'static str,
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatChoice {
    Best,
    Single(String),
    Merge { video: String, audio: String },
}

impl FormatChoice {
    pub fn parse(format_id: Option<&str>) -> Result<Self, MediaError> {
        let format_id = format_id.map(str::trim).unwrap_or("");
        if format_id.is_empty() || format_id == "best" {
            return Ok(FormatChoice::Best);
        }

        match format_id.split_once('+') {
            Some((video, audio)) if !video.is_empty() && !audio.is_empty() => {
                Ok(FormatChoice::Merge {
                    video: video.to_string(),
                    audio: audio.to_string(),
                })
            }
            Some(_) => Err(MediaError::InvalidInput(
                "Format identifier is malformed.".to_string(),
            )),
            None => Ok(FormatChoice::Single(format_id.to_string())),
        }
    }
}

impl MediaGateway {
    /// Re-resolve `request.url` from scratch and stream the chosen format.
    pub async fn download(&self, request: DownloadRequest) -> Result<Download, MediaError> {
        let (source_url, platform) = validate_url(&request.url)?;
        let choice = FormatChoice::parse(request.format_id.as_deref())?;

        if matches!(choice, FormatChoice::Merge { .. }) && !self.ffmpeg_available {
            return Err(MediaError::MergeUnavailable);
        }

        info!(
            "Download requested for {} URL: {} (item {:?}, format {:?})",
            platform, source_url, request.index, choice
        );

        let metadata = self.extractor.extract(&source_url).await?;
        let count = metadata.entries.len();
        if count == 0 {
            return Err(MediaError::NoDownloadableMedia);
        }

        let index = match request.index {
            Some(index) => index,
            None if count == 1 => 1,
            None => {
                return Err(MediaError::InvalidInput(
                    "This URL has multiple items. Include ?index=1 (or another item number)."
                        .to_string(),
                ))
            }
        };
        if index < 1 || index > count {
            return Err(MediaError::ItemNotFound { index, count });
        }

        let entry = &metadata.entries[index - 1];
        let title = item_title(entry, index);
        let target = Target {
            url: &source_url,
            index,
            item_count: count,
        };

        let download = match choice {
            FormatChoice::Best => self.fetch_best(target, entry, &title).await?,
            FormatChoice::Single(id) => {
                let format = lookup(entry, &id)?;
                let body = prime(self.open_format(target, format).await?).await?;
                Download {
                    filename: attachment_filename(&title, &format.container),
                    content_type: content_type_for(&format.container),
                    content_length: None,
                    body,
                }
            }
            FormatChoice::Merge { video, audio } => {
                let video = lookup(entry, &video).and_then(|f| {
                    f.has_video()
                        .then_some(f)
                        .ok_or_else(|| MediaError::FormatNotFound(f.format_id.clone()))
                })?;
                let audio = lookup(entry, &audio).and_then(|f| {
                    f.has_audio()
                        .then_some(f)
                        .ok_or_else(|| MediaError::FormatNotFound(f.format_id.clone()))
                })?;
                self.fetch_merged(target, video, audio, &title).await?
            }
        };

        info!(
            "Serving {} ({}) for {}",
            download.filename, download.content_type, source_url
        );
        Ok(Download {
            body: log_stream_errors(download.body, download.filename.clone()),
            ..download
        })
    }

    async fn fetch_best(
        &self,
        target: Target<'_>,
        entry: &RawEntry,
        title: &str,
    ) -> Result<Download, MediaError> {
        if self.ffmpeg_available {
            let scratch = self.scratch()?;
            let produced = self
                .extractor
                .download_into(target, BEST_MERGED_SELECTOR, scratch.path())
                .await?;
            let ext = produced
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_string)
                .or_else(|| entry.ext.clone())
                .unwrap_or_default();
            return file_download(scratch, &produced, title, &ext).await;
        }

        let body = prime(
            self.extractor
                .stream(target, BEST_SINGLE_SELECTOR)
                .await?,
        )
        .await?;
        let ext = entry.ext.as_deref().unwrap_or("mp4");
        Ok(Download {
            filename: attachment_filename(title, ext),
            content_type: content_type_for(ext),
            content_length: None,
            body,
        })
    }

    async fn fetch_merged(
        &self,
        target: Target<'_>,
        video: &RawFormat,
        audio: &RawFormat,
        title: &str,
    ) -> Result<Download, MediaError> {
        let scratch = self.scratch()?;
        let video_path = scratch.path().join(format!("video.{}", video.container));
        let audio_path = scratch.path().join(format!("audio.{}", audio.container));

        tokio::try_join!(
            self.fetch_to_file(target, video, &video_path),
            self.fetch_to_file(target, audio, &audio_path),
        )?;

        let container = merge_container(&video.container, &audio.container);
        let output = scratch.path().join(format!("merged.{}", container));
        self.merger
            .merge(&video_path, &audio_path, &output)
            .await
            .map_err(|e| match e.downcast_ref::<MergeToolMissing>() {
                Some(missing) => {
                    warn!("Merge requested but {}", missing);
                    MediaError::MergeUnavailable
                }
                None => MediaError::StreamFailure(format!("{:#}", e)),
            })?;

        file_download(scratch, &output, title, container).await
    }

    async fn open_format(
        &self,
        target: Target<'_>,
        format: &RawFormat,
    ) -> Result<ByteStream, MediaError> {
        match format.direct_http_url() {
            Some(url) => self
                .fetcher
                .open(url, &format.http_headers)
                .await
                .map_err(|e| MediaError::StreamFailure(format!("{:#}", e))),
            None => Ok(self.extractor.stream(target, &format.format_id).await?),
        }
    }

    async fn fetch_to_file(
        &self,
        target: Target<'_>,
        format: &RawFormat,
        path: &Path,
    ) -> Result<(), MediaError> {
        let stream = self.open_format(target, format).await?;
        let written = write_stream(stream, path)
            .await
            .map_err(|e| MediaError::StreamFailure(format!("Failed to fetch {}: {}", format.format_id, e)))?;

        if written == 0 {
            return Err(MediaError::StreamFailure(format!(
                "format {} produced no data",
                format.format_id
            )));
        }
        debug!("Fetched format {} ({} bytes)", format.format_id, written);
        Ok(())
    }

    /// Private scratch directory for one request, removed when dropped.
    fn scratch(&self) -> Result<TempDir, MediaError> {
        tempfile::Builder::new()
            .prefix("download-")
            .tempdir_in(&self.scratch_root)
            .map_err(|e| MediaError::StreamFailure(format!("Failed to create scratch directory: {}", e)))
    }
}

fn lookup<'a>(entry: &'a RawEntry, format_id: &str) -> Result<&'a RawFormat, MediaError> {
    entry
        .find_format(format_id)
        .ok_or_else(|| MediaError::FormatNotFound(format_id.to_string()))
}

async fn write_stream(mut stream: ByteStream, path: &Path) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Stream a finished scratch file; the scratch directory lives until the body is dropped.
async fn file_download(
    scratch: TempDir,
    path: &Path,
    title: &str,
    ext: &str,
) -> Result<Download, MediaError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| MediaError::StreamFailure(format!("Failed to open {}: {}", path.display(), e)))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| MediaError::StreamFailure(e.to_string()))?
        .len();
    if length == 0 {
        return Err(MediaError::StreamFailure(format!(
            "{} is empty",
            path.display()
        )));
    }

    Ok(Download {
        filename: attachment_filename(title, ext),
        content_type: content_type_for(ext),
        content_length: Some(length),
        body: guarded(Box::pin(ReaderStream::new(file)), scratch),
    })
}

/// Wait for the first non-empty chunk so an upstream that dies before sending
/// anything becomes an error response instead of an empty attachment.
async fn prime(mut stream: ByteStream) -> Result<ByteStream, MediaError> {
    loop {
        match stream.next().await {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => {
                let first = futures::stream::once(futures::future::ready(Ok(chunk)));
                return Ok(Box::pin(first.chain(stream)));
            }
            Some(Err(e)) => return Err(MediaError::StreamFailure(e.to_string())),
            None => {
                return Err(MediaError::StreamFailure(
                    "upstream stream ended before sending any data".to_string(),
                ))
            }
        }
    }
}

fn log_stream_errors(body: ByteStream, filename: String) -> ByteStream {
    Box::pin(body.inspect(move |chunk| {
        if let Err(e) = chunk {
            warn!("Stream for {} failed mid-transfer: {}", filename, e);
        }
    }))
}
