use super::error::ExtractionError;
use super::types::RawMetadata;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Lazily produced, non-restartable media bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Which entry of an extraction result a fetch is for.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub url: &'a str,
    /// 1-based.
    pub index: usize,
    pub item_count: usize,
}

impl Target<'_> {
    pub fn is_playlist(&self) -> bool {
        self.item_count > 1
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable name of the extractor
    fn name(&self) -> &'static str;

    /// Resolve a URL into metadata and format catalogs. Exactly one collaborator call.
    async fn extract(&self, url: &str) -> Result<RawMetadata, ExtractionError>;

    /// Stream the bytes of `selector` for one entry straight from the collaborator.
    async fn stream(&self, target: Target<'_>, selector: &str) -> Result<ByteStream, ExtractionError>;

    /// Let the collaborator download (and merge, if it can) `selector` into `dir`.
    /// Returns the produced file.
    async fn download_into(
        &self,
        target: Target<'_>,
        selector: &str,
        dir: &Path,
    ) -> Result<PathBuf, ExtractionError>;
}

/// Keeps `guard` alive for as long as the stream is; dropping the stream
/// releases whatever the guard owns (a child process, a scratch directory).
struct Guarded<G> {
    inner: ByteStream,
    _guard: G,
}

impl<G: Unpin> Stream for Guarded<G> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

pub fn guarded<G>(inner: ByteStream, guard: G) -> ByteStream
where
    G: Send + Unpin + 'static,
{
    Box::pin(Guarded {
        inner,
        _guard: guard,
    })
}
