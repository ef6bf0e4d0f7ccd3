//! In-memory collaborators for gateway tests.

use super::error::ExtractionError;
use super::extractor::{ByteStream, Extractor, Target};
use super::merge::Merger;
use super::types::{FormatKind, RawEntry, RawFormat, RawMetadata};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn format(id: &str, kind: FormatKind, container: &str, height: Option<u32>, kbps: f64) -> RawFormat {
    RawFormat {
        format_id: id.to_string(),
        kind,
        container: container.to_string(),
        height,
        bitrate: Some(kbps),
        fps: None,
        quality: None,
        drm: false,
        storyboard: false,
        url: None,
        protocol: None,
        http_headers: BTreeMap::new(),
    }
}

pub fn video_entry(title: &str, formats: Vec<RawFormat>) -> RawEntry {
    RawEntry {
        title: Some(title.to_string()),
        ext: Some("mp4".to_string()),
        vcodec: Some("avc1".to_string()),
        acodec: Some("mp4a".to_string()),
        formats,
        ..Default::default()
    }
}

pub struct FakeExtractor {
    result: Result<RawMetadata, ExtractionError>,
    /// Bytes served per selector by `stream` and `download_into`.
    bodies: HashMap<String, Vec<u8>>,
    /// Streams end with an error after the first chunk.
    cut_short: bool,
    pub extract_calls: AtomicUsize,
    pub selectors: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn new(metadata: RawMetadata) -> Self {
        Self::with_result(Ok(metadata))
    }

    pub fn failing(err: ExtractionError) -> Self {
        Self::with_result(Err(err))
    }

    fn with_result(result: Result<RawMetadata, ExtractionError>) -> Self {
        Self {
            result,
            bodies: HashMap::new(),
            cut_short: false,
            extract_calls: AtomicUsize::new(0),
            selectors: Mutex::new(Vec::new()),
        }
    }

    pub fn serving(mut self, selector: &str, body: &[u8]) -> Self {
        self.bodies.insert(selector.to_string(), body.to_vec());
        self
    }

    pub fn cut_short(mut self) -> Self {
        self.cut_short = true;
        self
    }

    fn body(&self, selector: &str) -> Vec<u8> {
        self.selectors.lock().unwrap().push(selector.to_string());
        self.bodies.get(selector).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract(&self, _url: &str) -> Result<RawMetadata, ExtractionError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    async fn stream(&self, _target: Target<'_>, selector: &str) -> Result<ByteStream, ExtractionError> {
        let body = self.body(selector);
        // two chunks, to exercise re-chaining after the first one is peeked
        let split = body.len() / 2;
        let tail = if self.cut_short {
            Err(std::io::Error::other("collaborator exited with status 1"))
        } else {
            Ok(Bytes::copy_from_slice(&body[split..]))
        };
        let chunks = vec![Ok(Bytes::copy_from_slice(&body[..split])), tail];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn download_into(
        &self,
        _target: Target<'_>,
        selector: &str,
        dir: &Path,
    ) -> Result<PathBuf, ExtractionError> {
        let body = self.body(selector);
        let path = dir.join("Fake_Title.mkv");
        std::fs::write(&path, body).map_err(|e| ExtractionError::Unknown(e.to_string()))?;
        Ok(path)
    }
}

/// Writes `video ++ "+" ++ audio`, or fails when told to.
#[derive(Default)]
pub struct FakeMerger {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Merger for FakeMerger {
    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("ffmpeg failed: Invalid data found when processing input");
        }
        let mut merged = tokio::fs::read(video).await?;
        merged.push(b'+');
        merged.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, merged).await?;
        Ok(())
    }
}
