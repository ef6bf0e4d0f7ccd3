use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Platforms the gateway accepts URLs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformId {
    YouTube,
    Instagram,
    Facebook,
    Loom,
    Unknown,
}

impl PlatformId {
    pub fn name(&self) -> &'static str {
        match self {
            PlatformId::YouTube => "YouTube",
            PlatformId::Instagram => "Instagram",
            PlatformId::Facebook => "Facebook",
            PlatformId::Loom => "Loom",
            PlatformId::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for PlatformId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Combined,
    VideoOnly,
    AudioOnly,
}

/// One validated entry of the collaborator's format catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFormat {
    pub format_id: String,
    pub kind: FormatKind,
    /// Lowercased container/extension, e.g. `mp4`, `webm`, `m4a`.
    pub container: String,
    pub height: Option<u32>,
    /// Kilobits per second. `abr` for audio-only entries, `tbr` otherwise.
    pub bitrate: Option<f64>,
    pub fps: Option<f64>,
    /// Collaborator-supplied relative quality, higher is better.
    pub quality: Option<f64>,
    pub drm: bool,
    /// Storyboard or thumbnail-only entries.
    pub storyboard: bool,
    pub url: Option<String>,
    pub protocol: Option<String>,
    pub http_headers: BTreeMap<String, String>,
}

impl RawFormat {
    pub fn is_downloadable(&self) -> bool {
        !self.drm && !self.storyboard
    }

    pub fn has_video(&self) -> bool {
        matches!(self.kind, FormatKind::Combined | FormatKind::VideoOnly)
    }

    pub fn has_audio(&self) -> bool {
        matches!(self.kind, FormatKind::Combined | FormatKind::AudioOnly)
    }

    /// Direct HTTP(S) formats can be fetched without going through the collaborator.
    pub fn direct_http_url(&self) -> Option<&str> {
        let protocol = self.protocol.as_deref().unwrap_or("https");
        if protocol != "http" && protocol != "https" {
            return None;
        }
        self.url
            .as_deref()
            .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
    }

    /// Ordering used to pick between near-identical formats.
    pub fn rank(&self) -> (f64, f64, f64) {
        (
            self.quality.unwrap_or(0.0),
            self.bitrate.unwrap_or(0.0),
            self.fps.unwrap_or(0.0),
        )
    }
}

/// One unit reported by the collaborator: a video, an image, or a carousel/playlist entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub direct_url: Option<String>,
    pub formats: Vec<RawFormat>,
}

impl RawEntry {
    pub fn downloadable_formats(&self) -> impl Iterator<Item = &RawFormat> {
        self.formats.iter().filter(|f| f.is_downloadable())
    }

    pub fn find_format(&self, format_id: &str) -> Option<&RawFormat> {
        self.downloadable_formats()
            .find(|f| f.format_id == format_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub uploader: Option<String>,
    /// Flattened entries in collaborator order.
    pub entries: Vec<RawEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    Auto,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOption {
    pub value: String,
    pub label: String,
    pub mode: DownloadMode,
}

impl DownloadOption {
    pub fn best_available() -> Self {
        Self {
            value: "best".to_string(),
            label: "Best available".to_string(),
            mode: DownloadMode::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
    Audio,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstagramKind {
    Story,
    Reel,
    Carousel,
    Post,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaItem {
    pub index: usize,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    pub thumbnail: Option<String>,
    pub preview_url: Option<String>,
    pub duration: Option<f64>,
    pub ext: Option<String>,
    pub download_options: Vec<DownloadOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub platform: PlatformId,
    pub title: String,
    pub uploader: Option<String>,
    #[serde(rename = "url")]
    pub source_url: String,
    pub ffmpeg_available: bool,
    pub instagram_kind: Option<InstagramKind>,
    pub items: Vec<MediaItem>,
}
