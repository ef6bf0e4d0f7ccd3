use super::formats::normalize;
use super::platform::detect_instagram_kind;
use super::types::{
    FormatKind, MediaItem, MediaType, PlatformId, RawEntry, RawMetadata, ResolutionResult,
};
use crate::utils::normalize_title;

const IMAGE_EXTS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];
const AUDIO_EXTS: [&str; 6] = ["mp3", "m4a", "aac", "ogg", "wav", "opus"];
const VIDEO_URL_MARKERS: [&str; 3] = [".mp4", ".mov", ".webm"];

fn has_codec(codec: &Option<String>) -> bool {
    codec.as_deref().is_some_and(|c| c != "none")
}

pub fn infer_type(entry: &RawEntry) -> MediaType {
    let ext = entry.ext.as_deref().unwrap_or("");
    let url = entry.direct_url.as_deref().unwrap_or("").to_lowercase();

    if has_codec(&entry.vcodec) {
        MediaType::Video
    } else if has_codec(&entry.acodec) {
        MediaType::Audio
    } else if IMAGE_EXTS.contains(&ext) {
        MediaType::Image
    } else if AUDIO_EXTS.contains(&ext) {
        MediaType::Audio
    } else if VIDEO_URL_MARKERS.iter().any(|marker| url.contains(marker)) {
        MediaType::Video
    } else {
        MediaType::File
    }
}

/// Entry URL if the collaborator gave one, else the best combined format's URL.
pub fn select_preview_url(entry: &RawEntry) -> Option<String> {
    if let Some(url) = &entry.direct_url {
        return Some(url.clone());
    }

    entry
        .downloadable_formats()
        .filter(|f| f.kind == FormatKind::Combined && f.url.is_some())
        .max_by(|a, b| {
            a.height
                .unwrap_or(0)
                .cmp(&b.height.unwrap_or(0))
                .then(a.bitrate.unwrap_or(0.0).total_cmp(&b.bitrate.unwrap_or(0.0)))
        })
        .and_then(|f| f.url.clone())
}

/// Display title of one item; attachment names use the same fallback.
pub fn item_title(entry: &RawEntry, index: usize) -> String {
    normalize_title(entry.title.as_deref(), &format!("media_{}", index))
}

pub fn assemble_item(
    entry: &RawEntry,
    index: usize,
    platform: PlatformId,
    ffmpeg_available: bool,
) -> MediaItem {
    MediaItem {
        index,
        media_type: infer_type(entry),
        title: item_title(entry, index),
        thumbnail: entry.thumbnail.clone(),
        preview_url: match platform {
            PlatformId::Instagram => select_preview_url(entry),
            _ => None,
        },
        duration: entry.duration,
        ext: entry.ext.clone(),
        download_options: normalize(&entry.formats, ffmpeg_available),
    }
}

/// Build the analyze response. Items keep collaborator order and are numbered 1..=N.
pub fn assemble(
    metadata: &RawMetadata,
    platform: PlatformId,
    source_url: &str,
    ffmpeg_available: bool,
) -> ResolutionResult {
    let items: Vec<MediaItem> = metadata
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| assemble_item(entry, i + 1, platform, ffmpeg_available))
        .collect();

    ResolutionResult {
        platform,
        title: normalize_title(
            metadata.title.as_deref(),
            &format!("{} media", platform.name()),
        ),
        uploader: metadata.uploader.clone(),
        source_url: source_url.to_string(),
        ffmpeg_available,
        instagram_kind: match platform {
            PlatformId::Instagram => Some(detect_instagram_kind(source_url, items.len())),
            _ => None,
        },
        items,
    }
}
