use super::types::{DownloadMode, DownloadOption, FormatKind, RawFormat};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Video-bearing options offered per item. The single audio option comes on top of this.
pub const MAX_VIDEO_OPTIONS: usize = 5;

/// The effective quality an option delivers. No two offered options share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QualityKey {
    Video {
        height: Option<u32>,
        container: String,
    },
    Audio {
        kbps: u32,
        container: String,
    },
}

/// Preference between video-bearing options of equal resolution, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Source {
    VideoOnly,
    Combined,
    Merged,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub key: QualityKey,
    pub option: DownloadOption,
    source: Source,
    height: Option<u32>,
    rank: (f64, f64, f64),
}

/// Container a `video + audio` merge is written to.
pub fn merge_container(video_ext: &str, audio_ext: &str) -> &'static str {
    match (video_ext, audio_ext) {
        ("mp4" | "mov", "m4a" | "mp4" | "aac") => "mp4",
        ("webm", "webm" | "opus" | "weba") => "webm",
        _ => "mkv",
    }
}

/// Reduce one item's raw catalog to the ordered options shown to the user.
/// Never returns an empty list.
pub fn normalize(formats: &[RawFormat], ffmpeg_available: bool) -> Vec<DownloadOption> {
    let options: Vec<DownloadOption> = candidates(formats, ffmpeg_available)
        .into_iter()
        .map(|candidate| candidate.option)
        .collect();

    if options.is_empty() {
        vec![DownloadOption::best_available()]
    } else {
        options
    }
}

pub fn candidates(formats: &[RawFormat], ffmpeg_available: bool) -> Vec<Candidate> {
    let mut combined = Vec::new();
    let mut video_only = Vec::new();
    let mut audio_only = Vec::new();

    for format in formats
        .iter()
        .filter(|f| f.is_downloadable() && !f.format_id.is_empty())
    {
        match format.kind {
            FormatKind::Combined => combined.push(format),
            FormatKind::VideoOnly => video_only.push(format),
            FormatKind::AudioOnly => audio_only.push(format),
        }
    }

    let combined = dedup(combined, video_key);
    let video_only = dedup(video_only, video_key);
    let audio_only = dedup(audio_only, audio_key);

    let mut video: Vec<Candidate> = combined.iter().map(|f| combined_candidate(f)).collect();

    if ffmpeg_available && !audio_only.is_empty() {
        for tier in best_per_height(&video_only) {
            // Prefer audio that muxes into the video's own container; the best
            // audio overall is only the fallback, and forces an mkv output.
            let compatible: Vec<&RawFormat> = audio_only
                .iter()
                .copied()
                .filter(|a| merge_container(&tier.container, &a.container) != "mkv")
                .collect();
            if let Some(audio) = best_audio(&compatible).or_else(|| best_audio(&audio_only)) {
                video.push(merged_candidate(tier, audio));
            }
        }
    } else {
        video.extend(video_only.iter().map(|f| video_only_candidate(f)));
    }

    video.sort_by(compare_video);

    let mut seen = HashSet::new();
    video.retain(|candidate| seen.insert(candidate.key.clone()));
    video.truncate(MAX_VIDEO_OPTIONS);

    if let Some(audio) = best_audio(&audio_only) {
        video.push(audio_candidate(audio));
    }

    video
}

fn video_key(format: &RawFormat) -> QualityKey {
    QualityKey::Video {
        height: format.height,
        container: format.container.clone(),
    }
}

fn audio_key(format: &RawFormat) -> QualityKey {
    QualityKey::Audio {
        kbps: format.bitrate.unwrap_or(0.0).round().max(0.0) as u32,
        container: format.container.clone(),
    }
}

fn cmp_rank(a: (f64, f64, f64), b: (f64, f64, f64)) -> Ordering {
    a.0.total_cmp(&b.0)
        .then(a.1.total_cmp(&b.1))
        .then(a.2.total_cmp(&b.2))
}

/// Keep the best-ranked entry per quality key, in first-seen order.
fn dedup(formats: Vec<&RawFormat>, key: fn(&RawFormat) -> QualityKey) -> Vec<&RawFormat> {
    let mut slots: HashMap<QualityKey, usize> = HashMap::new();
    let mut kept: Vec<&RawFormat> = Vec::new();

    for format in formats {
        match slots.get(&key(format)) {
            Some(&slot) => {
                if cmp_rank(format.rank(), kept[slot].rank()) == Ordering::Greater {
                    kept[slot] = format;
                }
            }
            None => {
                slots.insert(key(format), kept.len());
                kept.push(format);
            }
        }
    }

    kept
}

/// One video-only stream per resolution tier; ties prefer mp4.
fn best_per_height<'a>(formats: &[&'a RawFormat]) -> Vec<&'a RawFormat> {
    let mut tiers: BTreeMap<Option<u32>, &RawFormat> = BTreeMap::new();

    for &format in formats {
        let better = match tiers.get(&format.height) {
            None => true,
            Some(current) => match cmp_rank(format.rank(), current.rank()) {
                Ordering::Greater => true,
                Ordering::Equal => format.container == "mp4" && current.container != "mp4",
                Ordering::Less => false,
            },
        };
        if better {
            tiers.insert(format.height, format);
        }
    }

    tiers.into_values().collect()
}

fn best_audio<'a>(formats: &[&'a RawFormat]) -> Option<&'a RawFormat> {
    formats.iter().copied().max_by(|a, b| {
        a.bitrate
            .unwrap_or(0.0)
            .total_cmp(&b.bitrate.unwrap_or(0.0))
            .then(cmp_rank(a.rank(), b.rank()))
            // earlier entry wins a full tie
            .then(Ordering::Greater)
    })
}

fn compare_video(a: &Candidate, b: &Candidate) -> Ordering {
    b.height
        .unwrap_or(0)
        .cmp(&a.height.unwrap_or(0))
        .then(b.source.cmp(&a.source))
        .then(cmp_rank(b.rank, a.rank))
        .then_with(|| a.option.value.cmp(&b.option.value))
}

fn resolution_label(height: Option<u32>) -> String {
    match height {
        Some(height) => format!("{}p", height),
        None => "Video".to_string(),
    }
}

fn combined_candidate(format: &RawFormat) -> Candidate {
    Candidate {
        key: video_key(format),
        option: DownloadOption {
            value: format.format_id.clone(),
            label: format!(
                "{} {}",
                resolution_label(format.height),
                format.container.to_uppercase()
            ),
            mode: DownloadMode::Auto,
        },
        source: Source::Combined,
        height: format.height,
        rank: format.rank(),
    }
}

fn video_only_candidate(format: &RawFormat) -> Candidate {
    Candidate {
        key: video_key(format),
        option: DownloadOption {
            value: format.format_id.clone(),
            label: format!(
                "{} {} (video only)",
                resolution_label(format.height),
                format.container.to_uppercase()
            ),
            mode: DownloadMode::Video,
        },
        source: Source::VideoOnly,
        height: format.height,
        rank: format.rank(),
    }
}

fn merged_candidate(video: &RawFormat, audio: &RawFormat) -> Candidate {
    let container = merge_container(&video.container, &audio.container);
    Candidate {
        key: QualityKey::Video {
            height: video.height,
            container: container.to_string(),
        },
        option: DownloadOption {
            value: format!("{}+{}", video.format_id, audio.format_id),
            label: format!(
                "{} {}",
                resolution_label(video.height),
                container.to_uppercase()
            ),
            mode: DownloadMode::Auto,
        },
        source: Source::Merged,
        height: video.height,
        rank: video.rank(),
    }
}

fn audio_candidate(format: &RawFormat) -> Candidate {
    Candidate {
        key: audio_key(format),
        option: DownloadOption {
            value: format.format_id.clone(),
            label: format!("Audio only ({})", format.container.to_uppercase()),
            mode: DownloadMode::Audio,
        },
        source: Source::Combined,
        height: None,
        rank: format.rank(),
    }
}
