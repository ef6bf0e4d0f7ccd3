use super::types::{InstagramKind, PlatformId};
use url::Url;

const SUPPORTED_PLATFORMS: [(PlatformId, &[&str]); 4] = [
    (PlatformId::Instagram, &["instagram.com"]),
    (PlatformId::YouTube, &["youtube.com", "youtu.be"]),
    (PlatformId::Facebook, &["facebook.com", "fb.watch"]),
    (PlatformId::Loom, &["loom.com"]),
];

/// Comma-separated platform names for user-facing messages.
pub fn supported_names() -> String {
    SUPPORTED_PLATFORMS
        .iter()
        .map(|(platform, _)| platform.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse an absolute http(s) URL with a host, or nothing.
pub fn parse_web_url(url: &str) -> Option<Url> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some(parsed),
        _ => None,
    }
}

fn host_matches(host: &str, root_domain: &str) -> bool {
    host == root_domain
        || host
            .strip_suffix(root_domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Map a URL to its platform. Never fails: anything unrecognized is `Unknown`.
pub fn resolve(url: &str) -> PlatformId {
    let Some(parsed) = parse_web_url(url) else {
        return PlatformId::Unknown;
    };
    let Some(host) = parsed.host_str() else {
        return PlatformId::Unknown;
    };
    let host = host.to_lowercase();

    SUPPORTED_PLATFORMS
        .iter()
        .find(|(_, domains)| domains.iter().any(|domain| host_matches(&host, domain)))
        .map(|(platform, _)| *platform)
        .unwrap_or(PlatformId::Unknown)
}

pub fn detect_instagram_kind(url: &str, item_count: usize) -> InstagramKind {
    let path = parse_web_url(url)
        .map(|parsed| parsed.path().to_lowercase())
        .unwrap_or_default();

    if path.contains("/stories/") {
        InstagramKind::Story
    } else if path.contains("/reel/") || path.contains("/reels/") {
        InstagramKind::Reel
    } else if item_count > 1 {
        InstagramKind::Carousel
    } else {
        InstagramKind::Post
    }
}
