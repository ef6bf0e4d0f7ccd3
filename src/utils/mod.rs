/// Collapse whitespace and cap length; `fallback` when nothing is left.
pub fn normalize_title(raw: Option<&str>, fallback: &str) -> String {
    let collapsed = raw
        .unwrap_or("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let title = if collapsed.is_empty() {
        fallback.to_string()
    } else {
        collapsed
    };
    title.chars().take(100).collect()
}

/// ASCII-only `<title>.<ext>` safe for a Content-Disposition header.
pub fn attachment_filename(title: &str, ext: &str) -> String {
    let mut stem = String::new();
    for c in title.trim().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            stem.push(c);
        } else if c.is_whitespace() && !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem: String = stem
        .trim_matches(|c| c == '_' || c == '.')
        .chars()
        .take(80)
        .collect();
    let stem = if stem.is_empty() { "media".to_string() } else { stem };

    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    if ext.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, ext)
    }
}

pub fn content_type_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "weba" => "audio/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
