use super::{
    cookies::AuthMaterial,
    error::ExtractionError,
    extractor::{ByteStream, Extractor, Target},
    types::{FormatKind, RawEntry, RawFormat, RawMetadata},
};
use crate::config::YtDlpConfig;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tempfile::NamedTempFile;
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

const STDERR_TAIL_LINES: usize = 20;

const AUDIO_EXTS: [&str; 7] = ["mp3", "m4a", "aac", "ogg", "wav", "opus", "weba"];

pub struct YtDlpExtractor {
    config: YtDlpConfig,
    auth: Option<AuthMaterial>,
}

impl YtDlpExtractor {
    pub fn new(config: YtDlpConfig, auth: Option<AuthMaterial>) -> Self {
        Self { config, auth }
    }

    /// Base invocation. The returned jar copy must outlive the process.
    fn command(&self) -> Result<(Command, Option<NamedTempFile>), ExtractionError> {
        let mut command = Command::new(&self.config.binary);
        command.arg("--no-warnings");
        if self.config.no_check_certificates {
            command.arg("--no-check-certificates");
        }

        let jar = match &self.auth {
            Some(auth) => {
                let jar = auth
                    .materialize()
                    .map_err(|e| ExtractionError::Unknown(format!("{:#}", e)))?;
                command.arg("--cookies").arg(jar.path());
                Some(jar)
            }
            None => None,
        };

        command.stdin(Stdio::null()).kill_on_drop(true);
        Ok((command, jar))
    }

    fn playlist_args(command: &mut Command, target: Target<'_>) {
        if target.is_playlist() {
            command
                .arg("--playlist-items")
                .arg(target.index.to_string());
        } else {
            command.arg("--no-playlist");
        }
    }

    async fn run(&self, mut command: Command, timeout: u64) -> Result<Vec<u8>, ExtractionError> {
        let output = tokio::time::timeout(Duration::from_secs(timeout), command.output())
            .await
            .map_err(|_| ExtractionError::Unknown(format!("yt-dlp timed out after {}s", timeout)))?
            .map_err(|e| ExtractionError::Unknown(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let message = failure_message(&output.stderr, &output.stdout);
            debug!("yt-dlp exited with {}: {}", output.status, message);
            return Err(ExtractionError::classify(&message));
        }

        Ok(output.stdout)
    }

    pub async fn test_availability(&self) -> bool {
        match Command::new(&self.config.binary)
            .arg("--version")
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("✅ yt-dlp is available, version: {}", version.trim());
                true
            }
            Ok(_) => {
                warn!("❌ yt-dlp command failed");
                false
            }
            Err(e) => {
                warn!("❌ yt-dlp not found: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(&self, url: &str) -> Result<RawMetadata, ExtractionError> {
        debug!("Extracting metadata with yt-dlp for: {}", url);

        let (mut command, _jar) = self.command()?;
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg(url);

        let stdout = self.run(command, self.config.extract_timeout_secs).await?;
        let json: Value = serde_json::from_slice(&stdout).map_err(|e| {
            ExtractionError::Unknown(format!("Failed to parse media metadata from yt-dlp output: {}", e))
        })?;

        parse_metadata(&json)
    }

    async fn stream(&self, target: Target<'_>, selector: &str) -> Result<ByteStream, ExtractionError> {
        info!(
            "Streaming format {} of item {} with yt-dlp: {}",
            selector, target.index, target.url
        );

        let (mut command, jar) = self.command()?;
        command
            .arg("--format")
            .arg(selector)
            .arg("--output")
            .arg("-")
            .arg("--no-part");
        Self::playlist_args(&mut command, target);
        command
            .arg(target.url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| ExtractionError::Unknown(format!("Failed to spawn yt-dlp: {}", e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractionError::Unknown("Failed to get yt-dlp stdout".to_string()))?;
        let stderr = child.stderr.take().map(|stderr| tokio::spawn(collect_stderr(stderr)));

        // The exit check owns the child and the jar copy, so dropping the
        // stream early kills the process and removes the copy.
        let exit = futures::stream::once(finish(child, stderr, jar))
            .filter_map(futures::future::ready);
        let mut stream: ByteStream = Box::pin(ReaderStream::new(stdout).chain(exit));

        match stream.next().await {
            Some(Ok(chunk)) => {
                let first = futures::stream::once(futures::future::ready(Ok(chunk)));
                Ok(Box::pin(first.chain(stream)))
            }
            Some(Err(e)) => Err(ExtractionError::classify(&e.to_string())),
            None => Ok(Box::pin(futures::stream::empty::<io::Result<Bytes>>())),
        }
    }

    async fn download_into(
        &self,
        target: Target<'_>,
        selector: &str,
        dir: &Path,
    ) -> Result<PathBuf, ExtractionError> {
        info!(
            "Downloading format {} of item {} with yt-dlp into {}",
            selector,
            target.index,
            dir.display()
        );

        let (mut command, _jar) = self.command()?;
        command
            .arg("--restrict-filenames")
            .arg("--paths")
            .arg(dir)
            .arg("--output")
            .arg("%(title).80s.%(ext)s")
            .arg("--format")
            .arg(selector);
        Self::playlist_args(&mut command, target);
        command.arg(target.url);

        self.run(command, self.config.download_timeout_secs).await?;

        newest_file(dir).await.ok_or_else(|| {
            ExtractionError::Unknown("Download finished but no file was produced.".to_string())
        })
    }
}

fn failure_message(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_string();
    }
    let stdout = String::from_utf8_lossy(stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim().to_string();
    }
    "yt-dlp failed".to_string()
}

/// Log collaborator stderr and keep the last lines for failure reports.
async fn collect_stderr(stderr: ChildStderr) -> String {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.starts_with("ERROR") {
            warn!("yt-dlp: {}", line);
        } else {
            debug!("yt-dlp: {}", line);
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}

/// Runs once stdout hits EOF: a non-zero exit turns the end of the stream
/// into an error so a truncated transfer never looks complete.
async fn finish(
    mut child: Child,
    stderr: Option<JoinHandle<String>>,
    _jar: Option<NamedTempFile>,
) -> Option<io::Result<Bytes>> {
    let status = match child.wait().await {
        Ok(status) => status,
        Err(e) => return Some(Err(e)),
    };
    if status.success() {
        return None;
    }

    let tail = match stderr {
        Some(handle) => tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default(),
        None => String::new(),
    };
    let message = failure_message(tail.as_bytes(), b"");
    debug!("yt-dlp stream exited with {}: {}", status, message);
    Some(Err(io::Error::other(format!(
        "yt-dlp exited with {}: {}",
        status, message
    ))))
}

async fn newest_file(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
        if newest.as_ref().map_or(true, |(time, _)| modified > *time) {
            newest = Some((modified, path));
        }
    }

    newest.map(|(_, path)| path)
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate the collaborator's JSON into typed metadata. Malformed pieces are
/// dropped here so nothing downstream has to second-guess them.
pub fn parse_metadata(json: &Value) -> Result<RawMetadata, ExtractionError> {
    if !json.is_object() {
        return Err(ExtractionError::Unknown(
            "yt-dlp returned a non-object JSON document".to_string(),
        ));
    }

    let entries = flatten_entries(json)
        .into_iter()
        .map(parse_entry)
        .collect();

    Ok(RawMetadata {
        title: text(&json["title"]),
        uploader: text(&json["uploader"]).or_else(|| text(&json["channel"])),
        entries,
    })
}

fn flatten_entries(info: &Value) -> Vec<&Value> {
    let Some(entries) = info["entries"].as_array() else {
        return vec![info];
    };

    entries
        .iter()
        .filter(|entry| entry.is_object())
        .flat_map(|entry| match entry["entries"].as_array() {
            Some(nested) if !nested.is_empty() => {
                nested.iter().filter(|item| item.is_object()).collect()
            }
            _ => vec![entry],
        })
        .collect()
}

fn parse_entry(entry: &Value) -> RawEntry {
    let thumbnail = text(&entry["thumbnail"]).or_else(|| {
        entry["thumbnails"]
            .as_array()
            .and_then(|thumbs| thumbs.iter().rev().find_map(|t| text(&t["url"])))
    });

    let formats = entry["formats"]
        .as_array()
        .map(|formats| formats.iter().filter_map(parse_format).collect())
        .unwrap_or_default();

    RawEntry {
        title: text(&entry["title"]),
        thumbnail,
        duration: entry["duration"].as_f64(),
        ext: text(&entry["ext"]).map(|ext| ext.to_lowercase()),
        vcodec: text(&entry["vcodec"]),
        acodec: text(&entry["acodec"]),
        direct_url: text(&entry["url"]),
        formats,
    }
}

/// Stream presence as reported by a codec field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Track {
    Present,
    Absent,
    Unknown,
}

fn track(codec: &Value) -> Track {
    match codec.as_str().map(str::trim) {
        Some("none") => Track::Absent,
        Some("") | None => Track::Unknown,
        Some(_) => Track::Present,
    }
}

fn parse_format(value: &Value) -> Option<RawFormat> {
    let format_id = text(&value["format_id"])
        .or_else(|| value["format_id"].as_u64().map(|id| id.to_string()))?;
    let container = text(&value["ext"])
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();
    let height = value["height"]
        .as_f64()
        .filter(|h| *h > 0.0)
        .map(|h| h as u32);
    let protocol = text(&value["protocol"]);
    let note = text(&value["format_note"])
        .unwrap_or_default()
        .to_lowercase();

    let storyboard = note.contains("storyboard")
        || container == "mhtml"
        || protocol.as_deref() == Some("mhtml");

    let audio_ext = AUDIO_EXTS.contains(&container.as_str());
    let kind = match (track(&value["vcodec"]), track(&value["acodec"])) {
        (Track::Present, Track::Absent) => FormatKind::VideoOnly,
        (Track::Absent, Track::Present) => FormatKind::AudioOnly,
        (Track::Absent, Track::Unknown) => FormatKind::AudioOnly,
        (Track::Unknown, Track::Absent) => FormatKind::VideoOnly,
        (Track::Absent, Track::Absent) if storyboard => FormatKind::VideoOnly,
        (Track::Absent, Track::Absent) => return None,
        (Track::Unknown, _) if height.is_none() && audio_ext => FormatKind::AudioOnly,
        _ => FormatKind::Combined,
    };

    let bitrate = match kind {
        FormatKind::AudioOnly => value["abr"].as_f64().or_else(|| value["tbr"].as_f64()),
        _ => value["tbr"].as_f64().or_else(|| value["vbr"].as_f64()),
    };

    let http_headers = value["http_headers"]
        .as_object()
        .map(|headers| {
            headers
                .iter()
                .filter_map(|(name, v)| v.as_str().map(|v| (name.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_else(BTreeMap::new);

    Some(RawFormat {
        format_id,
        kind,
        container,
        height,
        bitrate,
        fps: value["fps"].as_f64(),
        quality: value["quality"].as_f64(),
        drm: value["has_drm"].as_bool().unwrap_or(false),
        storyboard,
        url: text(&value["url"]),
        protocol,
        http_headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_video() {
        let json = json!({
            "title": "  A clip ",
            "channel": "Someone",
            "thumbnail": "https://i.ytimg.com/vi/x/hq.jpg",
            "duration": 212.0,
            "ext": "MP4",
            "vcodec": "avc1.640028",
            "acodec": "mp4a.40.2",
            "formats": [
                {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none", "format_note": "storyboard"},
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5, "tbr": 130.0},
                {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "tbr": 4000.0, "fps": 30},
                {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "tbr": 500.0,
                 "url": "https://rr.googlevideo.com/videoplayback", "protocol": "https",
                 "http_headers": {"User-Agent": "Mozilla/5.0", "Accept": "*/*"}},
                {"format_id": "drm-1", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a", "height": 720, "has_drm": true},
                {"ext": "mp4", "vcodec": "avc1", "acodec": "mp4a"}
            ]
        });

        let metadata = parse_metadata(&json).unwrap();
        assert_eq!(metadata.title.as_deref(), Some("A clip"));
        assert_eq!(metadata.uploader.as_deref(), Some("Someone"));
        assert_eq!(metadata.entries.len(), 1);

        let entry = &metadata.entries[0];
        assert_eq!(entry.ext.as_deref(), Some("mp4"));
        assert_eq!(entry.duration, Some(212.0));
        assert_eq!(entry.formats.len(), 5);

        let by_id = |id: &str| entry.formats.iter().find(|f| f.format_id == id).unwrap();
        assert!(by_id("sb0").storyboard);
        assert_eq!(by_id("140").kind, FormatKind::AudioOnly);
        assert_eq!(by_id("140").bitrate, Some(129.5));
        assert_eq!(by_id("137").kind, FormatKind::VideoOnly);
        assert_eq!(by_id("137").height, Some(1080));
        assert_eq!(by_id("18").kind, FormatKind::Combined);
        assert_eq!(by_id("18").http_headers.get("Accept").map(String::as_str), Some("*/*"));
        assert_eq!(by_id("18").direct_http_url(), Some("https://rr.googlevideo.com/videoplayback"));
        assert!(by_id("drm-1").drm);

        assert!(entry.find_format("137").is_some());
        assert!(entry.find_format("drm-1").is_none());
        assert!(entry.find_format("sb0").is_none());
    }

    #[test]
    fn test_unknown_codecs_are_inferred() {
        let json = json!({
            "formats": [
                {"format_id": "hd", "ext": "mp4", "height": 720},
                {"format_id": "aud", "ext": "m4a"},
                {"format_id": "dash-v", "ext": "mp4", "acodec": "none", "height": 480},
                {"format_id": "dash-a", "ext": "m4a", "vcodec": "none"},
                {"format_id": "blank", "ext": "mp4", "vcodec": "none", "acodec": "none"}
            ]
        });

        let metadata = parse_metadata(&json).unwrap();
        let kinds: Vec<(String, FormatKind)> = metadata.entries[0]
            .formats
            .iter()
            .map(|f| (f.format_id.clone(), f.kind))
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("hd".to_string(), FormatKind::Combined),
                ("aud".to_string(), FormatKind::AudioOnly),
                ("dash-v".to_string(), FormatKind::VideoOnly),
                ("dash-a".to_string(), FormatKind::AudioOnly),
            ]
        );
    }

    #[test]
    fn test_flatten_entries() {
        let json = json!({
            "title": "Playlist",
            "uploader": "Owner",
            "channel": "Ignored",
            "entries": [
                {"title": "one"},
                null,
                {"title": "group", "entries": [{"title": "two"}, null, {"title": "three"}]},
                {"title": "four", "entries": []}
            ]
        });

        let metadata = parse_metadata(&json).unwrap();
        assert_eq!(metadata.uploader.as_deref(), Some("Owner"));
        let titles: Vec<_> = metadata
            .entries
            .iter()
            .map(|e| e.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_all_null_entries_yield_no_items() {
        let metadata = parse_metadata(&json!({"title": "Empty", "entries": [null, null]})).unwrap();
        assert!(metadata.entries.is_empty());
    }

    #[test]
    fn test_thumbnail_falls_back_to_thumbnails_list() {
        let json = json!({
            "thumbnails": [{"url": "https://img/small.jpg"}, {"url": "https://img/large.jpg"}]
        });
        let metadata = parse_metadata(&json).unwrap();
        assert_eq!(
            metadata.entries[0].thumbnail.as_deref(),
            Some("https://img/large.jpg")
        );
    }

    #[test]
    fn test_non_object_output_is_rejected() {
        assert!(matches!(
            parse_metadata(&json!([1, 2, 3])),
            Err(ExtractionError::Unknown(_))
        ));
    }

    #[test]
    fn test_failure_message_prefers_stderr() {
        assert_eq!(failure_message(b"  ERROR: boom\n", b"out"), "ERROR: boom");
        assert_eq!(failure_message(b"", b"only stdout"), "only stdout");
        assert_eq!(failure_message(b"", b""), "yt-dlp failed");
    }

    #[tokio::test]
    async fn test_newest_file_skips_partial_downloads() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("clip.mp4.part"), b"partial").unwrap();
        assert!(newest_file(dir.path()).await.is_none());

        std::fs::write(dir.path().join("clip.mp4"), b"done").unwrap();
        assert_eq!(newest_file(dir.path()).await, Some(dir.path().join("clip.mp4")));
    }

    const JAR: &str = "# Netscape HTTP Cookie File\n\
        .youtube.com\tTRUE\t/\tTRUE\t1800000000\tSID\tabc\n";

    fn target() -> Target<'static> {
        Target {
            url: "https://www.youtube.com/watch?v=abc",
            index: 1,
            item_count: 1,
        }
    }

    /// Extractor whose binary is a shell script standing in for yt-dlp.
    #[cfg(unix)]
    fn scripted(dir: &Path, body: &str) -> YtDlpExtractor {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        let config = YtDlpConfig {
            binary: path,
            ..YtDlpConfig::default()
        };
        YtDlpExtractor::new(config, None)
    }

    async fn drain(mut stream: ByteStream) -> (Vec<u8>, Vec<String>) {
        let mut bytes = Vec::new();
        let mut errors = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(e) => errors.push(e.to_string()),
            }
        }
        (bytes, errors)
    }

    fn cookie_arg(command: &Command) -> PathBuf {
        let args: Vec<_> = command.as_std().get_args().collect();
        let at = args.iter().position(|arg| *arg == "--cookies").unwrap();
        PathBuf::from(args[at + 1])
    }

    #[test]
    fn test_each_command_gets_its_own_cookie_jar() {
        let sources = crate::config::CookieSources {
            text: Some(JAR.to_string()),
            ..Default::default()
        };
        let auth = crate::media::cookies::provision(&sources).unwrap();
        let extractor = YtDlpExtractor::new(YtDlpConfig::default(), auth);

        let (first, first_jar) = extractor.command().unwrap();
        let (second, second_jar) = extractor.command().unwrap();
        let first_path = cookie_arg(&first);
        let second_path = cookie_arg(&second);

        assert_ne!(first_path, second_path);
        assert_eq!(first_jar.as_ref().map(|jar| jar.path()), Some(first_path.as_path()));
        assert_eq!(std::fs::read_to_string(&second_path).unwrap(), JAR);

        drop(first_jar);
        assert!(!first_path.exists());
        assert!(second_jar.is_some() && second_path.exists());
    }

    #[test]
    fn test_command_without_cookies() {
        let extractor = YtDlpExtractor::new(YtDlpConfig::default(), None);
        let (command, jar) = extractor.command().unwrap();
        assert!(jar.is_none());
        assert!(!command.as_std().get_args().any(|arg| arg == "--cookies"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_success() {
        let dir = tempfile::TempDir::new().unwrap();
        let extractor = scripted(dir.path(), "printf 'all'\nprintf ' bytes'\nexit 0");

        let stream = extractor.stream(target(), "18").await.unwrap();
        let (bytes, errors) = drain(stream).await;
        assert_eq!(bytes, b"all bytes");
        assert!(errors.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_ends_with_error_when_process_fails_midway() {
        let dir = tempfile::TempDir::new().unwrap();
        let extractor = scripted(
            dir.path(),
            "printf 'PARTIAL'\necho 'ERROR: [youtube] abc: HTTP Error 403: Forbidden' >&2\nexit 1",
        );

        let stream = extractor.stream(target(), "18").await.unwrap();
        let (bytes, errors) = drain(stream).await;
        assert_eq!(bytes, b"PARTIAL");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("HTTP Error 403"), "{}", errors[0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_failure_before_output_is_classified() {
        let dir = tempfile::TempDir::new().unwrap();
        let extractor = scripted(
            dir.path(),
            "echo 'ERROR: [instagram] abc: This content is private' >&2\nexit 1",
        );

        let err = extractor
            .stream(target(), "best")
            .await
            .err()
            .expect("stream should fail before the first byte");
        assert_eq!(err, ExtractionError::AuthRequired);
    }

    #[cfg(target_os = "linux")]
    fn running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            // zombies are dead, just not reaped yet
            Ok(stat) => !stat.contains(") Z "),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropping_stream_kills_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("pid");
        let extractor = scripted(
            dir.path(),
            &format!(
                "echo $$ > '{}'\nprintf 'chunk'\nexec sleep 30",
                pid_file.display()
            ),
        );

        let mut stream = extractor.stream(target(), "18").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"chunk");
        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        assert!(running(&pid));

        drop(stream);
        let mut stopped = false;
        for _ in 0..50 {
            if !running(&pid) {
                stopped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(stopped, "process {} still running after the stream was dropped", pid);
    }

    #[tokio::test]
    #[ignore] // Requires yt-dlp to be installed
    async fn test_yt_dlp_availability() {
        let extractor = YtDlpExtractor::new(YtDlpConfig::default(), None);
        assert!(extractor.test_availability().await);
    }
}
