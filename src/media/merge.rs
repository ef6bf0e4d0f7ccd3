use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// Combines one video-only and one audio-only file into a single container.
#[async_trait]
pub trait Merger: Send + Sync {
    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

/// The merge binary could not be started at all.
#[derive(Debug, Error)]
#[error("merge tool {} is not installed", .0.display())]
pub struct MergeToolMissing(pub PathBuf);

pub struct FfmpegMerger {
    binary: PathBuf,
}

impl FfmpegMerger {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Probe once at startup; the result is fixed for the process lifetime.
    pub async fn test_availability(&self) -> bool {
        match Command::new(&self.binary).arg("-version").output().await {
            Ok(output) if output.status.success() => {
                let version_line = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("unknown")
                    .to_string();
                info!("✅ ffmpeg is available: {}", version_line);
                true
            }
            Ok(_) => {
                warn!("❌ ffmpeg command failed");
                false
            }
            Err(e) => {
                warn!("❌ ffmpeg not found: {} (required for video merging)", e);
                warn!("⚠️  Separate video/audio qualities will be offered as video-only");
                false
            }
        }
    }
}

#[async_trait]
impl Merger for FfmpegMerger {
    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        info!(
            "Merging {} and {} into {}",
            video.display(),
            audio.display(),
            output.display()
        );

        let mut command = Command::new(&self.binary);
        command
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .arg("-map")
            .arg("0:v:0")
            .arg("-map")
            .arg("1:a:0")
            .arg("-c")
            .arg("copy");
        if output.extension().is_some_and(|ext| ext == "mp4") {
            command.arg("-movflags").arg("+faststart");
        }
        command
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let result = match command.output().await {
            Ok(result) => result,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(MergeToolMissing(self.binary.clone()).into())
            }
            Err(e) => return Err(e).context("Failed to spawn ffmpeg"),
        };

        if !result.status.success() {
            let error = String::from_utf8_lossy(&result.stderr);
            anyhow::bail!("ffmpeg failed with status {}: {}", result.status, error.trim());
        }

        let size = tokio::fs::metadata(output)
            .await
            .context("ffmpeg produced no output file")?
            .len();
        info!("Merged output size: {} bytes", size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let merger = FfmpegMerger::new(PathBuf::from("/nonexistent/ffmpeg-binary"));
        assert!(!merger.test_availability().await);
    }

    #[tokio::test]
    async fn test_merge_with_missing_binary_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let merger = FfmpegMerger::new(PathBuf::from("/nonexistent/ffmpeg-binary"));
        let result = merger
            .merge(
                &dir.path().join("video.mp4"),
                &dir.path().join("audio.m4a"),
                &dir.path().join("out.mp4"),
            )
            .await;
        let err = result.unwrap_err();
        assert!(err.downcast_ref::<MergeToolMissing>().is_some(), "{:#}", err);
    }

    #[tokio::test]
    #[ignore] // Requires ffmpeg to be installed
    async fn test_ffmpeg_availability() {
        let merger = FfmpegMerger::new(PathBuf::from("ffmpeg"));
        assert!(merger.test_availability().await);
    }
}
