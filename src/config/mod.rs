use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub ytdlp: YtDlpConfig,
    pub ffmpeg: FfmpegConfig,
    pub downloads: DownloadsConfig,
    pub cookies: CookieSources,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct YtDlpConfig {
    pub binary: PathBuf,
    pub extract_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub no_check_certificates: bool,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            extract_timeout_secs: 60,
            download_timeout_secs: 900,
            no_check_certificates: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FfmpegConfig {
    pub binary: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Root for per-request scratch directories.
    pub scratch_dir: PathBuf,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("mediagrab"),
        }
    }
}

/// Cookie jar sources, in priority order.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CookieSources {
    pub base64: Option<String>,
    pub file: Option<String>,
    pub text: Option<String>,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file {}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }

    /// Apply environment overrides on top of file values.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(port) = var("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", port))?;
            self.server.bind.set_port(port);
        }
        if let Some(blob) = var("YTDLP_COOKIES_B64") {
            self.cookies.base64 = Some(blob);
        }
        if let Some(path) = var("YTDLP_COOKIES_FILE") {
            self.cookies.file = Some(path);
        }
        if let Some(text) = var("YTDLP_COOKIES") {
            self.cookies.text = Some(text);
        }

        Ok(self)
    }
}
