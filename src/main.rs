use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod config;
mod media;
mod server;
mod utils;

use config::Config;
use media::{FfmpegMerger, MediaGateway, YtDlpExtractor};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<String>,

    /// Address to listen on, overrides the config file and PORT
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

fn get_config_path(args: &Args) -> Option<String> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var("CONFIG_FILE") {
        return Some(path);
    }

    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        let config_path = format!("{}/mediagrab/config.toml", xdg_config_home);
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let config_path = format!("{}/.config/mediagrab/config.toml", home.display());
        if std::path::Path::new(&config_path).exists() {
            return Some(config_path);
        }
    }

    None
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = get_config_path(&args);
    let config = match &config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if config.get_logging_format() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    info!("Starting mediagrab...");
    match &config_path {
        Some(path) => info!("Loaded config from: {}", path),
        None => info!("No config file found, using defaults"),
    }

    let auth = media::provision(&config.cookies).context("Invalid cookie configuration")?;
    if auth.is_none() {
        info!("No cookies configured, login-gated media will be unavailable");
    }

    let extractor = YtDlpExtractor::new(config.ytdlp.clone(), auth);
    if !extractor.test_availability().await {
        warn!("yt-dlp is not available, every request will fail until it is installed");
    }

    let merger = FfmpegMerger::new(config.ffmpeg.binary.clone());
    let ffmpeg_available = merger.test_availability().await;

    let gateway = MediaGateway::new(
        Arc::new(extractor),
        Arc::new(merger),
        ffmpeg_available,
        config.downloads.scratch_dir.clone(),
    )?;

    server::run(config.server.bind, gateway).await
}
