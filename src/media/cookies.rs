use crate::config::CookieSources;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::info;

/// Validated cookie jar text, fixed at startup. Every collaborator run gets
/// its own copy on disk, since yt-dlp rewrites the jar it is given on exit.
#[derive(Debug, Clone)]
pub struct AuthMaterial {
    jar: Arc<str>,
}

impl AuthMaterial {
    fn new(text: &str) -> Self {
        let jar = if text.ends_with('\n') {
            text.to_string()
        } else {
            format!("{}\n", text)
        };
        Self { jar: jar.into() }
    }

    /// Write a private copy of the jar; it is removed when the handle drops.
    pub fn materialize(&self) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("cookies-")
            .suffix(".txt")
            .tempfile()
            .context("Failed to create cookie jar file")?;
        file.write_all(self.jar.as_bytes())
            .context("Failed to write cookie jar file")?;
        file.flush()?;
        Ok(file)
    }
}

/// Build the cookie jar from the first configured source: base64 blob, then
/// file path, then raw text. `Ok(None)` means run unauthenticated; `Err` must
/// stop startup.
pub fn provision(sources: &CookieSources) -> Result<Option<AuthMaterial>> {
    if let Some(blob) = present(&sources.base64) {
        let compact: String = blob.split_whitespace().collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .context("Cookie blob is not valid base64")?;
        let text = String::from_utf8(bytes).context("Decoded cookie blob is not UTF-8")?;
        validate_cookie_jar(&text).context("Decoded cookie blob is not a Netscape cookie jar")?;
        info!("Using cookies from base64 configuration");
        return Ok(Some(AuthMaterial::new(&text)));
    }

    if let Some(path) = present(&sources.file) {
        let path = PathBuf::from(path);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cookie file {}", path.display()))?;
        validate_cookie_jar(&text)
            .with_context(|| format!("Cookie file {} is not a Netscape cookie jar", path.display()))?;
        info!("Using cookies from file: {}", path.display());
        return Ok(Some(AuthMaterial::new(&text)));
    }

    if let Some(text) = present(&sources.text) {
        validate_cookie_jar(text).context("Cookie text is not a Netscape cookie jar")?;
        info!("Using cookies from inline text configuration");
        return Ok(Some(AuthMaterial::new(text)));
    }

    info!("No cookies configured, extraction runs unauthenticated");
    Ok(None)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Netscape format: comment lines start with `#` (except `#HttpOnly_` entries),
/// every cookie line has 7 tab-separated fields, and at least one cookie exists.
fn validate_cookie_jar(text: &str) -> Result<()> {
    let mut cookies = 0usize;

    for (number, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with('#') && !line.starts_with("#HttpOnly_") {
            continue;
        }

        let fields = line.split('\t').count();
        if fields != 7 {
            anyhow::bail!(
                "line {} has {} tab-separated fields, expected 7",
                number + 1,
                fields
            );
        }
        cookies += 1;
    }

    if cookies == 0 {
        anyhow::bail!("no cookie entries found");
    }
    Ok(())
}
