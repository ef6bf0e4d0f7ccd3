use super::extractor::ByteStream;
use anyhow::{Context, Result};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::io;
use std::time::Duration;
use tracing::debug;

/// Fetches direct HTTP(S) format URLs as byte streams.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    pub async fn open(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<ByteStream> {
        debug!("Fetching media URL: {}", url);

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .context("Failed to fetch media URL")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download media: HTTP {}", response.status());
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(io::Error::other)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn spawn_server() -> String {
        let app = Router::new()
            .route(
                "/video.mp4",
                get(|headers: HeaderMap| async move {
                    match headers.get("x-signature").and_then(|v| v.to_str().ok()) {
                        Some("secret") => (StatusCode::OK, "VIDEOBYTES"),
                        _ => (StatusCode::FORBIDDEN, "denied"),
                    }
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk.unwrap());
        }
        data
    }

    #[tokio::test]
    async fn test_open_sends_format_headers() {
        let base = spawn_server().await;
        let fetcher = HttpFetcher::new().unwrap();
        let headers = BTreeMap::from([("X-Signature".to_string(), "secret".to_string())]);

        let stream = fetcher
            .open(&format!("{}/video.mp4", base), &headers)
            .await
            .unwrap();
        assert_eq!(collect(stream).await, b"VIDEOBYTES");
    }

    #[tokio::test]
    async fn test_open_rejects_error_status() {
        let base = spawn_server().await;
        let fetcher = HttpFetcher::new().unwrap();

        let result = fetcher
            .open(&format!("{}/video.mp4", base), &BTreeMap::new())
            .await;
        assert!(result.is_err());

        let missing = fetcher
            .open(&format!("{}/missing.mp4", base), &BTreeMap::new())
            .await;
        assert!(missing.is_err());
    }
}
