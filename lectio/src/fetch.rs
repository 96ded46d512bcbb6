//! Downloads images referenced by `file_url`.

use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{LectioError, Result};

#[derive(Clone)]
pub struct RemoteFetcher {
    client: Client,
    max_bytes: usize,
}

impl RemoteFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("lectio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LectioError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }

    /// GETs `url` and returns the body. Only `http` and `https` are allowed.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| LectioError::Validation(format!("invalid file_url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LectioError::Validation(format!(
                "file_url scheme must be http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(download_error)?;

        if response.status() != StatusCode::OK {
            return Err(LectioError::Download(format!(
                "failed to download file_url: {}",
                response.status().as_u16()
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(self.too_large());
            }
        }

        // Content-Length is optional; the cap holds per chunk.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(download_error)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(bytes = body.len(), "Downloaded file_url");
        Ok(body)
    }

    fn too_large(&self) -> LectioError {
        LectioError::Download(format!(
            "file_url is larger than {} bytes",
            self.max_bytes
        ))
    }
}

fn download_error(e: reqwest::Error) -> LectioError {
    LectioError::Download(format!("download error: {e}"))
}
