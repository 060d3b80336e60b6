use reqwest::header::{CONTENT_TYPE, HeaderValue};

use crate::decode::DEFAULT_CONTENT_TYPE;
use crate::error::PaletteError;

/// An encoded image held fully in memory.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Retrieves images over HTTP(S). No timeout beyond the client defaults.
#[derive(Debug, Clone, Default)]
pub struct ImageFetcher {
    client: reqwest::Client,
}

impl ImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedImage, PaletteError> {
        let acquisition = |reason: String| PaletteError::Acquisition {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| acquisition(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(acquisition(format!("server returned {status}")));
        }

        let content_type = content_type_or_default(response.headers().get(CONTENT_TYPE));
        let bytes = response
            .bytes()
            .await
            .map_err(|e| acquisition(format!("failed to read body: {e}")))?;

        tracing::debug!(%url, %content_type, len = bytes.len(), "fetched image");

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

fn content_type_or_default(header: Option<&HeaderValue>) -> String {
    header
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}
