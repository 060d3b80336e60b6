use serde_json::json;

use crate::color::AnnotatedColor;
use crate::error::PaletteError;
use crate::server::{EXTRACT_COLORS_PATH, ErrorResponse, ExtractResponse};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
/// Overrides [`DEFAULT_BASE_URL`] for the binary.
pub const BASE_URL_ENV_VAR: &str = "PALETTE_BASE_URL";

/// Calls a running palette server's extraction endpoint.
#[derive(Debug, Clone)]
pub struct PaletteClient {
    client: reqwest::Client,
    base_url: String,
}

impl PaletteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{EXTRACT_COLORS_PATH}", self.base_url.trim_end_matches('/'))
    }

    pub async fn extract(&self, image_url: &str) -> Result<Vec<AnnotatedColor>, PaletteError> {
        let endpoint = self.endpoint();
        let acquisition = |reason: String| PaletteError::Acquisition {
            url: endpoint.clone(),
            reason,
        };

        let response = self
            .client
            .post(&endpoint)
            .json(&json!({ "imageUrl": image_url }))
            .send()
            .await
            .map_err(|e| acquisition(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let reason = match response.json::<ErrorResponse>().await {
                Ok(body) => format!("{status}: {}", body.error),
                Err(_) => format!("server returned {status}"),
            };
            return Err(acquisition(reason));
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| acquisition(format!("invalid response body: {e}")))?;
        Ok(body.colors)
    }
}
