use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaletteError {
    /// Required request input is missing. The only variant whose message is
    /// shown to callers.
    #[error("{0}")]
    Validation(String),
    /// A request body the endpoint cannot read. Reported like any other
    /// internal failure.
    #[error("unreadable request: {0}")]
    InvalidRequest(String),
    #[error("failed to fetch image from {url}: {reason}")]
    Acquisition { url: String, reason: String },
    #[error("failed to decode image: {source}")]
    Decode {
        #[source]
        source: image::ImageError,
    },
    #[error("unsupported image type `{0}`")]
    UnsupportedFormat(String),
    #[error("malformed pixel buffer: {width}x{height} RGBA does not fit {len} bytes")]
    MalformedInput { width: u32, height: u32, len: usize },
    #[error("color extraction failed: {0}")]
    Extraction(String),
}

impl PaletteError {
    /// Short cause tag used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PaletteError::Validation(_) => "validation",
            PaletteError::InvalidRequest(_) => "invalid_request",
            PaletteError::Acquisition { .. } => "acquisition",
            PaletteError::Decode { .. } | PaletteError::UnsupportedFormat(_) => "decode",
            PaletteError::MalformedInput { .. } => "malformed_input",
            PaletteError::Extraction(_) => "extraction",
        }
    }
}
