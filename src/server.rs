use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::color::AnnotatedColor;
use crate::decode::decode;
use crate::error::PaletteError;
use crate::extract::{Clusterer, ExtractorOptions, KmeansClusterer, extract_colors};
use crate::fetch::ImageFetcher;

pub const EXTRACT_COLORS_PATH: &str = "/api/extract-colors";
pub const DEFAULT_PORT: u16 = 3000;

const IMAGE_URL_REQUIRED: &str = "Image URL is required";
const EXTRACTION_FAILED: &str = "Failed to extract colors from image";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
        }
    }
}

/// Shared by every request; holds no per-request state.
#[derive(Clone)]
pub struct AppState {
    fetcher: ImageFetcher,
    clusterer: Arc<dyn Clusterer>,
    options: ExtractorOptions,
}

impl AppState {
    pub fn new(fetcher: ImageFetcher) -> Self {
        Self {
            fetcher,
            clusterer: Arc::new(KmeansClusterer),
            options: ExtractorOptions::default(),
        }
    }

    pub fn with_clusterer(mut self, clusterer: Arc<dyn Clusterer>) -> Self {
        self.clusterer = clusterer;
        self
    }

    pub fn with_options(mut self, options: ExtractorOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub colors: Vec<AnnotatedColor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(EXTRACT_COLORS_PATH, post(extract_colors_handler))
        .with_state(state)
}

/// Bind `config.bind` and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("listening on http://{}{EXTRACT_COLORS_PATH}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn extract_colors_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let result = match parse_image_url(&body) {
        Ok(image_url) => {
            info!(%image_url, "extracting colors");
            run_pipeline(&state, &image_url).await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(colors) => (StatusCode::OK, Json(ExtractResponse { colors })).into_response(),
        Err(err) => error_response(err),
    }
}

/// Only an absent, `null` or empty `imageUrl` is a validation failure.
/// Anything else that is not a usable string fails like the pipeline does.
fn parse_image_url(body: &[u8]) -> Result<String, PaletteError> {
    let request: Value = serde_json::from_slice(body)
        .map_err(|e| PaletteError::InvalidRequest(format!("body is not JSON: {e}")))?;

    let image_url = match request {
        Value::Null => {
            return Err(PaletteError::InvalidRequest("body is JSON null".to_string()));
        }
        Value::Object(mut fields) => fields.remove("imageUrl").unwrap_or(Value::Null),
        // Non-object bodies carry no fields.
        _ => Value::Null,
    };

    match image_url {
        Value::Null => Err(PaletteError::Validation(IMAGE_URL_REQUIRED.to_string())),
        Value::String(url) if url.is_empty() => {
            Err(PaletteError::Validation(IMAGE_URL_REQUIRED.to_string()))
        }
        Value::String(url) => Ok(url),
        other => Err(PaletteError::InvalidRequest(format!(
            "imageUrl must be a string, got {other}"
        ))),
    }
}

async fn run_pipeline(
    state: &AppState,
    image_url: &str,
) -> Result<Vec<AnnotatedColor>, PaletteError> {
    let image = state.fetcher.fetch(image_url).await?;

    let clusterer = Arc::clone(&state.clusterer);
    let options = state.options.clone();
    tokio::task::spawn_blocking(move || {
        let pixels = decode(&image.bytes, &image.content_type)?;
        extract_colors(&pixels, &options, clusterer.as_ref())
    })
    .await
    .map_err(|err| PaletteError::Extraction(format!("extraction task failed: {err}")))?
}

/// Validation failures keep their message; every other cause is logged and
/// collapsed into one generic 500.
fn error_response(err: PaletteError) -> Response {
    match err {
        PaletteError::Validation(message) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
        }
        other => {
            error!(kind = other.kind(), error = %other, "Error extracting colors");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: EXTRACTION_FAILED.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Color, Shade};
    use crate::decode::PixelBuffer;
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::header::CONTENT_TYPE;
    use image::{ImageFormat, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::io::Cursor;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Failing;

    impl Clusterer for Failing {
        fn cluster(&self, _: &PixelBuffer, _: &ExtractorOptions) -> Result<Vec<Color>, PaletteError> {
            Err(PaletteError::Extraction("secret internal detail".to_string()))
        }
    }

    struct Panicking;

    impl Clusterer for Panicking {
        fn cluster(&self, _: &PixelBuffer, _: &ExtractorOptions) -> Result<Vec<Color>, PaletteError> {
            panic!("clustering blew up");
        }
    }

    fn png(dark_rows: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(10, 10, |_, y| {
            if y < dark_rows {
                Rgba([10, 10, 10, 255])
            } else {
                Rgba([250, 250, 250, 255])
            }
        });
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    async fn image_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(png(3), "image/png"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page.html"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;
        server
    }

    async fn post_extract(state: AppState, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(EXTRACT_COLORS_PATH)
            .header(CONTENT_TYPE, "application/json")
            .body(body.into())
            .expect("request");
        let response = router(state).oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    fn image_url(server: &MockServer, file: &str) -> String {
        json!({ "imageUrl": format!("{}/{file}", server.uri()) }).to_string()
    }

    #[test]
    fn default_config_binds_localhost() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.to_string(), "127.0.0.1:3000");
    }

    #[tokio::test]
    async fn missing_image_url_is_a_bad_request() {
        let (status, body) = post_extract(AppState::new(ImageFetcher::new()), "{}").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Image URL is required" }));
    }

    #[tokio::test]
    async fn null_empty_or_absent_image_urls_are_bad_requests() {
        for body in [r#"{"imageUrl": ""}"#, r#"{"imageUrl": null}"#, r#"{"other": 1}"#, "[]"] {
            let (status, json) = post_extract(AppState::new(ImageFetcher::new()), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
            assert!(json.get("error").is_some());
            assert!(json.get("colors").is_none());
        }
    }

    #[tokio::test]
    async fn unusable_image_urls_fail_generically() {
        for body in [
            "not json",
            "",
            "null",
            r#"{"imageUrl": 5}"#,
            r#"{"imageUrl": "   "}"#,
            r#"{"imageUrl": "nope"}"#,
        ] {
            let (status, json) = post_extract(AppState::new(ImageFetcher::new()), body).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "body {body:?}");
            assert_eq!(json, json!({ "error": "Failed to extract colors from image" }));
        }
    }

    #[test]
    fn whitespace_image_url_is_passed_through() {
        assert_eq!(
            parse_image_url(br#"{"imageUrl": "   "}"#).expect("url"),
            "   "
        );
        assert_eq!(
            parse_image_url(b"not json").unwrap_err().kind(),
            "invalid_request"
        );
    }

    #[tokio::test]
    async fn returns_colors_sorted_by_area_with_shades() {
        let server = image_server().await;

        let (status, body) = post_extract(
            AppState::new(ImageFetcher::new()),
            image_url(&server, "photo.png"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let colors: Vec<AnnotatedColor> =
            serde_json::from_value(body["colors"].clone()).expect("colors");
        let shades: Vec<Shade> = colors.iter().map(|c| c.shade).collect();
        assert_eq!(shades, vec![Shade::Light, Shade::Dark]);
        assert!((colors[0].color.area - 0.7).abs() < 1e-4);
        assert!((colors[1].color.area - 0.3).abs() < 1e-4);
        assert_eq!(body["colors"][0]["shade"], json!("light"));
    }

    #[tokio::test]
    async fn clustering_failure_is_reported_generically() {
        let server = image_server().await;
        let state = AppState::new(ImageFetcher::new()).with_clusterer(Arc::new(Failing));

        let (status, body) = post_extract(state, image_url(&server, "photo.png")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to extract colors from image" }));
    }

    #[tokio::test]
    async fn clustering_panic_is_reported_generically() {
        let server = image_server().await;
        let state = AppState::new(ImageFetcher::new()).with_clusterer(Arc::new(Panicking));

        let (status, body) = post_extract(state, image_url(&server, "photo.png")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to extract colors from image" }));
    }

    #[tokio::test]
    async fn fetch_and_decode_failures_collapse_to_the_same_response() {
        let server = image_server().await;

        for file in ["missing.png", "page.html"] {
            let (status, body) =
                post_extract(AppState::new(ImageFetcher::new()), image_url(&server, file)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{file}");
            assert_eq!(body, json!({ "error": "Failed to extract colors from image" }));
        }
    }

    #[tokio::test]
    async fn invalid_options_surface_as_server_errors() {
        let server = image_server().await;
        let state = AppState::new(ImageFetcher::new()).with_options(ExtractorOptions {
            colors: 0,
            ..ExtractorOptions::default()
        });

        let (status, _) = post_extract(state, image_url(&server, "photo.png")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
