use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand};
use image::ImageFormat;
use image_palette::client::{BASE_URL_ENV_VAR, DEFAULT_BASE_URL, PaletteClient};
use image_palette::fetch::ImageFetcher;
use image_palette::server::{self, AppState, ServerConfig};
use image_palette::{AnnotatedColor, ExtractorOptions, extract_from_bytes};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Extract dominant colors from images, locally or through the HTTP endpoint.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /api/extract-colors`
    Serve(ServeArgs),
    /// Print the palette of one or more images as JSON
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "PALETTE_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Image file paths or http(s) URLs
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Maximum number of colors (ignored with --remote)
    #[arg(short = 'k', long, default_value_t = 8)]
    n_colors: usize,

    /// Pixel budget before downsampling (ignored with --remote)
    #[arg(long, default_value_t = 64_000)]
    pixels: u32,

    /// Send URLs to a running server instead of extracting locally
    #[arg(long)]
    remote: bool,

    /// Server used with --remote
    #[arg(long, env = BASE_URL_ENV_VAR, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            let config = ServerConfig { bind: args.bind };
            server::serve(&config, AppState::new(ImageFetcher::new()))
                .await
                .with_context(|| format!("server on {} failed", config.bind))
        }
        Command::Extract(args) => extract(args).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn extract(args: ExtractArgs) -> Result<()> {
    let options = ExtractorOptions {
        colors: args.n_colors,
        pixels: args.pixels,
        ..ExtractorOptions::default()
    };
    let client = PaletteClient::new(&args.base_url);
    let fetcher = ImageFetcher::new();

    for input in &args.inputs {
        let colors: Vec<AnnotatedColor> = if args.remote {
            ensure!(is_url(input), "--remote needs an http(s) URL, got {input}");
            client
                .extract(input)
                .await
                .with_context(|| format!("remote extraction failed for {input}"))?
        } else {
            let (bytes, content_type) = if is_url(input) {
                let image = fetcher.fetch(input).await?;
                (image.bytes, image.content_type)
            } else {
                let bytes = fs::read(input).with_context(|| format!("failed to read {input}"))?;
                (bytes, content_type_for_path(Path::new(input)))
            };
            extract_from_bytes(&bytes, &content_type, &options)
                .with_context(|| format!("color extraction failed for {input}"))?
        };

        let doc = json!({ "input": input, "colors": colors });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    }

    Ok(())
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Unknown extensions defer to byte sniffing in the decoder.
fn content_type_for_path(path: &Path) -> String {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}
