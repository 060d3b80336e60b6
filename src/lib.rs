use js_sys::{Array, Object, Reflect};
use wasm_bindgen::prelude::*;

pub mod color;
pub mod decode;
pub mod error;
pub mod extract;

#[cfg(feature = "server")]
pub mod client;
#[cfg(feature = "server")]
pub mod fetch;
#[cfg(feature = "server")]
pub mod server;

pub use color::{AnnotatedColor, Color, Shade, annotate};
pub use decode::{DEFAULT_CONTENT_TYPE, PixelBuffer, decode};
pub use error::PaletteError;
pub use extract::{Clusterer, ExtractorOptions, KmeansClusterer, extract_colors};

/// Decode an encoded image and extract its ranked, shaded palette with
/// k-means.
pub fn extract_from_bytes(
    input: &[u8],
    content_type: &str,
    options: &ExtractorOptions,
) -> Result<Vec<AnnotatedColor>, PaletteError> {
    let pixels = decode(input, content_type)?;
    extract_colors(&pixels, options, &KmeansClusterer)
}

/// Extract the dominant colors of an encoded image.
///
/// Returns an array of plain objects with the same fields the HTTP endpoint
/// emits (`red`, `green`, `blue`, `hex`, `hue`, `saturation`, `lightness`,
/// `intensity`, `area`, `shade`), largest area first.
#[wasm_bindgen]
pub fn extract_palette(
    input: Vec<u8>,
    content_type: Option<String>,
    n_colors: Option<usize>,
) -> Result<Array, JsValue> {
    let mut options = ExtractorOptions::default();
    if let Some(n) = n_colors {
        options.colors = n;
    }
    let content_type = content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let colors = extract_from_bytes(&input, &content_type, &options)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let out = Array::new();
    for annotated in &colors {
        let obj = color_to_js(annotated)?;
        out.push(&obj);
    }
    Ok(out)
}

fn color_to_js(annotated: &AnnotatedColor) -> Result<Object, JsValue> {
    let c = &annotated.color;
    let obj = Object::new();
    let numbers = [
        ("red", f64::from(c.red)),
        ("green", f64::from(c.green)),
        ("blue", f64::from(c.blue)),
        ("hue", f64::from(c.hue)),
        ("saturation", f64::from(c.saturation)),
        ("lightness", f64::from(c.lightness)),
        ("intensity", f64::from(c.intensity)),
        ("area", f64::from(c.area)),
    ];
    for (key, value) in numbers {
        Reflect::set(&obj, &JsValue::from_str(key), &JsValue::from_f64(value))?;
    }
    Reflect::set(&obj, &JsValue::from_str("hex"), &JsValue::from_str(&c.hex))?;
    let shade = match annotated.shade {
        Shade::Dark => "dark",
        Shade::Light => "light",
    };
    Reflect::set(&obj, &JsValue::from_str("shade"), &JsValue::from_str(shade))?;
    Ok(obj)
}
