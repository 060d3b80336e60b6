use palette::{Hsl, IntoColor, Srgb};
use serde::{Deserialize, Serialize};

/// Lightness at or above which a color counts as light.
pub const LIGHT_THRESHOLD: f32 = 0.5;

/// A representative color produced by the clustering step.
///
/// `hue`, `saturation` and `lightness` are normalized to `0.0..=1.0`.
/// `area` is the fraction of the image's pixels attributed to this color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub hex: String,
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    pub intensity: f32,
    pub area: f32,
}

impl Color {
    /// Build a color from its sRGB channels, deriving the HSL components.
    pub fn from_rgb(red: u8, green: u8, blue: u8, area: f32) -> Self {
        let rgb: Srgb<f32> = Srgb::new(red, green, blue).into_format();
        let hsl: Hsl = rgb.into_color();
        let (hue, saturation, lightness) = hsl.into_components();

        Self {
            red,
            green,
            blue,
            hex: format!("#{red:02x}{green:02x}{blue:02x}"),
            hue: hue.into_positive_degrees() / 360.0,
            saturation,
            lightness,
            // Saturation faded toward black and white.
            intensity: saturation * ((0.5 - (0.5 - lightness).abs()) * 2.0),
            area,
        }
    }

    pub fn shade(&self) -> Shade {
        Shade::from_lightness(self.lightness)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shade {
    Dark,
    Light,
}

impl Shade {
    /// `Dark` strictly below [`LIGHT_THRESHOLD`], `Light` otherwise.
    pub fn from_lightness(lightness: f32) -> Self {
        if lightness < LIGHT_THRESHOLD {
            Shade::Dark
        } else {
            Shade::Light
        }
    }
}

/// A [`Color`] with its shade. Serializes as the color's fields plus `shade`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedColor {
    #[serde(flatten)]
    pub color: Color,
    pub shade: Shade,
}

impl From<Color> for AnnotatedColor {
    fn from(color: Color) -> Self {
        let shade = color.shade();
        Self { color, shade }
    }
}

/// Order colors by descending area and attach a shade to each.
///
/// The sort is stable: colors with equal area keep their input order.
pub fn annotate(mut colors: Vec<Color>) -> Vec<AnnotatedColor> {
    colors.sort_by(|a, b| b.area.total_cmp(&a.area));
    colors.into_iter().map(AnnotatedColor::from).collect()
}
