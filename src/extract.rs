use std::borrow::Cow;
use std::collections::HashSet;

use image::imageops::FilterType;
use kmeans_colors::get_kmeans;
use palette::{IntoColor, Lab, Srgb};

use crate::color::{AnnotatedColor, Color, annotate};
use crate::decode::PixelBuffer;
use crate::error::PaletteError;

/// k-means indices are `u8`, which caps the palette size.
pub const MAX_COLORS: usize = 255;

/// Tuning for the clustering step. The endpoint runs with the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorOptions {
    /// Upper bound on the number of colors returned.
    pub colors: usize,
    /// Pixel budget; larger images are downscaled before clustering.
    pub pixels: u32,
    /// Pixels with alpha at or below this are left out of every cluster.
    pub alpha_threshold: u8,
    pub max_iterations: usize,
    pub convergence: f32,
    /// Independent k-means runs; the lowest score wins.
    pub runs: u32,
    pub seed: u64,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            colors: 8,
            pixels: 64_000,
            alpha_threshold: 250,
            max_iterations: 20,
            convergence: 1e-4,
            runs: 1,
            seed: 0,
        }
    }
}

impl ExtractorOptions {
    pub fn validate(&self) -> Result<(), PaletteError> {
        if self.colors == 0 || self.colors > MAX_COLORS {
            return Err(PaletteError::Extraction(format!(
                "palette size must be between 1 and {MAX_COLORS}, got {}",
                self.colors
            )));
        }
        if self.pixels == 0 {
            return Err(PaletteError::Extraction(
                "pixel budget must be positive".to_string(),
            ));
        }
        if self.runs == 0 {
            return Err(PaletteError::Extraction(
                "at least one clustering run is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Groups an image's pixels into representative colors.
///
/// Returned colors are unordered. Each carries the fraction of the image's
/// pixels it stands for; fractions may sum to less than one when pixels are
/// left out.
pub trait Clusterer: Send + Sync {
    fn cluster(
        &self,
        pixels: &PixelBuffer,
        options: &ExtractorOptions,
    ) -> Result<Vec<Color>, PaletteError>;
}

/// k-means in CIE Lab space.
#[derive(Debug, Clone, Copy, Default)]
pub struct KmeansClusterer;

impl Clusterer for KmeansClusterer {
    fn cluster(
        &self,
        pixels: &PixelBuffer,
        options: &ExtractorOptions,
    ) -> Result<Vec<Color>, PaletteError> {
        options.validate()?;

        let raw = sample(pixels, options.pixels)?;
        let total = raw.len() / 4;

        // Collect Lab pixels from opaque areas
        let mut lab_pixels: Vec<Lab> = Vec::new();
        let mut distinct: HashSet<[u8; 3]> = HashSet::new();
        for chunk in raw.chunks_exact(4) {
            if chunk[3] <= options.alpha_threshold {
                continue;
            }
            let srgb = Srgb::<u8>::new(chunk[0], chunk[1], chunk[2]);
            lab_pixels.push(srgb.into_linear().into_color());
            distinct.insert([chunk[0], chunk[1], chunk[2]]);
        }

        if lab_pixels.is_empty() {
            return Ok(Vec::new());
        }

        // Never ask for more clusters than there are distinct colors.
        let k = options.colors.min(distinct.len());

        let kmeans = (0..options.runs)
            .map(|run| {
                get_kmeans(
                    k,
                    options.max_iterations,
                    options.convergence,
                    false,
                    &lab_pixels,
                    options.seed.wrapping_add(u64::from(run)),
                )
            })
            .min_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| PaletteError::Extraction("k-means produced no result".to_string()))?;

        let mut counts = vec![0usize; kmeans.centroids.len()];
        for &index in &kmeans.indices {
            match counts.get_mut(usize::from(index)) {
                Some(count) => *count += 1,
                None => {
                    return Err(PaletteError::Extraction(format!(
                        "k-means assigned a pixel to unknown cluster {index}"
                    )));
                }
            }
        }

        let colors = kmeans
            .centroids
            .iter()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(&lab, count)| {
                let rgb_f32: Srgb<f32> = Srgb::from_linear(lab.into_color());
                let rgb = rgb_f32.into_format::<u8>();
                Color::from_rgb(rgb.red, rgb.green, rgb.blue, count as f32 / total as f32)
            })
            .collect();

        Ok(colors)
    }
}

/// Raw RGBA bytes to cluster, downscaled (nearest-neighbour) to fit `budget`.
fn sample(pixels: &PixelBuffer, budget: u32) -> Result<Cow<'_, [u8]>, PaletteError> {
    let count = pixels.pixel_count();
    if count <= budget as usize {
        return Ok(Cow::Borrowed(pixels.data()));
    }

    // Clamp each side so that w * h <= budget even for extreme aspect ratios.
    let ratio = (f64::from(budget) / count as f64).sqrt();
    let max_w = budget.min(pixels.width()).max(1);
    let w = ((f64::from(pixels.width()) * ratio).round() as u32).clamp(1, max_w);
    let max_h = (budget / w).min(pixels.height()).max(1);
    let h = ((f64::from(pixels.height()) * ratio).round() as u32).clamp(1, max_h);

    let view = pixels.as_image()?;
    let resized = image::imageops::resize(&view, w, h, FilterType::Nearest);
    Ok(Cow::Owned(resized.into_raw()))
}

/// Run `clusterer` over `pixels` and return its colors ranked by area, each
/// with a shade.
pub fn extract_colors(
    pixels: &PixelBuffer,
    options: &ExtractorOptions,
    clusterer: &dyn Clusterer,
) -> Result<Vec<AnnotatedColor>, PaletteError> {
    let colors = clusterer.cluster(pixels, options)?;
    tracing::debug!(
        width = pixels.width(),
        height = pixels.height(),
        colors = colors.len(),
        "clustered image"
    );
    Ok(annotate(colors))
}
