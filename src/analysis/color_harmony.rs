use image::imageops::FilterType;
use image::{DynamicImage, Rgb};
use tracing::warn;

pub const FALLBACK_HARMONY: f32 = 0.7;

const ANALYSIS_SIZE: u32 = 100;
const HUE_BINS: usize = 180;
const SATURATION_BINS: usize = 256;
// Empirical constants; changing them changes every score.
const VARIANCE_SCALE: f64 = 1_000_000.0;
const MIN_HARMONY: f64 = 0.4;
const MAX_HARMONY: f64 = 1.0;

/// Scores how evenly an image's colors are spread over hue and saturation.
///
/// The image is resampled to 100x100, converted to 8-bit HSV (hue in
/// [0, 180), saturation in [0, 256)), and binned. The score falls as the
/// variance of the bin counts grows:
/// `clamp(1 - (var(hue) + var(sat)) / 1e6, 0.4, 1.0)`.
pub struct ColorHarmonyAnalyzer;

impl ColorHarmonyAnalyzer {
    pub fn score_bytes(bytes: &[u8]) -> f32 {
        match image::load_from_memory(bytes) {
            Ok(image) => Self::score(&image),
            Err(e) => {
                warn!("Color harmony analysis failed, using fallback: {}", e);
                FALLBACK_HARMONY
            }
        }
    }

    pub fn score(image: &DynamicImage) -> f32 {
        if image.width() == 0 || image.height() == 0 {
            warn!("Color harmony analysis got an empty image, using fallback");
            return FALLBACK_HARMONY;
        }

        let resized = image
            .resize_exact(ANALYSIS_SIZE, ANALYSIS_SIZE, FilterType::Triangle)
            .to_rgb8();

        let mut hue_hist = [0u32; HUE_BINS];
        let mut saturation_hist = [0u32; SATURATION_BINS];
        for px in resized.pixels() {
            let (hue, saturation) = hue_saturation(px);
            hue_hist[hue] += 1;
            saturation_hist[saturation] += 1;
        }

        let spread = variance(&hue_hist) + variance(&saturation_hist);
        (1.0 - spread / VARIANCE_SCALE).clamp(MIN_HARMONY, MAX_HARMONY) as f32
    }
}

/// Hue and saturation bins using the 8-bit HSV convention: hue is degrees
/// halved, saturation is scaled to 0..=255.
fn hue_saturation(px: &Rgb<u8>) -> (usize, usize) {
    let [r, g, b] = px.0.map(f64::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max == 0.0 {
        0.0
    } else {
        255.0 * delta / max
    };

    let hue_degrees = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let hue_degrees = if hue_degrees < 0.0 {
        hue_degrees + 360.0
    } else {
        hue_degrees
    };

    let hue = (hue_degrees / 2.0).round() as usize % HUE_BINS;
    let saturation = (saturation.round() as usize).min(SATURATION_BINS - 1);
    (hue, saturation)
}

/// Population variance of the bin counts.
fn variance(hist: &[u32]) -> f64 {
    let n = hist.len() as f64;
    let mean = hist.iter().map(|&c| c as f64).sum::<f64>() / n;
    hist.iter()
        .map(|&c| {
            let d = c as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}
