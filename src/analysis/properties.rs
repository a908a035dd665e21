use image::{ImageFormat, ImageReader};
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;
use tracing::warn;

const HIGH_RES_PIXELS: u64 = 1_000_000;

/// Technical properties of an uploaded asset, read from its header only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetProperties {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: String,
    pub is_high_res: bool,
    pub total_pixels: u64,
    pub file_extension: String,
    pub format: String,
}

impl AssetProperties {
    pub fn inspect(bytes: &[u8], filename: Option<&str>) -> Self {
        match Self::try_inspect(bytes, filename) {
            Ok(properties) => properties,
            Err(e) => {
                warn!("Failed to inspect asset properties, using fallback: {}", e);
                Self::fallback()
            }
        }
    }

    fn try_inspect(bytes: &[u8], filename: Option<&str>) -> Result<Self, image::ImageError> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader.format();
        let (width, height) = reader.into_dimensions()?;
        let total_pixels = width as u64 * height as u64;

        Ok(Self {
            width,
            height,
            aspect_ratio: aspect_category(width, height),
            is_high_res: total_pixels >= HIGH_RES_PIXELS,
            total_pixels,
            file_extension: filename.map(extension_of).unwrap_or_default(),
            format: format.map(format_name).unwrap_or_default(),
        })
    }

    pub fn fallback() -> Self {
        Self {
            width: 1080,
            height: 1080,
            aspect_ratio: "1:1".to_string(),
            is_high_res: true,
            total_pixels: 1_166_400,
            file_extension: ".jpg".to_string(),
            format: "JPEG".to_string(),
        }
    }
}

/// Social-platform aspect buckets; anything else is reported as `w:h`.
fn aspect_category(width: u32, height: u32) -> String {
    if height == 0 {
        return format!("{}:{}", width, height);
    }
    let ratio = width as f64 / height as f64;

    if (0.9..=1.1).contains(&ratio) {
        "1:1".to_string()
    } else if (0.7..0.9).contains(&ratio) {
        "4:5".to_string()
    } else if ratio <= 0.6 {
        "9:16".to_string()
    } else if ratio >= 1.5 {
        "16:9".to_string()
    } else {
        format!("{}:{}", width, height)
    }
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn format_name(format: ImageFormat) -> String {
    format!("{:?}", format).to_uppercase()
}
