use crate::core::scrape::frame::to_intensity;
use image::imageops::{self, FilterType};
use image::{GenericImageView, GrayImage, Rgb};
use imageproc::filter::sharpen3x3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub upscale: u32,
    pub sharpen: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            upscale: 2,
            sharpen: true,
        }
    }
}

/// 灰度 → 放大 → 锐化，提升小号数字的识别率
///
/// Returns `None` for an empty crop so callers can skip OCR entirely.
pub fn prepare_for_ocr<I>(view: &I, config: &PreprocessConfig) -> Option<GrayImage>
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    let (width, height) = view.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let gray = to_intensity(view);
    let scale = config.upscale.max(1);
    let scaled = if scale > 1 {
        imageops::resize(&gray, width * scale, height * scale, FilterType::CatmullRom)
    } else {
        gray
    };

    if config.sharpen {
        // kernel [0,-1,0; -1,5,-1; 0,-1,0]
        Some(sharpen3x3(&scaled))
    } else {
        Some(scaled)
    }
}
