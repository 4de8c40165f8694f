use crate::core::error::ScrapeError;
use image::{GenericImageView, Rgb};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoConfig {
    pub hue_bins: usize,
    pub saturation_bins: usize,
    /// Share of the block width searched for the logo, from the left edge
    pub strip_ratio: f32,
    pub threshold: f32,
    pub min_step: u32,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            hue_bins: 50,
            saturation_bins: 60,
            strip_ratio: 0.3,
            threshold: 0.7,
            min_step: 10,
        }
    }
}

impl LogoConfig {
    /// 行检测阶段使用的宽松阈值
    pub fn lenient() -> Self {
        Self {
            threshold: 0.5,
            ..Default::default()
        }
    }
}

/// Min-max normalised hue × saturation histogram of the reference logo.
#[derive(Debug, Clone)]
pub struct LogoSignature {
    histogram: Vec<f32>,
    width: u32,
    height: u32,
}

impl LogoSignature {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn histogram(&self) -> &[f32] {
        &self.histogram
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoMatch {
    pub is_match: bool,
    pub score: f32,
}

impl LogoMatch {
    pub fn miss() -> Self {
        Self {
            is_match: false,
            score: 0.0,
        }
    }
}

/// 滑窗直方图相关性匹配器
pub struct LogoMatcher {
    config: LogoConfig,
    signature: Option<LogoSignature>,
}

impl LogoMatcher {
    pub fn new(config: LogoConfig) -> Self {
        Self {
            config,
            signature: None,
        }
    }

    pub fn config(&self) -> &LogoConfig {
        &self.config
    }

    pub fn signature(&self) -> Option<&LogoSignature> {
        self.signature.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.signature.is_some()
    }

    /// Computes and stores the signature of the reference logo.
    pub fn configure<I>(&mut self, logo: &I) -> Result<LogoSignature, ScrapeError>
    where
        I: GenericImageView<Pixel = Rgb<u8>>,
    {
        let (width, height) = logo.dimensions();
        if width == 0 || height == 0 {
            return Err(ScrapeError::InvalidImage("logo image is empty".into()));
        }

        let signature = LogoSignature {
            histogram: self.histogram(logo),
            width,
            height,
        };
        log::info!("🏷️ logo configured: {}x{}", width, height);
        self.signature = Some(signature.clone());
        Ok(signature)
    }

    pub fn matches<I>(&self, block: &I) -> LogoMatch
    where
        I: GenericImageView<Pixel = Rgb<u8>>,
    {
        self.matches_with_threshold(block, self.config.threshold)
    }

    /// Best correlation over all logo-sized windows in the block's left strip.
    pub fn matches_with_threshold<I>(&self, block: &I, threshold: f32) -> LogoMatch
    where
        I: GenericImageView<Pixel = Rgb<u8>>,
    {
        let Some(signature) = self.signature.as_ref() else {
            return LogoMatch::miss();
        };

        let (block_w, block_h) = block.dimensions();
        let strip_w = (block_w as f32 * self.config.strip_ratio) as u32;
        let (logo_w, logo_h) = (signature.width, signature.height);

        if strip_w < logo_w || block_h < logo_h {
            return LogoMatch::miss();
        }

        let step_x = (logo_w / 2).max(self.config.min_step);
        let step_y = (logo_h / 2).max(self.config.min_step);

        let mut best = f32::MIN;
        let mut y = 0;
        while y + logo_h <= block_h {
            let mut x = 0;
            while x + logo_w <= strip_w {
                let window = block.view(x, y, logo_w, logo_h);
                let score = correlation(&self.histogram(&*window), &signature.histogram);
                best = best.max(score);
                x += step_x;
            }
            y += step_y;
        }

        if best == f32::MIN {
            return LogoMatch::miss();
        }

        LogoMatch {
            is_match: best > threshold,
            score: best,
        }
    }

    fn histogram<I>(&self, view: &I) -> Vec<f32>
    where
        I: GenericImageView<Pixel = Rgb<u8>>,
    {
        hue_saturation_histogram(view, self.config.hue_bins, self.config.saturation_bins)
    }
}

/// 2-D hue × saturation histogram, min-max normalised into [0, 1].
pub fn hue_saturation_histogram<I>(view: &I, hue_bins: usize, saturation_bins: usize) -> Vec<f32>
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    let hue_bins = hue_bins.max(1);
    let saturation_bins = saturation_bins.max(1);
    let mut counts = vec![0u32; hue_bins * saturation_bins];

    for (_, _, pixel) in view.pixels() {
        let (hue, saturation) = hue_saturation(&pixel);
        let h = ((hue / 360.0 * hue_bins as f32) as usize).min(hue_bins - 1);
        let s = (saturation as usize * saturation_bins / 256).min(saturation_bins - 1);
        counts[h * saturation_bins + s] += 1;
    }

    let min = counts.iter().copied().min().unwrap_or(0) as f32;
    let max = counts.iter().copied().max().unwrap_or(0) as f32;
    let range = max - min;
    if range <= 0.0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|&c| (c as f32 - min) / range).collect()
}

/// Hue in degrees `[0, 360)` and saturation scaled to `0..=255`.
fn hue_saturation(pixel: &Rgb<u8>) -> (f32, u8) {
    let [r, g, b] = pixel.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == 0 || max == min {
        return (0.0, 0);
    }

    let delta = (max - min) as f32;
    let saturation = ((max - min) as u32 * 255 / max as u32) as u8;
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let hue = if max as f32 == r {
        60.0 * ((g - b) / delta)
    } else if max as f32 == g {
        60.0 * ((b - r) / delta) + 120.0
    } else {
        60.0 * ((r - g) / delta) + 240.0
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };
    (hue, saturation)
}

/// Pearson correlation of two equal-length histograms, `[-1, 1]`.
pub fn correlation(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (cov / denom) as f32
}
