//! 颜色掩码分块 - 前景掩码找数据行，近白色条带掩码找标题栏

use super::frame::{intensity, Rectangle};
use image::{GenericImageView, GrayImage, Luma, Rgb};
use imageproc::contours::{find_contours, BorderType, Contour};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Intensity at or below this is foreground (ink / UI elements)
    pub foreground_cutoff: u8,
    /// Flat background shade of header bars
    pub header_background: u8,
    pub header_tolerance: u8,
    pub min_block_area: f64,
    pub min_header_area: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            foreground_cutoff: 250,
            header_background: 225,
            header_tolerance: 5,
            min_block_area: 20_000.0,
            min_header_area: 15_000.0,
        }
    }
}

/// A contour's bounding box plus the polygon area enclosed by its outer border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub rect: Rectangle,
    pub area: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub blocks: Vec<Region>,
    pub headers: Vec<Region>,
}

impl Segmentation {
    pub fn block_rects(&self) -> Vec<Rectangle> {
        self.blocks.iter().map(|r| r.rect).collect()
    }

    pub fn header_rects(&self) -> Vec<Rectangle> {
        self.headers.iter().map(|r| r.rect).collect()
    }
}

pub struct ColorMaskSegmenter {
    config: SegmentConfig,
}

impl ColorMaskSegmenter {
    pub fn new() -> Self {
        Self::with_config(SegmentConfig::default())
    }

    pub fn with_config(config: SegmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Splits a frame into block and header candidates, both sorted top to bottom.
    pub fn segment<I>(&self, frame: &I) -> Segmentation
    where
        I: GenericImageView<Pixel = Rgb<u8>>,
    {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Segmentation::default();
        }

        let cutoff = self.config.foreground_cutoff;
        let foreground = build_mask(frame, |v| v <= cutoff);

        let center = self.config.header_background as i16;
        let tolerance = self.config.header_tolerance as i16;
        let header_band = build_mask(frame, |v| (v as i16 - center).abs() <= tolerance);

        let blocks = external_regions(&foreground, self.config.min_block_area);
        let headers = external_regions(&header_band, self.config.min_header_area);

        debug!(
            "🧩 segment {}x{}: {} blocks, {} headers",
            width,
            height,
            blocks.len(),
            headers.len()
        );

        Segmentation { blocks, headers }
    }
}

impl Default for ColorMaskSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// 按灰度谓词生成二值掩码（255 = 命中）
pub fn build_mask<I, F>(view: &I, predicate: F) -> GrayImage
where
    I: GenericImageView<Pixel = Rgb<u8>>,
    F: Fn(u8) -> bool,
{
    let (width, height) = view.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if predicate(intensity(&view.get_pixel(x, y))) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Top-level outer contours of `mask` whose enclosed area is at least `min_area`,
/// sorted by `y` (stable for equal `y`).
pub fn external_regions(mask: &GrayImage, min_area: f64) -> Vec<Region> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }

    // 边框补一圈背景，否则贴边的区域追踪不到轮廓
    let mut regions: Vec<Region> = find_contours::<i32>(&pad_mask(mask))
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|mut c| {
            for p in c.points.iter_mut() {
                p.x -= 1;
                p.y -= 1;
            }
            let area = polygon_area(&c);
            if area < min_area {
                return None;
            }
            bounding_rect(&c).map(|rect| Region { rect, area })
        })
        .collect();

    regions.sort_by_key(|r| r.rect.y);
    regions
}

/// Copy of `mask` surrounded by a one-pixel background border.
fn pad_mask(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    GrayImage::from_fn(width + 2, height + 2, |x, y| {
        if x == 0 || y == 0 || x > width || y > height {
            Luma([0])
        } else {
            *mask.get_pixel(x - 1, y - 1)
        }
    })
}

/// Shoelace area of the traced border polygon.
pub fn polygon_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area: i64 = 0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

pub fn bounding_rect(contour: &Contour<i32>) -> Option<Rectangle> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if min_x < 0 || min_y < 0 {
        return None;
    }
    Rectangle::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    )
}
