use super::frame::Rectangle;
use super::segmenter::{build_mask, external_regions};
use image::{GenericImageView, Rgb};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsLocatorConfig {
    /// Cells are searched right of this share of the block width
    pub region_offset_ratio: f32,
    pub min_cell_area: f64,
    pub foreground_cutoff: u8,
    /// Cells whose top edges differ by at most this many pixels share a line
    pub row_tolerance: u32,
}

impl Default for OddsLocatorConfig {
    fn default() -> Self {
        Self {
            region_offset_ratio: 0.4,
            min_cell_area: 1500.0,
            foreground_cutoff: 250,
            row_tolerance: 10,
        }
    }
}

pub struct OddsSubBlockLocator {
    config: OddsLocatorConfig,
}

impl OddsSubBlockLocator {
    pub fn new(config: OddsLocatorConfig) -> Self {
        Self { config }
    }

    /// 在块右侧区域定位赔率单元格，返回块内坐标，按阅读顺序排列
    pub fn locate_odds_cells<I>(&self, block: &I) -> Vec<Rectangle>
    where
        I: GenericImageView<Pixel = Rgb<u8>>,
    {
        let (width, height) = block.dimensions();
        let offset = (width as f32 * self.config.region_offset_ratio) as u32;
        if offset >= width || height == 0 {
            return Vec::new();
        }

        let region = block.view(offset, 0, width - offset, height);
        let cutoff = self.config.foreground_cutoff;
        let mask = build_mask(&*region, |v| v <= cutoff);

        let cells: Vec<Rectangle> = external_regions(&mask, self.config.min_cell_area)
            .into_iter()
            .map(|r| r.rect.translate(offset, 0))
            .collect();

        reading_order(cells, self.config.row_tolerance)
    }
}

impl Default for OddsSubBlockLocator {
    fn default() -> Self {
        Self::new(OddsLocatorConfig::default())
    }
}

/// Top-to-bottom lines, left-to-right within a line.
pub fn reading_order(mut cells: Vec<Rectangle>, row_tolerance: u32) -> Vec<Rectangle> {
    cells.sort_by_key(|c| (c.y, c.x));

    let mut lines: Vec<Vec<Rectangle>> = Vec::new();
    for cell in cells {
        match lines.last_mut() {
            Some(line) if cell.y - line[0].y <= row_tolerance => line.push(cell),
            _ => lines.push(vec![cell]),
        }
    }

    lines
        .into_iter()
        .flat_map(|mut line| {
            line.sort_by_key(|c| c.x);
            line
        })
        .collect()
}
