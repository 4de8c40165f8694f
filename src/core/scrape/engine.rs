use super::frame::{crop_owned, crop_view, Rectangle};
use super::ledger::DeduplicationLedger;
use super::odds_locator::OddsSubBlockLocator;
use super::record::{render_odds, OddsEntry, ResultRecord, UNKNOWN_HEADER};
use super::similarity::suppress_near_duplicates;
use crate::core::error::ScrapeError;
use crate::core::ocr::{read_header_text, read_odds_cell, PreprocessConfig, SharedOcr};
use image::{GenericImageView, RgbImage, SubImage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Medium rows satisfy `medium_min < height < medium_max`
    pub medium_min: u32,
    pub medium_max: u32,
    /// Large rows satisfy `height > large_min`
    pub large_min: u32,
    /// Distance from the capture edge under which a block counts as touching it
    pub edge_margin: u32,
    pub orphan_capacity: usize,
    pub label_similarity: f32,
    pub odds_tolerance: f64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            medium_min: 150,
            medium_max: 200,
            large_min: 400,
            edge_margin: 10,
            orphan_capacity: 2,
            label_similarity: 0.9,
            odds_tolerance: 0.01,
        }
    }
}

/// Reads text out of block and header crops.
pub trait RowReader: Send + Sync {
    fn read_odds(&self, block: &SubImage<&RgbImage>) -> Result<Vec<OddsEntry>, ScrapeError>;
    fn read_header(&self, header: &SubImage<&RgbImage>) -> Result<String, ScrapeError>;
}

/// 基于共享 OCR 的读取器：定位赔率单元格后逐个识别
pub struct OcrRowReader {
    locator: OddsSubBlockLocator,
    ocr: SharedOcr,
    preprocess: PreprocessConfig,
}

impl OcrRowReader {
    pub fn new(locator: OddsSubBlockLocator, ocr: SharedOcr, preprocess: PreprocessConfig) -> Self {
        Self {
            locator,
            ocr,
            preprocess,
        }
    }
}

impl RowReader for OcrRowReader {
    fn read_odds(&self, block: &SubImage<&RgbImage>) -> Result<Vec<OddsEntry>, ScrapeError> {
        let cells = self.locator.locate_odds_cells(&**block);
        let entries = cells
            .iter()
            .map(|cell| {
                let view = GenericImageView::view(&**block, cell.x, cell.y, cell.width, cell.height);
                read_odds_cell(&self.ocr, &*view, &self.preprocess)
            })
            .collect();
        Ok(entries)
    }

    fn read_header(&self, header: &SubImage<&RgbImage>) -> Result<String, ScrapeError> {
        Ok(read_header_text(&self.ocr, &**header, &self.preprocess))
    }
}

/// 被采集边界截断的半行（像素已复制，可跨帧保留）
#[derive(Debug, Clone)]
pub struct OrphanBlock {
    pub rect: Rectangle,
    pub pixels: RgbImage,
    pub header_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClass {
    Medium,
    TopPortion,
    BottomPortion,
    General,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub records_emitted: u64,
    pub duplicates_dropped: u64,
    pub orphans_stored: u64,
    pub orphans_merged: u64,
    pub unpaired_dropped: u64,
    pub block_errors: u64,
}

pub struct BlockPairingEngine {
    config: PairingConfig,
    reader: Box<dyn RowReader>,
    orphans: VecDeque<OrphanBlock>,
    ledger: DeduplicationLedger,
    next_id: u64,
    stats: EngineStats,
}

impl BlockPairingEngine {
    pub fn new(config: PairingConfig, reader: Box<dyn RowReader>) -> Self {
        let capacity = config.orphan_capacity.max(1);
        Self {
            config,
            reader,
            orphans: VecDeque::with_capacity(capacity),
            ledger: DeduplicationLedger::new(),
            next_id: 1,
            stats: EngineStats::default(),
        }
    }

    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn ledger(&self) -> &DeduplicationLedger {
        &self.ledger
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    /// Team context changed: forget emitted rows and restart ids at 1.
    pub fn reset_session(&mut self) {
        self.ledger.reset();
        self.next_id = 1;
    }

    pub fn reset(&mut self) {
        self.reset_session();
        self.orphans.clear();
        self.stats = EngineStats::default();
    }

    /// Classifies a lone block by height and, for large ones, by which capture edge it touches.
    pub fn classify(&self, block: &Rectangle, roi_height: u32) -> BlockClass {
        let cfg = &self.config;
        let height = block.height;
        if height > cfg.medium_min && height < cfg.medium_max {
            return BlockClass::Medium;
        }
        if height > cfg.large_min {
            let margin = cfg.edge_margin;
            let inner_bottom = roi_height.saturating_sub(margin);
            if block.y > margin && block.bottom() > inner_bottom {
                return BlockClass::TopPortion;
            }
            if block.y < margin && block.bottom() < inner_bottom {
                return BlockClass::BottomPortion;
            }
        }
        BlockClass::General
    }

    /// One detection cycle. `blocks` are logo-confirmed rows, `headers` title bars;
    /// both in frame coordinates.
    pub fn process(
        &mut self,
        frame: &RgbImage,
        blocks: &[Rectangle],
        headers: &[Rectangle],
    ) -> Vec<ResultRecord> {
        let (width, height) = frame.dimensions();
        let mut blocks: Vec<Rectangle> = blocks.iter().filter_map(|b| b.clip(width, height)).collect();
        let mut headers: Vec<Rectangle> =
            headers.iter().filter_map(|h| h.clip(width, height)).collect();
        blocks.sort_by_key(|b| b.y);
        headers.sort_by_key(|h| h.y);

        if blocks.is_empty() {
            return Vec::new();
        }

        if let [block] = blocks.as_slice() {
            let block = *block;
            match self.classify(&block, height) {
                BlockClass::Medium => {
                    return self.process_medium(frame, &block, &headers).into_iter().collect();
                }
                BlockClass::TopPortion => {
                    self.store_orphan(frame, &block, &headers);
                    return Vec::new();
                }
                BlockClass::BottomPortion => {
                    return self.merge_orphan(frame, &block, &headers).into_iter().collect();
                }
                BlockClass::General => {}
            }
        }

        self.process_general(frame, &blocks, &headers)
    }

    fn process_medium(
        &mut self,
        frame: &RgbImage,
        block: &Rectangle,
        headers: &[Rectangle],
    ) -> Option<ResultRecord> {
        let header_text = match headers {
            [header] => self.header_text(frame, header),
            _ => UNKNOWN_HEADER.to_string(),
        };
        let entries = self.block_entries(frame, block)?;
        debug!("📦 medium block at y={} ({} cells)", block.y, entries.len());
        self.emit(header_text, &entries)
    }

    fn store_orphan(&mut self, frame: &RgbImage, block: &Rectangle, headers: &[Rectangle]) {
        let Some(pixels) = crop_owned(frame, block) else {
            return;
        };
        let header_text = self
            .header_above(headers, block)
            .map(|h| self.header_text(frame, &h));

        if self.orphans.len() >= self.config.orphan_capacity.max(1) {
            self.orphans.pop_front();
        }
        self.orphans.push_back(OrphanBlock {
            rect: *block,
            pixels,
            header_text,
        });
        self.stats.orphans_stored += 1;
        info!(
            "🧷 top portion stored (y={}..{}), {} pending",
            block.y,
            block.bottom(),
            self.orphans.len()
        );
    }

    fn merge_orphan(
        &mut self,
        frame: &RgbImage,
        block: &Rectangle,
        headers: &[Rectangle],
    ) -> Option<ResultRecord> {
        let Some(orphan) = self.orphans.pop_back() else {
            warn!(
                "⚠️ bottom portion at y={}..{} has no stored top portion, dropped",
                block.y,
                block.bottom()
            );
            self.stats.unpaired_dropped += 1;
            return None;
        };
        let top_entries = self.orphan_entries(&orphan);
        let bottom_entries = self.block_entries(frame, block).unwrap_or_default();

        let header_text = self
            .header_above(headers, block)
            .map(|h| self.header_text(frame, &h))
            .or(orphan.header_text)
            .unwrap_or_else(|| UNKNOWN_HEADER.to_string());
        self.orphans.clear();

        if top_entries.is_empty() && bottom_entries.is_empty() {
            warn!(
                "⚠️ split row at y={}..{} has no readable odds in either half",
                block.y,
                block.bottom()
            );
            return None;
        }

        let combined: Vec<OddsEntry> = top_entries.into_iter().chain(bottom_entries).collect();
        let before = combined.len();
        let merged = suppress_near_duplicates(
            combined,
            self.config.label_similarity,
            self.config.odds_tolerance,
        );
        self.stats.orphans_merged += 1;
        info!(
            "🔗 merged split row: {} cells ({} overlapping dropped)",
            merged.len(),
            before - merged.len()
        );

        self.emit(header_text, &merged)
    }

    fn process_general(
        &mut self,
        frame: &RgbImage,
        blocks: &[Rectangle],
        headers: &[Rectangle],
    ) -> Vec<ResultRecord> {
        let mut used: HashSet<usize> = HashSet::new();
        let mut records = Vec::new();

        for header in headers {
            let found = blocks
                .iter()
                .enumerate()
                .find(|(i, b)| !used.contains(i) && b.y > header.y);
            let Some((index, block)) = found else {
                debug!("header at y={} has no block below it", header.y);
                continue;
            };
            used.insert(index);

            let header_text = self.header_text(frame, header);
            if let Some(entries) = self.block_entries(frame, block) {
                records.extend(self.emit(header_text, &entries));
            }
        }

        records
    }

    /// Lowest header whose top edge lies above the block.
    fn header_above(&self, headers: &[Rectangle], block: &Rectangle) -> Option<Rectangle> {
        headers.iter().rev().find(|h| h.y < block.y).copied()
    }

    fn header_text(&mut self, frame: &RgbImage, header: &Rectangle) -> String {
        let Some(view) = crop_view(frame, header) else {
            return UNKNOWN_HEADER.to_string();
        };
        match self.reader.read_header(&view) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => UNKNOWN_HEADER.to_string(),
            Err(e) => {
                warn!("⚠️ header at y={} unreadable: {}", header.y, e);
                UNKNOWN_HEADER.to_string()
            }
        }
    }

    /// Odds of a stored top portion; empty when it cannot be read.
    fn orphan_entries(&mut self, orphan: &OrphanBlock) -> Vec<OddsEntry> {
        let Some(view) = crop_view(&orphan.pixels, &orphan.rect.local()) else {
            return Vec::new();
        };
        match self.reader.read_odds(&view) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("⚠️ stored top portion unreadable: {}", e);
                self.stats.block_errors += 1;
                Vec::new()
            }
        }
    }

    /// `None` when the block cannot be read or holds no odds cells.
    fn block_entries(&mut self, frame: &RgbImage, block: &Rectangle) -> Option<Vec<OddsEntry>> {
        let view = crop_view(frame, block)?;
        match self.reader.read_odds(&view) {
            Ok(entries) if entries.is_empty() => {
                debug!("block at y={} has no odds cells", block.y);
                None
            }
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!("⚠️ block at y={} skipped: {}", block.y, e);
                self.stats.block_errors += 1;
                None
            }
        }
    }

    fn emit(&mut self, header_text: String, entries: &[OddsEntry]) -> Option<ResultRecord> {
        let odds_text = render_odds(entries);
        let decision = self.ledger.check_and_record(&odds_text);
        if decision.is_duplicate {
            debug!("♻️ duplicate row {} dropped", decision.fingerprint);
            self.stats.duplicates_dropped += 1;
            return None;
        }

        let record = ResultRecord {
            sequence_id: self.next_id,
            header_text,
            odds_text,
        };
        self.next_id += 1;
        self.stats.records_emitted += 1;
        Some(record)
    }
}
