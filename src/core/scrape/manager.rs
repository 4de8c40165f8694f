//! 检测周期管理器 - 分块、logo 过滤、配对

use super::change_detector::ChangeConfig;
use super::engine::{BlockPairingEngine, EngineStats, OcrRowReader, PairingConfig, RowReader};
use super::frame::{crop_view, Frame, Rectangle};
use super::logo::{LogoConfig, LogoMatch, LogoMatcher, LogoSignature};
use super::odds_locator::{OddsLocatorConfig, OddsSubBlockLocator};
use super::record::ResultRecord;
use super::segmenter::{ColorMaskSegmenter, SegmentConfig};
use crate::core::error::ScrapeError;
use crate::core::ocr::{PreprocessConfig, SharedOcr};
use crate::core::runtime::RuntimeConfig;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

const CONFIRMED_COLOUR: Rgb<u8> = Rgb([0, 200, 0]);
const REJECTED_COLOUR: Rgb<u8> = Rgb([220, 0, 0]);
const HEADER_COLOUR: Rgb<u8> = Rgb([0, 90, 255]);

/// 全部可调参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub segment: SegmentConfig,
    pub logo: LogoConfig,
    pub odds: OddsLocatorConfig,
    pub pairing: PairingConfig,
    pub preprocess: PreprocessConfig,
    pub change: ChangeConfig,
    pub runtime: RuntimeConfig,
    /// Upper bound on the logo-matching pool size
    pub max_threads: usize,
    pub ocr_lock_timeout_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            logo: LogoConfig::default(),
            odds: OddsLocatorConfig::default(),
            pairing: PairingConfig::default(),
            preprocess: PreprocessConfig::default(),
            change: ChangeConfig::default(),
            runtime: RuntimeConfig::default(),
            max_threads: 4,
            ocr_lock_timeout_ms: 10_000,
        }
    }
}

impl ScrapeConfig {
    /// Logo threshold 0.5 instead of 0.7.
    pub fn lenient() -> Self {
        Self {
            logo: LogoConfig::lenient(),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ScrapeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScrapeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

/// 累计统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionStats {
    pub frames_processed: u64,
    pub blocks_confirmed: u64,
    pub blocks_rejected: u64,
    pub headers_found: u64,
    pub engine: EngineStats,
}

/// Result of one detection cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub records: Vec<ResultRecord>,
    /// Frame with confirmed blocks, rejected candidates and headers outlined
    pub preview: RgbImage,
    pub confirmed: Vec<Rectangle>,
    pub headers: Vec<Rectangle>,
}

pub struct DetectionManager {
    config: ScrapeConfig,
    pool: rayon::ThreadPool,
    segmenter: ColorMaskSegmenter,
    matcher: LogoMatcher,
    engine: BlockPairingEngine,
    team_pairing: Option<String>,
    stats: Arc<Mutex<DetectionStats>>,
}

impl DetectionManager {
    /// Reads rows through the shared OCR engine.
    pub fn new(config: ScrapeConfig, ocr: SharedOcr) -> Result<Self, ScrapeError> {
        let reader = OcrRowReader::new(
            OddsSubBlockLocator::new(config.odds.clone()),
            ocr,
            config.preprocess.clone(),
        );
        Self::with_reader(config, Box::new(reader))
    }

    pub fn with_reader(config: ScrapeConfig, reader: Box<dyn RowReader>) -> Result<Self, ScrapeError> {
        let num_threads = num_cpus::get().min(config.max_threads.max(1));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| ScrapeError::ThreadPool(e.to_string()))?;

        debug!("🧵 logo matching pool: {} threads", num_threads);

        Ok(Self {
            segmenter: ColorMaskSegmenter::with_config(config.segment.clone()),
            matcher: LogoMatcher::new(config.logo.clone()),
            engine: BlockPairingEngine::new(config.pairing.clone(), reader),
            pool,
            team_pairing: None,
            stats: Arc::new(Mutex::new(DetectionStats::default())),
            config,
        })
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    pub fn configure_logo(&mut self, logo: &RgbImage) -> Result<LogoSignature, ScrapeError> {
        self.matcher.configure(logo)
    }

    pub fn is_configured(&self) -> bool {
        self.matcher.is_configured()
    }

    pub fn team_pairing(&self) -> Option<&str> {
        self.team_pairing.as_deref()
    }

    /// 单个检测周期：分块 → 并行 logo 匹配 → 配对去重
    pub fn process_frame(&mut self, frame: &Frame) -> Result<CycleOutcome, ScrapeError> {
        if !self.matcher.is_configured() {
            return Err(ScrapeError::NotConfigured("logo not selected".into()));
        }

        let segmentation = self.segmenter.segment(&frame.image);
        let candidates = segmentation.block_rects();
        let headers = segmentation.header_rects();

        let image = &frame.image;
        let matcher = &self.matcher;
        let matches: Vec<LogoMatch> = self.pool.install(|| {
            candidates
                .par_iter()
                .map(|rect| match crop_view(image, rect) {
                    Some(view) => matcher.matches(&*view),
                    None => LogoMatch::miss(),
                })
                .collect()
        });

        let (confirmed, rejected): (Vec<_>, Vec<_>) = candidates
            .iter()
            .zip(&matches)
            .partition(|(_, m)| m.is_match);
        let confirmed: Vec<Rectangle> = confirmed.into_iter().map(|(r, _)| *r).collect();
        let rejected: Vec<Rectangle> = rejected.into_iter().map(|(r, _)| *r).collect();

        debug!(
            "🔍 frame #{}: {} candidates, {} confirmed, {} headers",
            frame.frame_number,
            candidates.len(),
            confirmed.len(),
            headers.len()
        );

        let records = self.engine.process(image, &confirmed, &headers);
        let preview = draw_preview(image, &confirmed, &rejected, &headers);

        if let Ok(mut stats) = self.stats.lock() {
            stats.frames_processed += 1;
            stats.blocks_confirmed += confirmed.len() as u64;
            stats.blocks_rejected += rejected.len() as u64;
            stats.headers_found += headers.len() as u64;
            stats.engine = self.engine.stats().clone();
        }

        Ok(CycleOutcome {
            records,
            preview,
            confirmed,
            headers,
        })
    }

    /// Returns true when the pairing changed and the session was reset.
    pub fn on_team_pairing(&mut self, pairing: &str) -> bool {
        let pairing = pairing.trim();
        if pairing.is_empty() || self.team_pairing.as_deref() == Some(pairing) {
            return false;
        }
        info!("⚽ team pairing changed: {}", pairing);
        self.team_pairing = Some(pairing.to_string());
        self.engine.reset_session();
        true
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.team_pairing = None;
        if let Ok(mut stats) = self.stats.lock() {
            *stats = DetectionStats::default();
        }
    }

    pub fn stats(&self) -> DetectionStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

pub fn draw_preview(
    image: &RgbImage,
    confirmed: &[Rectangle],
    rejected: &[Rectangle],
    headers: &[Rectangle],
) -> RgbImage {
    let mut preview = image.clone();
    for rect in rejected {
        draw_hollow_rect_mut(&mut preview, rect.to_draw_rect(), REJECTED_COLOUR);
    }
    for rect in headers {
        draw_hollow_rect_mut(&mut preview, rect.to_draw_rect(), HEADER_COLOUR);
    }
    for rect in confirmed {
        draw_hollow_rect_mut(&mut preview, rect.to_draw_rect(), CONFIRMED_COLOUR);
    }
    preview
}
