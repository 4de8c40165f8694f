//! 赔率抓取器

use crate::core::error::ScrapeError;
use crate::core::ocr::{OcrEngine, SharedOcr};
use crate::core::scrape::{CycleOutcome, DetectionManager, DetectionStats, Frame, ResultRecord, ScrapeConfig};
use image::RgbImage;
use log::info;
use std::path::Path;
use std::time::Duration;

/// 赔率抓取器 - 分块 + logo 过滤 + 配对去重
///
/// ```ignore
/// let mut scraper = OddsScraper::create(ScrapeConfig::default(), Box::new(engine))?;
/// scraper.set_logo_from_file("logo.png")?;
/// let records = scraper.process_frame(&frame)?;
/// ```
pub struct OddsScraper {
    manager: DetectionManager,
    ocr: SharedOcr,
}

impl OddsScraper {
    /// 创建抓取器；OCR 引擎在此之后只通过共享句柄访问
    pub fn create(config: ScrapeConfig, engine: Box<dyn OcrEngine>) -> Result<Self, ScrapeError> {
        let ocr = SharedOcr::new(engine, Duration::from_millis(config.ocr_lock_timeout_ms));
        let manager = DetectionManager::new(config, ocr.clone())?;
        info!("🎰 OddsScraper: created");
        Ok(Self { manager, ocr })
    }

    /// Handle to the shared OCR engine, e.g. for an `OcrTeamTracker`.
    pub fn ocr(&self) -> SharedOcr {
        self.ocr.clone()
    }

    pub fn config(&self) -> &ScrapeConfig {
        self.manager.config()
    }

    pub fn set_logo(&mut self, logo: &RgbImage) -> Result<(), ScrapeError> {
        self.manager.configure_logo(logo).map(|_| ())
    }

    pub fn set_logo_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), ScrapeError> {
        let path = path.as_ref();
        let logo = image::open(path)
            .map_err(|e| ScrapeError::InvalidImage(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        self.set_logo(&logo)
    }

    /// 处理一帧，返回新增结果行
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Vec<ResultRecord>, ScrapeError> {
        Ok(self.manager.process_frame(frame)?.records)
    }

    /// Same as [`process_frame`](Self::process_frame), keeping the annotated preview.
    pub fn process_frame_with_preview(&mut self, frame: &Frame) -> Result<CycleOutcome, ScrapeError> {
        self.manager.process_frame(frame)
    }

    pub fn process_rgba(
        &mut self,
        width: u32,
        height: u32,
        data: &[u8],
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Result<Vec<ResultRecord>, ScrapeError> {
        let frame = Frame::from_rgba(width, height, data, timestamp_ms, frame_number)
            .ok_or_else(|| ScrapeError::InvalidImage(format!("buffer does not match {}x{} RGBA", width, height)))?;
        self.process_frame(&frame)
    }

    /// 球队变化时清空去重记录，返回是否发生了变化
    pub fn update_team_pairing(&mut self, pairing: &str) -> bool {
        self.manager.on_team_pairing(pairing)
    }

    pub fn stats(&self) -> DetectionStats {
        self.manager.stats()
    }

    pub fn reset(&mut self) {
        self.manager.reset()
    }
}

impl Drop for OddsScraper {
    fn drop(&mut self) {
        info!("🗑️ OddsScraper: released");
    }
}
