//! 采集 / 检测线程
//!
//! One producer thread polls the frame source and watches for the region to
//! settle. Each settled frame starts at most one detection worker; if the
//! previous worker is still running the frame is dropped.

use super::queue::LatestQueue;
use crate::core::error::ScrapeError;
use crate::core::ocr::{extract::read_texts, team_pairing_from_texts, PreprocessConfig, SharedOcr};
use crate::core::scrape::change_detector::{ChangeDetector, ScrollState};
use crate::core::scrape::frame::{Frame, Rectangle};
use crate::core::scrape::manager::DetectionManager;
use crate::core::scrape::record::ResultRecord;
use image::RgbImage;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub poll_interval_ms: u64,
    pub join_timeout_ms: u64,
    pub preview_capacity: usize,
    pub capture_region: Option<Rectangle>,
    /// Region holding the team names, read to detect a new match
    pub team_region: Option<Rectangle>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            join_timeout_ms: 1000,
            preview_capacity: 2,
            capture_region: None,
            team_region: None,
        }
    }
}

/// 屏幕采集端，返回已去除 alpha 的 RGB 帧
pub trait FrameSource: Send {
    fn capture(&mut self, region: &Rectangle) -> Result<Frame, ScrapeError>;
}

/// Append-only consumer of finished rows.
pub trait ResultSink: Send + Sync {
    fn emit(&self, record: ResultRecord);
    /// Team context changed; previously emitted rows belong to the old match.
    fn reset(&self);
}

pub trait TeamTracker: Send {
    /// Current `"home vs away"` pairing, or empty when unknown.
    fn current_team_pairing(&mut self) -> String;
}

/// Reads the team pairing from a fixed screen region via OCR.
pub struct OcrTeamTracker {
    source: Box<dyn FrameSource>,
    region: Rectangle,
    ocr: SharedOcr,
    preprocess: PreprocessConfig,
}

impl OcrTeamTracker {
    pub fn new(
        source: Box<dyn FrameSource>,
        region: Rectangle,
        ocr: SharedOcr,
        preprocess: PreprocessConfig,
    ) -> Self {
        Self {
            source,
            region,
            ocr,
            preprocess,
        }
    }
}

impl TeamTracker for OcrTeamTracker {
    fn current_team_pairing(&mut self) -> String {
        match self.source.capture(&self.region) {
            Ok(frame) => {
                let texts = read_texts(&self.ocr, &frame.image, &self.preprocess);
                team_pairing_from_texts(&texts).unwrap_or_default()
            }
            Err(e) => {
                warn!("⚠️ team region capture failed: {}", e);
                String::new()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultEvent {
    Record(ResultRecord),
    Reset,
}

/// Forwards sink calls over an mpsc channel to the UI thread.
pub struct ChannelSink {
    sender: Mutex<Sender<ResultEvent>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<ResultEvent>) {
        let (sender, receiver) = channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }

    fn send(&self, event: ResultEvent) {
        if let Ok(sender) = self.sender.lock() {
            if sender.send(event).is_err() {
                debug!("result receiver gone, event discarded");
            }
        }
    }
}

impl ResultSink for ChannelSink {
    fn emit(&self, record: ResultRecord) {
        self.send(ResultEvent::Record(record));
    }

    fn reset(&self) {
        self.send(ResultEvent::Reset);
    }
}

/// Clears the in-flight flag when the worker finishes, even on panic.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct WorkerContext {
    manager: Arc<Mutex<DetectionManager>>,
    sink: Arc<dyn ResultSink>,
    tracker: Option<Arc<Mutex<Box<dyn TeamTracker>>>>,
    previews: Arc<LatestQueue<RgbImage>>,
    in_flight: Arc<AtomicBool>,
}

impl WorkerContext {
    fn try_spawn(&self, frame: Frame) -> Option<JoinHandle<()>> {
        let guard = InFlightGuard::try_acquire(&self.in_flight)?;
        let manager = self.manager.clone();
        let sink = self.sink.clone();
        let tracker = self.tracker.clone();
        let previews = self.previews.clone();

        Some(thread::spawn(move || {
            let _guard = guard;
            run_detection(&manager, sink.as_ref(), tracker.as_ref(), &previews, &frame);
        }))
    }
}

fn run_detection(
    manager: &Mutex<DetectionManager>,
    sink: &dyn ResultSink,
    tracker: Option<&Arc<Mutex<Box<dyn TeamTracker>>>>,
    previews: &LatestQueue<RgbImage>,
    frame: &Frame,
) {
    let mut manager = match manager.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if let Some(tracker) = tracker {
        let pairing = match tracker.lock() {
            Ok(mut t) => t.current_team_pairing(),
            Err(_) => String::new(),
        };
        if manager.on_team_pairing(&pairing) {
            sink.reset();
        }
    }

    match manager.process_frame(frame) {
        Ok(outcome) => {
            for record in outcome.records {
                info!(
                    "📝 row #{} [{}] {}",
                    record.sequence_id, record.header_text, record.odds_text
                );
                sink.emit(record);
            }
            previews.push(outcome.preview);
        }
        Err(e) => error!("❌ detection cycle failed on frame #{}: {}", frame.frame_number, e),
    }
}

/// Running producer thread plus the handles needed to stop it.
pub struct DetectionRunner {
    stop_flag: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    manager: Arc<Mutex<DetectionManager>>,
    previews: Arc<LatestQueue<RgbImage>>,
    join_timeout: Duration,
}

impl DetectionRunner {
    /// Validates configuration, then spawns the producer thread.
    pub fn start(
        manager: DetectionManager,
        source: Box<dyn FrameSource>,
        sink: Arc<dyn ResultSink>,
        tracker: Option<Box<dyn TeamTracker>>,
    ) -> Result<Self, ScrapeError> {
        let config = manager.config().runtime.clone();
        let region = config
            .capture_region
            .filter(|r| r.width > 0 && r.height > 0)
            .ok_or_else(|| ScrapeError::NotConfigured("capture region not selected".into()))?;
        if !manager.is_configured() {
            return Err(ScrapeError::NotConfigured("logo not selected".into()));
        }
        let change_threshold = manager.config().change.threshold;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let manager = Arc::new(Mutex::new(manager));
        let previews = Arc::new(LatestQueue::new(config.preview_capacity));

        let context = WorkerContext {
            manager: manager.clone(),
            sink,
            tracker: tracker.map(|t| Arc::new(Mutex::new(t))),
            previews: previews.clone(),
            in_flight: Arc::new(AtomicBool::new(false)),
        };

        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let flag = stop_flag.clone();
        let producer = thread::Builder::new()
            .name("odds-capture".into())
            .spawn(move || {
                produce(
                    source,
                    region,
                    ChangeDetector::with_threshold(change_threshold),
                    poll_interval,
                    &flag,
                    &context,
                )
            })
            .map_err(|e| ScrapeError::Worker(e.to_string()))?;

        info!(
            "▶️ detection started on {}x{} region at ({}, {})",
            region.width, region.height, region.x, region.y
        );

        Ok(Self {
            stop_flag,
            producer: Some(producer),
            manager,
            previews,
            join_timeout: Duration::from_millis(config.join_timeout_ms),
        })
    }

    pub fn is_running(&self) -> bool {
        self.producer.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    pub fn previews(&self) -> &LatestQueue<RgbImage> {
        &self.previews
    }

    pub fn manager(&self) -> Arc<Mutex<DetectionManager>> {
        self.manager.clone()
    }

    /// Signals the producer and waits up to the join timeout.
    /// Returns false when the thread had to be left running.
    pub fn stop(&mut self) -> bool {
        self.stop_flag.store(true, Ordering::SeqCst);
        let Some(handle) = self.producer.take() else {
            return true;
        };

        let deadline = Instant::now() + self.join_timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if handle.is_finished() {
            if handle.join().is_err() {
                error!("❌ capture thread panicked");
            }
            info!("⏹️ detection stopped");
            true
        } else {
            warn!(
                "⚠️ capture thread still busy after {:?}, detaching",
                self.join_timeout
            );
            false
        }
    }
}

impl Drop for DetectionRunner {
    fn drop(&mut self) {
        if self.producer.is_some() {
            self.stop();
        }
    }
}

fn produce(
    mut source: Box<dyn FrameSource>,
    region: Rectangle,
    mut detector: ChangeDetector,
    poll_interval: Duration,
    stop_flag: &AtomicBool,
    context: &WorkerContext,
) {
    let mut handled_settle = false;
    let mut last_worker: Option<JoinHandle<()>> = None;

    while !stop_flag.load(Ordering::SeqCst) {
        match source.capture(&region) {
            Ok(frame) => match detector.observe(&frame.image) {
                ScrollState::First | ScrollState::Changing => handled_settle = false,
                ScrollState::Settled if !handled_settle => {
                    handled_settle = true;
                    let info = frame.info();
                    match context.try_spawn(frame) {
                        Some(handle) => {
                            debug!(
                                "📸 settled frame #{} ({}x{}) sent to detection",
                                info.frame_number, info.width, info.height
                            );
                            last_worker = Some(handle);
                        }
                        None => debug!("⏭️ detection busy, settled frame #{} dropped", info.frame_number),
                    }
                }
                ScrollState::Settled => {}
            },
            Err(e) => warn!("⚠️ capture failed: {}", e),
        }
        thread::sleep(poll_interval);
    }

    // 让最后一个检测周期跑完；超时由 stop() 控制
    if let Some(handle) = last_worker {
        if handle.join().is_err() {
            error!("❌ detection worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ocr::MockOcrEngine;
    use crate::core::scrape::manager::ScrapeConfig;
    use image::Rgb;

    struct StillSource;

    impl FrameSource for StillSource {
        fn capture(&mut self, region: &Rectangle) -> Result<Frame, ScrapeError> {
            let image = RgbImage::from_pixel(region.width, region.height, Rgb([255, 255, 255]));
            Ok(Frame::new(image, 0, 0))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        records: Mutex<Vec<ResultRecord>>,
        resets: Mutex<u32>,
    }

    impl ResultSink for CountingSink {
        fn emit(&self, record: ResultRecord) {
            self.records.lock().unwrap().push(record);
        }

        fn reset(&self) {
            *self.resets.lock().unwrap() += 1;
        }
    }

    struct FixedTeams(&'static str);

    impl TeamTracker for FixedTeams {
        fn current_team_pairing(&mut self) -> String {
            self.0.to_string()
        }
    }

    fn config() -> ScrapeConfig {
        let mut config = ScrapeConfig::default();
        config.runtime.poll_interval_ms = 5;
        config.runtime.capture_region = Rectangle::new(0, 0, 120, 80);
        config
    }

    fn manager(config: ScrapeConfig, with_logo: bool) -> DetectionManager {
        let ocr = SharedOcr::new(Box::new(MockOcrEngine::new()), Duration::from_secs(1));
        let mut manager = DetectionManager::new(config, ocr).unwrap();
        if with_logo {
            manager
                .configure_logo(&RgbImage::from_pixel(20, 20, Rgb([200, 0, 0])))
                .unwrap();
        }
        manager
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_missing_region_rejected_before_start() {
        let mut config = config();
        config.runtime.capture_region = None;
        let result = DetectionRunner::start(
            manager(config, true),
            Box::new(StillSource),
            Arc::new(CountingSink::default()),
            None,
        );
        assert!(matches!(result, Err(ScrapeError::NotConfigured(_))));
    }

    #[test]
    fn test_missing_logo_rejected_before_start() {
        let result = DetectionRunner::start(
            manager(config(), false),
            Box::new(StillSource),
            Arc::new(CountingSink::default()),
            None,
        );
        assert!(matches!(result, Err(ScrapeError::NotConfigured(_))));
    }

    #[test]
    fn test_settled_frame_runs_one_cycle() {
        let sink = Arc::new(CountingSink::default());
        let mut runner = DetectionRunner::start(
            manager(config(), true),
            Box::new(StillSource),
            sink.clone(),
            Some(Box::new(FixedTeams("A vs B"))),
        )
        .unwrap();

        assert!(wait_until(|| !runner.previews().is_empty()));
        assert!(runner.stop());
        assert!(!runner.is_running());

        // still frames settle once, so exactly one cycle ran
        let manager = runner.manager();
        let stats = manager.lock().unwrap().stats();
        assert_eq!(stats.frames_processed, 1);
        assert_eq!(*sink.resets.lock().unwrap(), 1);
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut runner = DetectionRunner::start(
            manager(config(), true),
            Box::new(StillSource),
            Arc::new(CountingSink::default()),
            None,
        )
        .unwrap();
        assert!(runner.is_running());
        assert!(runner.stop());
        assert!(runner.stop());
    }

    #[test]
    fn test_in_flight_guard_is_exclusive() {
        let flag = Arc::new(AtomicBool::new(false));
        let first = InFlightGuard::try_acquire(&flag);
        assert!(first.is_some());
        assert!(InFlightGuard::try_acquire(&flag).is_none());
        drop(first);
        assert!(InFlightGuard::try_acquire(&flag).is_some());
    }

    #[test]
    fn test_channel_sink_forwards_events() {
        let (sink, receiver) = ChannelSink::new();
        sink.reset();
        sink.emit(ResultRecord {
            sequence_id: 1,
            header_text: "Unknown".into(),
            odds_text: "(-, -)".into(),
        });
        assert_eq!(receiver.recv().unwrap(), ResultEvent::Reset);
        assert!(matches!(receiver.recv().unwrap(), ResultEvent::Record(r) if r.sequence_id == 1));
    }
}
