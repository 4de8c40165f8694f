use crate::core::error::ScrapeError;
use image::GrayImage;
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct OcrText {
    pub text: String,
    pub confidence: f32,
}

impl OcrText {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// 外部 OCR 引擎
///
/// Implementations must return an empty list for empty or degenerate images.
/// Instances are not assumed to tolerate concurrent calls; share them through
/// [`SharedOcr`].
pub trait OcrEngine: Send {
    fn read_text(&self, image: &GrayImage) -> Result<Vec<OcrText>, ScrapeError>;
}

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Single OCR engine instance shared by all callers, one call at a time.
#[derive(Clone)]
pub struct SharedOcr {
    engine: Arc<Mutex<Box<dyn OcrEngine>>>,
    lock_timeout: Duration,
}

impl SharedOcr {
    pub fn new(engine: Box<dyn OcrEngine>, lock_timeout: Duration) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            lock_timeout,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Runs one OCR call under the shared lock, waiting at most `lock_timeout`.
    pub fn read_text(&self, image: &GrayImage) -> Result<Vec<OcrText>, ScrapeError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match self.engine.try_lock() {
                Ok(engine) => return engine.read_text(image),
                Err(TryLockError::Poisoned(poisoned)) => {
                    log::warn!("⚠️ OCR lock poisoned, recovering");
                    return poisoned.into_inner().read_text(image);
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(ScrapeError::OcrBusy);
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
            }
        }
    }

    /// Like [`read_text`](Self::read_text) but any failure becomes "no text".
    pub fn read_text_or_empty(&self, image: &GrayImage) -> Vec<OcrText> {
        match self.read_text(image) {
            Ok(texts) => texts,
            Err(e) => {
                log::warn!("⚠️ OCR failed, treating as empty: {}", e);
                Vec::new()
            }
        }
    }
}

type Responder = Box<dyn Fn(&GrayImage) -> Result<Vec<OcrText>, ScrapeError> + Send + Sync>;

/// 测试用 OCR 引擎
pub struct MockOcrEngine {
    responder: Option<Responder>,
}

impl MockOcrEngine {
    /// Never recognises anything.
    pub fn new() -> Self {
        Self { responder: None }
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&GrayImage) -> Result<Vec<OcrText>, ScrapeError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
        }
    }

    pub fn with_fixed_texts(texts: Vec<&str>) -> Self {
        let texts: Vec<OcrText> = texts.into_iter().map(|t| OcrText::new(t, 0.9)).collect();
        Self::with_responder(move |_| Ok(texts.clone()))
    }

    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::with_responder(move |_| Err(ScrapeError::Ocr(message.clone())))
    }
}

impl Default for MockOcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for MockOcrEngine {
    fn read_text(&self, image: &GrayImage) -> Result<Vec<OcrText>, ScrapeError> {
        match self.responder.as_ref() {
            Some(respond) => respond(image),
            None => Ok(Vec::new()),
        }
    }
}
