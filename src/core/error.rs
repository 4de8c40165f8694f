use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Not configured: {0}")]
    NotConfigured(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Capture failed: {0}")]
    Capture(String),
    #[error("OCR error: {0}")]
    Ocr(String),
    #[error("OCR engine busy")]
    OcrBusy,
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
    #[error("Worker error: {0}")]
    Worker(String),
}
