pub mod error;
pub mod ocr;
pub mod runtime;
pub mod scrape;

pub use error::ScrapeError;
