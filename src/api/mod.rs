pub mod scraper;

pub use scraper::OddsScraper;
