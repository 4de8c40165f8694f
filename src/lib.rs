pub mod api;
pub mod core;

pub use crate::api::OddsScraper;
pub use crate::core::error::ScrapeError;

/// Installs the process-wide logger. Safe to call more than once.
///
/// Level comes from `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
