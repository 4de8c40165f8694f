pub mod change_detector;
pub mod engine;
pub mod frame;
pub mod ledger;
pub mod logo;
pub mod manager;
pub mod odds_locator;
pub mod record;
pub mod segmenter;
pub mod similarity;

pub use change_detector::{ChangeDetector, ScrollState};
pub use engine::{BlockPairingEngine, OcrRowReader, PairingConfig, RowReader};
pub use frame::{Frame, FrameInfo, Rectangle};
pub use ledger::{normalize, DeduplicationLedger, Fingerprint};
pub use logo::{LogoConfig, LogoMatch, LogoMatcher, LogoSignature};
pub use manager::{CycleOutcome, DetectionManager, DetectionStats, ScrapeConfig};
pub use odds_locator::{OddsLocatorConfig, OddsSubBlockLocator};
pub use record::{render_odds, OddsEntry, ResultRecord};
pub use segmenter::{ColorMaskSegmenter, SegmentConfig, Segmentation};
