pub mod engine;
pub mod extract;
pub mod preprocess;

pub use engine::{MockOcrEngine, OcrEngine, OcrText, SharedOcr};
pub use extract::{
    header_from_texts, odds_entry_from_texts, read_header_text, read_odds_cell,
    team_pairing_from_texts,
};
pub use preprocess::{prepare_for_ocr, PreprocessConfig};
