//! Subtitle translation: engine client, batch orchestration with retry and
//! count-parity repair, and deterministic line reflow.

pub mod batcher;
pub mod engine;
pub mod error;
pub mod parse;
pub mod reflow;

pub use batcher::{BatcherConfig, TranslationBatcher};
pub use engine::{GeminiConfig, GeminiEngine, TranslationEngine};
pub use error::{TranslateError, TranslateResult};
pub use parse::{parse_numbered_response, ParseOutcome};
pub use reflow::{reflow, visible_len, MAX_LINE_WIDTH};
