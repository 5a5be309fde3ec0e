//! Trend scan orchestration: fetch, fuse, score, persist, notify.

pub mod error;
pub mod fusion;
pub mod gate;
pub mod scanner;
pub mod summary;

pub use error::PipelineError;
pub use fusion::{annotate_products, base_notes, dedup_entries, fuse};
pub use gate::{RunGate, RunPermit, RunStage};
pub use scanner::{ScanSettings, Scanner};
pub use summary::{RunStatus, RunSummary, TriggerSource};
