pub mod context;
pub mod error;
pub mod progress;
pub mod runner;
pub mod state;

pub use context::ScanContext;
pub use error::{ScanError, ScanWarning};
pub use progress::{LogProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{BatchSummary, ScanOrchestrator, ScanSettings, SCRATCH_ANNOTATED, SCRATCH_IMAGE};
pub use state::ScanState;
