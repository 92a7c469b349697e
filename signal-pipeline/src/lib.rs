// Signal Pipeline (Layer 3)
// Drives comparable selection and deal scoring across all active listings and
// upserts the resulting pricing-opportunity signals idempotently.

pub mod pipeline;
pub mod report;
pub mod signals;
pub mod storage;

pub use pipeline::{
    NeutralSentimentProvider, PipelineConfig, SentimentProvider, SignalPipeline,
};
pub use report::RunReport;
pub use signals::build_signal;
pub use storage::{InMemorySignalStore, PgSignalStore, SignalStore};
