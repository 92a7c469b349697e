// Shared domain types and infrastructure (Layer 0)
// Consumed by every other crate in the workspace

pub mod batch;
pub mod rate_limit;
pub mod retry;
pub mod types;

pub use batch::{process_in_batches, BatchConfig};
pub use rate_limit::SlidingWindowRateLimiter;
pub use retry::{retry_with_backoff, RetryConfig};
pub use types::{
    segment_label, signal_key, GeoReference, GeoType, ListingRecord, Signal, SignalSeverity,
    SignalStatus, TransactionRecord, SIGNAL_TYPE_PRICING_OPPORTUNITY,
};
