// Market Data Access (Layer 1)
// Store seams for listings, transactions and market metrics, plus the tiered
// comparable selector and the yield/liquidity context providers.

pub mod comparables;
pub mod context;
pub mod pg;
pub mod stores;

pub use comparables::{ComparableQuery, ComparableSelector, ComparableSet, MatchTier, SelectorConfig};
pub use context::{ContextProvider, ContextProviderConfig, LiquidityContext, YieldContext};
pub use pg::{PgGeoStore, PgListingStore, PgMetricsStore, PgTransactionStore};
pub use stores::{
    InMemoryListingStore, InMemoryMetricsStore, InMemoryTransactionStore, ListingStore,
    MetricsStore, TransactionFilter, TransactionStore,
};
