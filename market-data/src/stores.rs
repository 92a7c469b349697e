// Store seams for listing, transaction and metrics data
// The engine only reads these; ingestion services own the rows. In-memory
// implementations back the test suites.

use crate::context::{LiquidityContext, YieldContext};
use anyhow::Result;
use async_trait::async_trait;
use common::{ListingRecord, TransactionRecord};

/// Tiered filter over the transaction registry. `area` is the resolved
/// canonical area name; every optional field narrows the candidate set.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub area: String,
    pub property_type: Option<String>,
    pub bedrooms: Option<String>,
    /// Inclusive size band in sqft
    pub size_range: Option<(f64, f64)>,
    pub building_name: Option<String>,
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Transactions matching the filter, most recent first.
    async fn find(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn active_listings(&self) -> Result<Vec<ListingRecord>>;
}

#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Rental yield snapshot for an area + segment, if one has been computed
    async fn yield_context(&self, geo_id: &str, segment: &str) -> Result<Option<YieldContext>>;

    /// Days-on-market / liquidity view for an area + property type
    async fn liquidity_context(
        &self,
        geo_id: &str,
        property_type: &str,
    ) -> Result<Option<LiquidityContext>>;
}

fn eq_ci(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn building_matches(candidate: &str, wanted: &str) -> bool {
    let c = candidate.trim().to_lowercase();
    let w = wanted.trim().to_lowercase();
    !c.is_empty() && !w.is_empty() && (c == w || c.contains(&w) || w.contains(&c))
}

/// In-memory transaction registry for tests
pub struct InMemoryTransactionStore {
    records: Vec<TransactionRecord>,
}

impl InMemoryTransactionStore {
    pub fn new(records: Vec<TransactionRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn find(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        let mut out: Vec<TransactionRecord> = self
            .records
            .iter()
            .filter(|t| eq_ci(&t.area, &filter.area))
            .filter(|t| {
                filter
                    .property_type
                    .as_ref()
                    .map_or(true, |pt| eq_ci(&t.property_type, pt))
            })
            .filter(|t| {
                filter.bedrooms.as_ref().map_or(true, |beds| {
                    t.bedrooms.as_ref().map_or(false, |b| eq_ci(b, beds))
                })
            })
            .filter(|t| {
                filter
                    .size_range
                    .map_or(true, |(lo, hi)| t.size_sqft >= lo && t.size_sqft <= hi)
            })
            .filter(|t| {
                filter.building_name.as_ref().map_or(true, |wanted| {
                    t.building_name
                        .as_ref()
                        .map_or(false, |b| building_matches(b, wanted))
                })
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.transacted_at.cmp(&a.transacted_at));
        Ok(out)
    }
}

/// In-memory listing store for tests
pub struct InMemoryListingStore {
    listings: Vec<ListingRecord>,
}

impl InMemoryListingStore {
    pub fn new(listings: Vec<ListingRecord>) -> Self {
        Self { listings }
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn active_listings(&self) -> Result<Vec<ListingRecord>> {
        Ok(self
            .listings
            .iter()
            .filter(|l| l.is_active)
            .cloned()
            .collect())
    }
}

/// In-memory metrics snapshots for tests, keyed by (geo_id, segment) for
/// yield and (geo_id, property_type) for liquidity
#[derive(Default)]
pub struct InMemoryMetricsStore {
    pub yields: std::collections::HashMap<(String, String), YieldContext>,
    pub liquidity: std::collections::HashMap<(String, String), LiquidityContext>,
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn yield_context(&self, geo_id: &str, segment: &str) -> Result<Option<YieldContext>> {
        Ok(self
            .yields
            .get(&(geo_id.to_string(), segment.to_string()))
            .cloned())
    }

    async fn liquidity_context(
        &self,
        geo_id: &str,
        property_type: &str,
    ) -> Result<Option<LiquidityContext>> {
        Ok(self
            .liquidity
            .get(&(geo_id.to_string(), property_type.to_lowercase()))
            .cloned())
    }
}
