// Yield & Liquidity Context Provider
// Area-level scoring inputs behind a TTL cache; snapshots change on the order
// of hours, the pipeline reads them per listing.

use crate::stores::MetricsStore;
use anyhow::Result;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Rental yield snapshot for one area + segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldContext {
    pub median_annual_rent: Option<Decimal>,
    /// Gross yield for the area as a fraction, e.g. 0.065
    pub area_gross_yield: Option<f64>,
}

/// Days-on-market view for one area + property type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityContext {
    pub avg_days_on_market: f64,
    pub median_days_on_market: f64,
    pub stale_listings: u32,
    pub fresh_listings: u32,
    /// Precomputed 0-1 liquidity score
    pub liquidity_score: f64,
}

#[derive(Debug, Clone)]
pub struct ContextProviderConfig {
    pub cache_ttl: Duration,
}

impl Default for ContextProviderConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60 * 60),
        }
    }
}

enum Cached<T> {
    Hit(T),
    Miss,
}

/// TTL-cached front for the metrics store
pub struct ContextProvider {
    store: Arc<dyn MetricsStore>,
    config: ContextProviderConfig,
    yields: DashMap<(String, String), (Instant, Option<YieldContext>)>,
    liquidity: DashMap<(String, String), (Instant, Option<LiquidityContext>)>,
}

impl ContextProvider {
    pub fn new(store: Arc<dyn MetricsStore>, config: ContextProviderConfig) -> Self {
        Self {
            store,
            config,
            yields: DashMap::new(),
            liquidity: DashMap::new(),
        }
    }

    pub async fn yield_context(&self, geo_id: &str, segment: &str) -> Result<Option<YieldContext>> {
        let key = (geo_id.to_string(), segment.to_string());
        if let Cached::Hit(v) = self.cached(&self.yields, &key) {
            return Ok(v);
        }
        let value = self.store.yield_context(geo_id, segment).await?;
        self.yields.insert(key, (Instant::now(), value.clone()));
        Ok(value)
    }

    pub async fn liquidity_context(
        &self,
        geo_id: &str,
        property_type: &str,
    ) -> Result<Option<LiquidityContext>> {
        let key = (geo_id.to_string(), property_type.to_lowercase());
        if let Cached::Hit(v) = self.cached(&self.liquidity, &key) {
            return Ok(v);
        }
        let value = self.store.liquidity_context(geo_id, &key.1).await?;
        self.liquidity.insert(key, (Instant::now(), value.clone()));
        Ok(value)
    }

    /// Drops all cached snapshots
    pub fn invalidate(&self) {
        self.yields.clear();
        self.liquidity.clear();
        debug!("context caches invalidated");
    }

    fn cached<T: Clone>(
        &self,
        map: &DashMap<(String, String), (Instant, Option<T>)>,
        key: &(String, String),
    ) -> Cached<Option<T>> {
        if let Some(entry) = map.get(key) {
            let (cached_at, value) = entry.value();
            if cached_at.elapsed() < self.config.cache_ttl {
                return Cached::Hit(value.clone());
            }
        }
        Cached::Miss
    }
}
