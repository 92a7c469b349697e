// Comparable Selector
// Tiered fallback over the transaction registry: building match first, then
// progressively coarser filters. The first tier with enough comparables wins;
// below the caller's minimum the listing has no usable market evidence.

use crate::stores::{TransactionFilter, TransactionStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use common::TransactionRecord;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Specificity level of the winning comparable filter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Same building within the area
    Building,
    /// Area + property type + bedrooms + size band
    Segment,
    /// Area + property type
    AreaType,
    /// Area only
    Area,
}

impl MatchTier {
    pub fn rank(&self) -> u8 {
        match self {
            MatchTier::Building => 1,
            MatchTier::Segment => 2,
            MatchTier::AreaType => 3,
            MatchTier::Area => 4,
        }
    }

    fn confidence_base(&self) -> f64 {
        match self {
            MatchTier::Building => 0.90,
            MatchTier::Segment => 0.75,
            MatchTier::AreaType => 0.55,
            MatchTier::Area => 0.35,
        }
    }
}

/// What we are looking for comparables against
#[derive(Debug, Clone)]
pub struct ComparableQuery {
    /// Resolved canonical area name (transaction areas are canonicalized at
    /// ingestion)
    pub area: String,
    pub property_type: String,
    pub bedrooms: String,
    pub size_sqft: f64,
    pub building_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Size band half-width for tier 2, as a fraction of listing size
    pub size_tolerance: f64,
    /// Half-life in days for the time-weighted price average
    pub half_life_days: f64,
    /// Comparables older than this contribute a zero recency score
    pub staleness_horizon_days: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            size_tolerance: 0.20,
            half_life_days: 180.0,
            staleness_horizon_days: 365.0,
        }
    }
}

/// Summary of the winning tier's comparables for one listing. Transient:
/// recomputed per scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparableSet {
    pub match_tier: MatchTier,
    pub match_description: String,
    pub confidence_score: f64,
    pub comparable_count: usize,
    pub median_price: Decimal,
    pub median_price_per_sqft: Decimal,
    pub time_weighted_avg_price_per_sqft: Decimal,
    /// 0-1, favors sets whose freshest comparable is recent
    pub recency_score: f64,
    pub price_min: Decimal,
    pub price_max: Decimal,
    pub latest_transaction_date: DateTime<Utc>,
}

impl ComparableSet {
    /// Reference price-per-sqft for discount math: time-weighted average,
    /// falling back to the median.
    pub fn reference_price_per_sqft(&self) -> Decimal {
        if self.time_weighted_avg_price_per_sqft > Decimal::ZERO {
            self.time_weighted_avg_price_per_sqft
        } else {
            self.median_price_per_sqft
        }
    }
}

pub struct ComparableSelector {
    store: Arc<dyn TransactionStore>,
    config: SelectorConfig,
}

impl ComparableSelector {
    pub fn new(store: Arc<dyn TransactionStore>, config: SelectorConfig) -> Self {
        Self { store, config }
    }

    /// Best available comparable set under the tiered fallback, or None when
    /// no tier reaches `min_count`. Callers must treat None as missing data,
    /// not as a zero score.
    pub async fn select(
        &self,
        query: &ComparableQuery,
        min_count: usize,
    ) -> Result<Option<ComparableSet>> {
        for (tier, filter, description) in self.tier_filters(query) {
            let records = self.store.find(&filter).await?;
            debug!(
                area = %query.area,
                tier = tier.rank(),
                count = records.len(),
                "comparable tier probe"
            );
            if records.len() >= min_count.max(1) {
                return Ok(Some(self.summarize(tier, description, &records)));
            }
        }
        Ok(None)
    }

    fn tier_filters(
        &self,
        query: &ComparableQuery,
    ) -> Vec<(MatchTier, TransactionFilter, String)> {
        let mut tiers = Vec::with_capacity(4);

        if let Some(building) = query
            .building_name
            .as_ref()
            .filter(|b| !b.trim().is_empty())
        {
            tiers.push((
                MatchTier::Building,
                TransactionFilter {
                    area: query.area.clone(),
                    building_name: Some(building.clone()),
                    ..Default::default()
                },
                format!("Same building ({building})"),
            ));
        }

        let size_lo = query.size_sqft * (1.0 - self.config.size_tolerance);
        let size_hi = query.size_sqft * (1.0 + self.config.size_tolerance);
        tiers.push((
            MatchTier::Segment,
            TransactionFilter {
                area: query.area.clone(),
                property_type: Some(query.property_type.clone()),
                bedrooms: Some(query.bedrooms.clone()),
                size_range: (query.size_sqft > 0.0).then_some((size_lo, size_hi)),
                building_name: None,
            },
            format!(
                "{} / {}br / similar size in {}",
                query.property_type, query.bedrooms, query.area
            ),
        ));

        tiers.push((
            MatchTier::AreaType,
            TransactionFilter {
                area: query.area.clone(),
                property_type: Some(query.property_type.clone()),
                ..Default::default()
            },
            format!("{} in {}", query.property_type, query.area),
        ));

        tiers.push((
            MatchTier::Area,
            TransactionFilter {
                area: query.area.clone(),
                ..Default::default()
            },
            format!("All transactions in {}", query.area),
        ));

        tiers
    }

    fn summarize(
        &self,
        tier: MatchTier,
        description: String,
        records: &[TransactionRecord],
    ) -> ComparableSet {
        let now = Utc::now();

        let mut prices: Vec<Decimal> = records.iter().map(|r| r.price).collect();
        prices.sort();
        let price_min = prices[0];
        let price_max = prices[prices.len() - 1];
        let median_price = median_of_sorted(&prices);

        let mut ppsf: Vec<Decimal> = records.iter().map(|r| r.price_per_sqft).collect();
        ppsf.sort();
        let median_ppsf = median_of_sorted(&ppsf);

        // Half-life decay: a transaction `half_life_days` old counts half as
        // much as one from today
        let mut weighted_sum = 0.0_f64;
        let mut weight_sum = 0.0_f64;
        for record in records {
            let age_days = (now - record.transacted_at).num_days().max(0) as f64;
            let weight = 0.5_f64.powf(age_days / self.config.half_life_days);
            weighted_sum += record.price_per_sqft.to_f64().unwrap_or(0.0) * weight;
            weight_sum += weight;
        }
        let weighted_avg = if weight_sum > 0.0 {
            Decimal::from_f64(weighted_sum / weight_sum).unwrap_or(median_ppsf)
        } else {
            median_ppsf
        };

        let latest = records
            .iter()
            .map(|r| r.transacted_at)
            .max()
            .unwrap_or(now);
        let latest_age_days = (now - latest).num_days().max(0) as f64;
        let recency_score =
            (1.0 - latest_age_days / self.config.staleness_horizon_days).clamp(0.0, 1.0);

        // More comparables raise confidence, but a finer tier always outranks
        // a coarser one: the count bonus tops out below the tier gap
        let count_bonus = (records.len().min(50) as f64 / 50.0) * 0.10;
        let confidence_score = (tier.confidence_base() + count_bonus).min(1.0);

        ComparableSet {
            match_tier: tier,
            match_description: description,
            confidence_score,
            comparable_count: records.len(),
            median_price,
            median_price_per_sqft: median_ppsf,
            time_weighted_avg_price_per_sqft: weighted_avg,
            recency_score,
            price_min,
            price_max,
            latest_transaction_date: latest,
        }
    }
}

fn median_of_sorted(sorted: &[Decimal]) -> Decimal {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / Decimal::from(2)
    }
}
