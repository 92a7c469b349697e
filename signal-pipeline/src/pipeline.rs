// Signal Generation Pipeline
// Orchestrates per-listing resolve -> select comparables -> fetch context ->
// score, then batch-upserts signals keyed by signal_key. Listings are
// independent: failures and data gaps are isolated and counted, never fatal.

use crate::report::RunReport;
use crate::signals::build_signal;
use crate::storage::SignalStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use common::types::segment_label;
use common::{
    process_in_batches, retry_with_backoff, BatchConfig, ListingRecord, RetryConfig, Signal,
    SlidingWindowRateLimiter,
};
use deal_scoring::{DealScorer, ScoreError, SentimentContext};
use geo_resolver::GeoResolver;
use market_data::{ComparableQuery, ComparableSelector, ContextProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pluggable market-sentiment input. The default provider supplies no
/// context, which the scorer treats as neutral.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    async fn sentiment_for(
        &self,
        geo_id: &str,
        segment: &str,
    ) -> Result<Option<SentimentContext>>;
}

pub struct NeutralSentimentProvider;

#[async_trait]
impl SentimentProvider for NeutralSentimentProvider {
    async fn sentiment_for(
        &self,
        _geo_id: &str,
        _segment: &str,
    ) -> Result<Option<SentimentContext>> {
        Ok(None)
    }
}

/// Run parameters for one pipeline invocation
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum composite score for a signal to be emitted
    pub min_composite_score: u8,
    /// Minimum comparables for a tier to be accepted
    pub min_comparable_count: usize,
    pub batch: BatchConfig,
    pub retry: RetryConfig,
    /// Registry queries per second across the whole run
    pub rate_limit_per_sec: usize,
    /// Signals per upsert chunk; a failed chunk does not block later chunks
    pub upsert_chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_composite_score: 55,
            min_comparable_count: 3,
            batch: BatchConfig::default(),
            retry: RetryConfig::default(),
            rate_limit_per_sec: 5,
            upsert_chunk_size: 50,
        }
    }
}

enum SkipReason {
    NoUsablePrice,
    InsufficientComparables,
}

enum ListingOutcome {
    Emitted {
        signal: Box<Signal>,
        rating: &'static str,
        tier: u8,
    },
    BelowThreshold {
        rating: &'static str,
        tier: u8,
    },
    Skipped(SkipReason),
}

/// Top-level driver: applies the comparable-matching and scoring engine to
/// every active listing and persists the results idempotently.
pub struct SignalPipeline {
    listings: Arc<dyn market_data::ListingStore>,
    resolver: Arc<GeoResolver>,
    selector: Arc<ComparableSelector>,
    context: Arc<ContextProvider>,
    sentiment: Arc<dyn SentimentProvider>,
    scorer: DealScorer,
    storage: Arc<dyn SignalStore>,
    limiter: SlidingWindowRateLimiter,
    config: PipelineConfig,
}

impl SignalPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        listings: Arc<dyn market_data::ListingStore>,
        resolver: Arc<GeoResolver>,
        selector: Arc<ComparableSelector>,
        context: Arc<ContextProvider>,
        sentiment: Arc<dyn SentimentProvider>,
        scorer: DealScorer,
        storage: Arc<dyn SignalStore>,
        config: PipelineConfig,
    ) -> Self {
        let limiter =
            SlidingWindowRateLimiter::new(config.rate_limit_per_sec.max(1), Duration::from_secs(1));
        Self {
            listings,
            resolver,
            selector,
            context,
            sentiment,
            scorer,
            storage,
            limiter,
            config,
        }
    }

    /// One full run over all active listings. Only reference-data and
    /// listing-fetch failures abort the run; everything per-listing is
    /// isolated and reported.
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let listings = self
            .listings
            .active_listings()
            .await
            .context("fetching active listings")?;
        info!(count = listings.len(), "starting signal pipeline run");

        let mut report = RunReport::new(started_at);
        report.total_listings = listings.len();

        let outcomes = process_in_batches(listings, &self.config.batch, |listing| async move {
            retry_with_backoff(&self.config.retry, || self.analyze(&listing), is_transient).await
        })
        .await;

        let mut signals = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(ListingOutcome::Emitted { signal, rating, tier }) => {
                    report.analyzed += 1;
                    report.opportunities += 1;
                    report.record_rating(rating);
                    report.record_tier(tier);
                    signals.push(*signal);
                }
                Ok(ListingOutcome::BelowThreshold { rating, tier }) => {
                    report.analyzed += 1;
                    report.below_threshold += 1;
                    report.record_rating(rating);
                    report.record_tier(tier);
                }
                Ok(ListingOutcome::Skipped(reason)) => {
                    report.skipped_insufficient_data += 1;
                    match reason {
                        SkipReason::NoUsablePrice => debug!("skipped: no usable price per area"),
                        SkipReason::InsufficientComparables => {
                            debug!("skipped: insufficient comparables")
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(error = %e, "listing failed after retries");
                }
            }
        }

        report.signals_upserted = self.persist(&signals).await;
        report.finished_at = Utc::now();
        info!(
            analyzed = report.analyzed,
            opportunities = report.opportunities,
            skipped = report.skipped_insufficient_data,
            failed = report.failed,
            "pipeline run complete"
        );
        Ok(report)
    }

    async fn analyze(&self, listing: &ListingRecord) -> Result<ListingOutcome> {
        if listing.effective_price_per_sqft().is_none() {
            return Ok(ListingOutcome::Skipped(SkipReason::NoUsablePrice));
        }

        let geo = self.resolver.resolve(&listing.area_text).await?;
        debug!(
            listing = %listing.external_id,
            geo_id = %geo.geo_id,
            confidence = ?geo.confidence,
            "resolved listing area"
        );

        self.limiter.acquire().await;
        let query = ComparableQuery {
            area: geo.canonical_name.clone(),
            property_type: listing.property_type.clone(),
            bedrooms: listing.bedrooms.clone(),
            size_sqft: listing.size_sqft,
            building_name: listing.building_name.clone(),
        };
        let Some(comparables) = self
            .selector
            .select(&query, self.config.min_comparable_count)
            .await?
        else {
            return Ok(ListingOutcome::Skipped(SkipReason::InsufficientComparables));
        };

        let segment = segment_label(&listing.property_type, &listing.bedrooms);
        let yield_ctx = self.context.yield_context(&geo.geo_id, &segment).await?;
        let liquidity_ctx = self
            .context
            .liquidity_context(&geo.geo_id, &listing.property_type)
            .await?;
        let sentiment_ctx = self.sentiment.sentiment_for(&geo.geo_id, &segment).await?;

        let score = self.scorer.score(
            listing,
            &comparables,
            yield_ctx.as_ref(),
            liquidity_ctx.as_ref(),
            sentiment_ctx.as_ref(),
        )?;
        let rating = score.rating.as_str();
        let tier = comparables.match_tier.rank();

        if score.composite_score >= self.config.min_composite_score {
            let signal = build_signal(listing, &geo, &score);
            Ok(ListingOutcome::Emitted {
                signal: Box::new(signal),
                rating,
                tier,
            })
        } else {
            Ok(ListingOutcome::BelowThreshold { rating, tier })
        }
    }

    /// Upserts in chunks; a failed chunk is logged and skipped so the rest of
    /// the run still lands
    async fn persist(&self, signals: &[Signal]) -> usize {
        let mut written = 0;
        for chunk in signals.chunks(self.config.upsert_chunk_size.max(1)) {
            match self.storage.upsert_batch(chunk).await {
                Ok(count) => written += count,
                Err(e) => {
                    error!(chunk_len = chunk.len(), error = %e, "signal upsert chunk failed");
                }
            }
        }
        written
    }
}

/// Retry predicate for per-listing analysis. Scoring rejects a listing based
/// on its own data, so those errors surface immediately; everything else is
/// assumed to be a transient store or lookup failure.
fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ScoreError>().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn scoring_errors_are_permanent_and_store_errors_transient() {
        assert!(!is_transient(&anyhow::Error::from(
            ScoreError::NoReferencePrice
        )));
        assert!(!is_transient(&anyhow::Error::from(
            ScoreError::NoListingPrice("L1".to_string())
        )));
        assert!(is_transient(&anyhow!("connection reset by peer")));
    }

    #[tokio::test]
    async fn scoring_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(
            &RetryConfig::default(),
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(ScoreError::NoReferencePrice.into()) }
            },
            is_transient,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
