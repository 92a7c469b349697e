// Composite Deal Scorer
// Six sub-scores in [0,1], fixed weights, 0-100 composite with a categorical
// rating and a typed analysis payload so every number is auditable.

use crate::error::ScoreError;
use crate::sentiment::SentimentContext;
use anyhow::Result;
use chrono::{DateTime, Utc};
use common::ListingRecord;
use market_data::{ComparableSet, LiquidityContext, MatchTier, YieldContext};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Weights for the composite. Must sum to 1.0.
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    pub price: f64,
    pub yield_: f64,
    pub match_quality: f64,
    pub sentiment: f64,
    pub liquidity: f64,
    pub recency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            price: 0.30,
            yield_: 0.20,
            match_quality: 0.15,
            sentiment: 0.15,
            liquidity: 0.10,
            recency: 0.10,
        }
    }
}

/// Categorical rating over the composite score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DealRating {
    ExceptionalOpportunity,
    StrongBuy,
    FairDeal,
    MarketPrice,
    Overpriced,
}

impl DealRating {
    pub fn from_score(composite: u8) -> Self {
        match composite {
            85..=u8::MAX => DealRating::ExceptionalOpportunity,
            70..=84 => DealRating::StrongBuy,
            55..=69 => DealRating::FairDeal,
            40..=54 => DealRating::MarketPrice,
            _ => DealRating::Overpriced,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DealRating::ExceptionalOpportunity => "exceptional_opportunity",
            DealRating::StrongBuy => "strong_buy",
            DealRating::FairDeal => "fair_deal",
            DealRating::MarketPrice => "market_price",
            DealRating::Overpriced => "overpriced",
        }
    }
}

/// The six sub-scores, each in [0,1]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub price: f64,
    #[serde(rename = "yield")]
    pub yield_: f64,
    pub match_quality: f64,
    pub sentiment: f64,
    pub liquidity: f64,
    pub recency: f64,
}

/// Audit payload: every figure a reviewer needs to check the score by hand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealAnalysis {
    pub asking_price: Decimal,
    pub listing_price_per_sqft: Decimal,
    pub reference_price_per_sqft: Decimal,
    /// Discount of listing price-per-sqft vs the reference; positive = cheap
    pub discount_pct_per_sqft: f64,
    /// Discount of total asking price vs the comparable median price
    pub discount_pct_total: f64,
    /// Reference value of this listing minus the asking price
    pub estimated_savings: Decimal,
    pub estimated_annual_rent: Option<Decimal>,
    pub estimated_yield_pct: Option<f64>,
    pub area_avg_yield_pct: Option<f64>,
    pub match_tier: u8,
    pub match_description: String,
    pub comparable_count: usize,
    pub latest_comparable_date: DateTime<Utc>,
}

/// Scoring output. Immutable once produced; persisted as a Signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealScore {
    pub composite_score: u8,
    pub rating: DealRating,
    pub breakdown: ScoreBreakdown,
    /// Trust in the score itself; distinct from resolver match confidence
    pub confidence: f64,
    pub analysis: DealAnalysis,
}

pub struct DealScorer {
    weights: ScoringWeights,
}

impl Default for DealScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl DealScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        listing: &ListingRecord,
        comparables: &ComparableSet,
        yield_ctx: Option<&YieldContext>,
        liquidity_ctx: Option<&LiquidityContext>,
        sentiment_ctx: Option<&SentimentContext>,
    ) -> Result<DealScore> {
        let listing_ppsf = listing
            .effective_price_per_sqft()
            .ok_or_else(|| ScoreError::NoListingPrice(listing.external_id.clone()))?;
        let reference_ppsf = comparables.reference_price_per_sqft();
        if reference_ppsf <= Decimal::ZERO {
            return Err(ScoreError::NoReferencePrice.into());
        }

        let discount_pct = pct_diff(reference_ppsf, listing_ppsf);
        let discount_pct_total = pct_diff(comparables.median_price, listing.asking_price);

        let rent = yield_ctx.and_then(|y| y.median_annual_rent);
        let area_yield = yield_ctx.and_then(|y| y.area_gross_yield);
        let estimated_yield_pct = rent.and_then(|r| {
            let price = listing.asking_price.to_f64()?;
            (price > 0.0).then(|| r.to_f64().unwrap_or(0.0) / price * 100.0)
        });
        let area_avg_yield_pct = area_yield.map(|y| y * 100.0);
        let yield_premium_pts = match (estimated_yield_pct, area_avg_yield_pct) {
            (Some(est), Some(area)) => Some(est - area),
            _ => None,
        };

        let breakdown = ScoreBreakdown {
            price: price_score(discount_pct),
            yield_: yield_score(yield_premium_pts),
            match_quality: match_quality_score(
                Some(comparables.match_tier),
                comparables.comparable_count,
            ),
            sentiment: sentiment_score(sentiment_ctx, Utc::now()),
            liquidity: liquidity_score(liquidity_ctx, listing.days_on_market),
            recency: comparables.recency_score.clamp(0.0, 1.0),
        };

        let weighted = breakdown.price * self.weights.price
            + breakdown.yield_ * self.weights.yield_
            + breakdown.match_quality * self.weights.match_quality
            + breakdown.sentiment * self.weights.sentiment
            + breakdown.liquidity * self.weights.liquidity
            + breakdown.recency * self.weights.recency;
        let composite_score = (weighted * 100.0).round().clamp(0.0, 100.0) as u8;
        let rating = DealRating::from_score(composite_score);

        let confidence = score_confidence(
            comparables.confidence_score,
            rent.is_some(),
            sentiment_ctx.map_or(false, |s| !s.is_neutral()),
            liquidity_ctx.is_some(),
        );

        // Without a usable size, revalue through the per-sqft discount instead
        // of reference_ppsf * size, which would collapse to -asking_price.
        let estimated_savings = if listing.size_sqft > 0.0 {
            let size = Decimal::from_f64(listing.size_sqft).unwrap_or(Decimal::ZERO);
            reference_ppsf * size - listing.asking_price
        } else {
            let discount = Decimal::from_f64(discount_pct / 100.0).unwrap_or(Decimal::ZERO);
            listing.asking_price * discount
        };

        debug!(
            listing = %listing.external_id,
            composite_score,
            rating = rating.as_str(),
            discount_pct,
            "scored listing"
        );

        Ok(DealScore {
            composite_score,
            rating,
            breakdown,
            confidence,
            analysis: DealAnalysis {
                asking_price: listing.asking_price,
                listing_price_per_sqft: listing_ppsf,
                reference_price_per_sqft: reference_ppsf,
                discount_pct_per_sqft: discount_pct,
                discount_pct_total,
                estimated_savings,
                estimated_annual_rent: rent,
                estimated_yield_pct,
                area_avg_yield_pct,
                match_tier: comparables.match_tier.rank(),
                match_description: comparables.match_description.clone(),
                comparable_count: comparables.comparable_count,
                latest_comparable_date: comparables.latest_transaction_date,
            },
        })
    }
}

/// Percentage by which `actual` undercuts `reference`; positive = cheaper
fn pct_diff(reference: Decimal, actual: Decimal) -> f64 {
    if reference <= Decimal::ZERO {
        return 0.0;
    }
    ((reference - actual) / reference).to_f64().unwrap_or(0.0) * 100.0
}

/// Banded piecewise-linear map from price discount (%) to [0,1].
/// Anchors: >=30% discount -> 1.0, at-market -> 0.5, <=-20% -> 0.0.
pub fn price_score(discount_pct: f64) -> f64 {
    let d = discount_pct;
    if d >= 30.0 {
        1.0
    } else if d >= 20.0 {
        0.85 + (d - 20.0) / 10.0 * 0.15
    } else if d >= 10.0 {
        0.70 + (d - 10.0) / 10.0 * 0.15
    } else if d >= 0.0 {
        0.50 + d / 10.0 * 0.20
    } else if d >= -10.0 {
        0.30 + (d + 10.0) / 10.0 * 0.20
    } else if d >= -20.0 {
        (d + 20.0) / 10.0 * 0.30
    } else {
        0.0
    }
}

/// Yield premium (listing yield minus area average, in percentage points) to
/// [0,1]. Neutral 0.5 when no rent data is available. Any positive premium
/// starts at 0.7 and reaches 1.0 at +2pts; the negative branch falls from 0.5
/// to 0.1 at -2pts.
pub fn yield_score(premium_pts: Option<f64>) -> f64 {
    let Some(p) = premium_pts else {
        return 0.5;
    };
    if p >= 2.0 {
        1.0
    } else if p >= 0.0 {
        0.7 + p * 0.15
    } else if p > -2.0 {
        0.5 + p * 0.2
    } else {
        0.1
    }
}

/// Fixed base per tier, small bonus for comparable depth, capped at 1.0.
/// `None` means no usable comparables at all (tier 0).
pub fn match_quality_score(tier: Option<MatchTier>, count: usize) -> f64 {
    let base: f64 = match tier {
        Some(MatchTier::Building) => 0.95,
        Some(MatchTier::Segment) => 0.80,
        Some(MatchTier::AreaType) => 0.60,
        Some(MatchTier::Area) => 0.40,
        None => 0.10,
    };
    let bonus = if count >= 50 {
        0.05
    } else if count >= 20 {
        0.03
    } else if count >= 10 {
        0.01
    } else {
        0.0
    };
    (base + bonus).min(1.0)
}

/// Outlook baseline (bullish 0.8, neutral 0.5, bearish 0.3) adjusted by known
/// developments, penalized when the underlying context is stale.
pub fn sentiment_score(ctx: Option<&SentimentContext>, now: DateTime<Utc>) -> f64 {
    let Some(ctx) = ctx else {
        return 0.5;
    };
    let baseline = match ctx.outlook {
        crate::sentiment::MarketOutlook::Bullish => 0.8,
        crate::sentiment::MarketOutlook::Neutral => 0.5,
        crate::sentiment::MarketOutlook::Bearish => 0.3,
    };
    let net = ctx.positive_developments as f64 - ctx.negative_developments as f64;
    let adjustment = (net * 0.05).clamp(-0.15, 0.15);

    let age_days = (now - ctx.as_of).num_days();
    let staleness_penalty = if age_days > 30 {
        0.10
    } else if age_days > 7 {
        0.05
    } else {
        0.0
    };

    (baseline + adjustment - staleness_penalty).clamp(0.0, 1.0)
}

/// Area liquidity score nudged by the listing's own days-on-market and by the
/// stale/fresh balance of the area.
pub fn liquidity_score(ctx: Option<&LiquidityContext>, listing_dom: Option<u32>) -> f64 {
    let Some(ctx) = ctx else {
        return 0.5;
    };
    let mut score = ctx.liquidity_score;

    if let Some(dom) = listing_dom {
        if ctx.avg_days_on_market > 0.0 {
            let ratio = dom as f64 / ctx.avg_days_on_market;
            if ratio < 0.5 {
                score += 0.05;
            } else if ratio > 1.5 {
                score -= 0.05;
            }
        }
    }

    if ctx.stale_listings > ctx.fresh_listings.saturating_mul(2) {
        score -= 0.05;
    }

    score.clamp(0.0, 1.0)
}

/// Weighted trust in the composite score itself: mostly comparable-set
/// confidence, plus credit for each extra data source present.
pub fn score_confidence(
    comparable_confidence: f64,
    has_yield_data: bool,
    has_non_neutral_sentiment: bool,
    has_liquidity_data: bool,
) -> f64 {
    let mut confidence = comparable_confidence.clamp(0.0, 1.0) * 0.6;
    if has_yield_data {
        confidence += 0.2;
    }
    confidence += if has_non_neutral_sentiment { 0.1 } else { 0.05 };
    if has_liquidity_data {
        confidence += 0.1;
    }
    confidence.clamp(0.0, 1.0)
}
