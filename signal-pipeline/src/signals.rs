// Signal construction
// Maps one scored listing onto the persisted Signal shape. The signal key is
// deterministic, so repeated runs update the same row.

use chrono::Utc;
use common::{
    segment_label, signal_key, ListingRecord, Signal, SignalSeverity, SignalStatus,
    SIGNAL_TYPE_PRICING_OPPORTUNITY,
};
use deal_scoring::DealScore;
use geo_resolver::Resolution;

fn severity_for(composite_score: u8) -> SignalSeverity {
    match composite_score {
        85..=u8::MAX => SignalSeverity::High,
        70..=84 => SignalSeverity::Medium,
        _ => SignalSeverity::Low,
    }
}

pub fn build_signal(listing: &ListingRecord, geo: &Resolution, score: &DealScore) -> Signal {
    let segment = segment_label(&listing.property_type, &listing.bedrooms);
    let key = signal_key(
        &listing.source,
        SIGNAL_TYPE_PRICING_OPPORTUNITY,
        &geo.geo_id,
        &segment,
        &listing.external_id,
    );

    let title = format!(
        "{} priced {:.1}% below {} ({} comparables)",
        segment,
        score.analysis.discount_pct_per_sqft,
        geo.canonical_name,
        score.analysis.comparable_count,
    );

    Signal {
        org_id: listing.org_id,
        signal_type: SIGNAL_TYPE_PRICING_OPPORTUNITY.to_string(),
        geo_id: geo.geo_id.clone(),
        segment,
        signal_key: key,
        severity: severity_for(score.composite_score),
        status: SignalStatus::New,
        composite_score: score.composite_score,
        title,
        evidence: serde_json::to_value(score).unwrap_or(serde_json::Value::Null),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deal_scoring::{DealAnalysis, DealRating, ScoreBreakdown};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn score(composite: u8) -> DealScore {
        DealScore {
            composite_score: composite,
            rating: DealRating::from_score(composite),
            breakdown: ScoreBreakdown {
                price: 1.0,
                yield_: 0.5,
                match_quality: 0.8,
                sentiment: 0.5,
                liquidity: 0.5,
                recency: 0.7,
            },
            confidence: 0.6,
            analysis: DealAnalysis {
                asking_price: Decimal::from(1_400_000),
                listing_price_per_sqft: Decimal::from(1400),
                reference_price_per_sqft: Decimal::from(2000),
                discount_pct_per_sqft: 30.0,
                discount_pct_total: 28.0,
                estimated_savings: Decimal::from(600_000),
                estimated_annual_rent: None,
                estimated_yield_pct: None,
                area_avg_yield_pct: None,
                match_tier: 2,
                match_description: "test".to_string(),
                comparable_count: 15,
                latest_comparable_date: Utc::now(),
            },
        }
    }

    fn listing() -> ListingRecord {
        ListingRecord {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            source: "bayut".to_string(),
            external_id: "L-42".to_string(),
            area_text: "Dubai Marina".to_string(),
            property_type: "Apartment".to_string(),
            bedrooms: "2".to_string(),
            size_sqft: 1000.0,
            asking_price: Decimal::from(1_400_000),
            price_per_sqft: None,
            building_name: None,
            listed_at: Utc::now(),
            days_on_market: None,
            is_active: true,
        }
    }

    fn resolution() -> Resolution {
        Resolution {
            geo_id: "dubai-marina".to_string(),
            canonical_name: "Dubai Marina".to_string(),
            geo_type: Some(common::GeoType::Community),
            confidence: geo_resolver::MatchConfidence::Exact,
        }
    }

    #[test]
    fn signal_key_is_stable_across_builds() {
        let l = listing();
        let r = resolution();
        let a = build_signal(&l, &r, &score(81));
        let b = build_signal(&l, &r, &score(81));
        assert_eq!(a.signal_key, b.signal_key);
        assert_eq!(
            a.signal_key,
            "bayut:pricing_opportunity:dubai-marina:apartment-2br:L-42"
        );
    }

    #[test]
    fn severity_follows_composite_score() {
        let l = listing();
        let r = resolution();
        assert_eq!(build_signal(&l, &r, &score(90)).severity, SignalSeverity::High);
        assert_eq!(build_signal(&l, &r, &score(72)).severity, SignalSeverity::Medium);
        assert_eq!(build_signal(&l, &r, &score(56)).severity, SignalSeverity::Low);
    }

    #[test]
    fn evidence_retains_full_analysis() {
        let signal = build_signal(&listing(), &resolution(), &score(81));
        let evidence = &signal.evidence;
        assert_eq!(evidence["analysis"]["discount_pct_per_sqft"], 30.0);
        assert_eq!(evidence["analysis"]["comparable_count"], 15);
        assert_eq!(evidence["breakdown"]["price"], 1.0);
        assert_eq!(evidence["confidence"], 0.6);
        assert_eq!(signal.status, SignalStatus::New);
    }
}
