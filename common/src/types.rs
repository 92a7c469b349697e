use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Signal type emitted by the deal-scoring pipeline
pub const SIGNAL_TYPE_PRICING_OPPORTUNITY: &str = "pricing_opportunity";

/// Level of a canonical geography node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeoType {
    City,
    District,
    Community,
    SubCommunity,
}

/// Canonical geography node, seeded out-of-band and cached by the resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoReference {
    /// Canonical slug, e.g. "dubai-marina"
    pub id: String,
    pub geo_type: GeoType,
    pub canonical_name: String,
    /// Parent slug; None for top-level nodes
    pub parent_id: Option<String>,
    /// Alternate spellings seen in portal and registry data
    pub aliases: HashSet<String>,
    /// Area name as spelled by the transaction registry, if different
    pub external_area_name: Option<String>,
}

/// Portal listing snapshot. Owned by the ingestion service; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: Uuid,
    pub org_id: Uuid,
    /// Source portal, e.g. "bayut"
    pub source: String,
    pub external_id: String,
    /// Raw area text as scraped, resolved by the geo resolver
    pub area_text: String,
    pub property_type: String,
    /// Bedroom label as listed ("studio", "1", "2", ...)
    pub bedrooms: String,
    /// Built-up area in sqft
    pub size_sqft: f64,
    pub asking_price: Decimal,
    /// Price per sqft if the portal provides it; derived otherwise
    pub price_per_sqft: Option<Decimal>,
    pub building_name: Option<String>,
    pub listed_at: DateTime<Utc>,
    pub days_on_market: Option<u32>,
    pub is_active: bool,
}

impl ListingRecord {
    /// Price per sqft, derived from asking price and size when not provided.
    /// None when neither is usable.
    pub fn effective_price_per_sqft(&self) -> Option<Decimal> {
        if let Some(ppa) = self.price_per_sqft {
            if ppa > Decimal::ZERO {
                return Some(ppa);
            }
        }
        if self.size_sqft > 0.0 && self.asking_price > Decimal::ZERO {
            let size = Decimal::from_f64_retain(self.size_sqft)?;
            return Some(self.asking_price / size);
        }
        None
    }
}

/// Historical sale record from the government registry. Read-only truth data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    /// Area name, canonicalized at ingestion
    pub area: String,
    pub property_type: String,
    pub bedrooms: Option<String>,
    pub size_sqft: f64,
    pub price: Decimal,
    pub price_per_sqft: Decimal,
    pub transacted_at: DateTime<Utc>,
    pub building_name: Option<String>,
}

/// Severity of a persisted signal, derived from the composite score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalSeverity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    New,
    Acknowledged,
    Dismissed,
}

/// Persisted pipeline output. `signal_key` is the upsert conflict key: re-runs
/// update the existing row instead of inserting a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub org_id: Uuid,
    pub signal_type: String,
    pub geo_id: String,
    pub segment: String,
    pub signal_key: String,
    pub severity: SignalSeverity,
    pub status: SignalStatus,
    pub composite_score: u8,
    pub title: String,
    /// Full DealScore analysis for auditability
    pub evidence: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Market segment label for a listing, e.g. "apartment-2br"
pub fn segment_label(property_type: &str, bedrooms: &str) -> String {
    format!(
        "{}-{}br",
        property_type.trim().to_lowercase().replace(' ', "-"),
        bedrooms.trim().to_lowercase()
    )
}

/// Deterministic signal key for one (source, type, geography, segment, listing)
/// tuple. Stable across runs so upserts converge.
pub fn signal_key(
    source: &str,
    signal_type: &str,
    geo_id: &str,
    segment: &str,
    external_id: &str,
) -> String {
    format!("{source}:{signal_type}:{geo_id}:{segment}:{external_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(price: i64, size: f64, ppa: Option<i64>) -> ListingRecord {
        ListingRecord {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            source: "bayut".to_string(),
            external_id: "L1".to_string(),
            area_text: "Dubai Marina".to_string(),
            property_type: "Apartment".to_string(),
            bedrooms: "2".to_string(),
            size_sqft: size,
            asking_price: Decimal::from(price),
            price_per_sqft: ppa.map(Decimal::from),
            building_name: None,
            listed_at: Utc::now(),
            days_on_market: None,
            is_active: true,
        }
    }

    #[test]
    fn price_per_sqft_prefers_portal_value() {
        let l = listing(1_400_000, 1000.0, Some(1450));
        assert_eq!(l.effective_price_per_sqft(), Some(Decimal::from(1450)));
    }

    #[test]
    fn price_per_sqft_derived_from_size() {
        let l = listing(1_400_000, 1000.0, None);
        assert_eq!(l.effective_price_per_sqft(), Some(Decimal::from(1400)));
    }

    #[test]
    fn price_per_sqft_unusable_without_size() {
        let l = listing(1_400_000, 0.0, None);
        assert!(l.effective_price_per_sqft().is_none());
    }

    #[test]
    fn signal_key_is_deterministic() {
        let a = signal_key("bayut", SIGNAL_TYPE_PRICING_OPPORTUNITY, "dubai-marina", "apartment-2br", "L1");
        let b = signal_key("bayut", SIGNAL_TYPE_PRICING_OPPORTUNITY, "dubai-marina", "apartment-2br", "L1");
        assert_eq!(a, b);
        assert_eq!(a, "bayut:pricing_opportunity:dubai-marina:apartment-2br:L1");
    }

    #[test]
    fn segment_label_normalizes() {
        assert_eq!(segment_label(" Town House ", "3"), "town-house-3br");
    }
}
