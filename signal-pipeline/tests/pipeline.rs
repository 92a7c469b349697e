// End-to-end pipeline tests over in-memory stores:
// skip/score/threshold accounting and upsert idempotence.

use chrono::{Duration, Utc};
use common::{GeoReference, GeoType, ListingRecord, TransactionRecord};
use deal_scoring::DealScorer;
use geo_resolver::{GeoResolver, GeoResolverConfig, InMemoryGeoStore};
use market_data::{
    ComparableSelector, ContextProvider, ContextProviderConfig, InMemoryListingStore,
    InMemoryMetricsStore, InMemoryTransactionStore, LiquidityContext, SelectorConfig,
    YieldContext,
};
use rust_decimal::Decimal;
use signal_pipeline::{
    InMemorySignalStore, NeutralSentimentProvider, PipelineConfig, SignalPipeline,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

fn geo_fixture() -> Vec<GeoReference> {
    vec![GeoReference {
        id: "dubai-marina".to_string(),
        geo_type: GeoType::Community,
        canonical_name: "Dubai Marina".to_string(),
        parent_id: Some("dubai".to_string()),
        aliases: ["marina", "marsa dubai"]
            .into_iter()
            .map(String::from)
            .collect::<HashSet<_>>(),
        external_area_name: None,
    }]
}

fn marina_transactions() -> Vec<TransactionRecord> {
    (0..6)
        .map(|i| TransactionRecord {
            id: Uuid::new_v4(),
            area: "Dubai Marina".to_string(),
            property_type: "Apartment".to_string(),
            bedrooms: Some("2".to_string()),
            size_sqft: 1000.0,
            price: Decimal::from(2_000_000),
            price_per_sqft: Decimal::from(2000),
            transacted_at: Utc::now() - Duration::days(10 + i * 10),
            building_name: None,
        })
        .collect()
}

fn listing(external_id: &str, area: &str, price: i64, size: f64) -> ListingRecord {
    ListingRecord {
        id: Uuid::new_v4(),
        org_id: Uuid::new_v4(),
        source: "bayut".to_string(),
        external_id: external_id.to_string(),
        area_text: area.to_string(),
        property_type: "Apartment".to_string(),
        bedrooms: "2".to_string(),
        size_sqft: size,
        asking_price: Decimal::from(price),
        price_per_sqft: None,
        building_name: None,
        listed_at: Utc::now() - Duration::days(14),
        days_on_market: Some(14),
        is_active: true,
    }
}

fn metrics() -> InMemoryMetricsStore {
    let mut store = InMemoryMetricsStore::default();
    store.yields.insert(
        ("dubai-marina".to_string(), "apartment-2br".to_string()),
        YieldContext {
            median_annual_rent: Some(Decimal::from(112_000)),
            area_gross_yield: Some(0.065),
        },
    );
    store.liquidity.insert(
        ("dubai-marina".to_string(), "apartment".to_string()),
        LiquidityContext {
            avg_days_on_market: 45.0,
            median_days_on_market: 40.0,
            stale_listings: 10,
            fresh_listings: 12,
            liquidity_score: 0.6,
        },
    );
    store
}

fn pipeline_with(
    listings: Vec<ListingRecord>,
    storage: Arc<InMemorySignalStore>,
) -> SignalPipeline {
    let resolver = Arc::new(GeoResolver::new(
        Arc::new(InMemoryGeoStore::new(geo_fixture())),
        GeoResolverConfig::default(),
    ));
    let selector = Arc::new(ComparableSelector::new(
        Arc::new(InMemoryTransactionStore::new(marina_transactions())),
        SelectorConfig::default(),
    ));
    let context = Arc::new(ContextProvider::new(
        Arc::new(metrics()),
        ContextProviderConfig::default(),
    ));

    SignalPipeline::new(
        Arc::new(InMemoryListingStore::new(listings)),
        resolver,
        selector,
        context,
        Arc::new(NeutralSentimentProvider),
        DealScorer::default(),
        storage,
        PipelineConfig::default(),
    )
}

fn fixture_listings() -> Vec<ListingRecord> {
    let mut bad_data = listing("L-no-price", "Dubai Marina", 0, 0.0);
    bad_data.asking_price = Decimal::ZERO;
    vec![
        // 1,400/sqft vs a 2,000/sqft market: clear opportunity
        listing("L-deal", "Marina", 1_400_000, 1000.0),
        // 2,600/sqft: scores, but lands below the emission threshold
        listing("L-over", "Dubai Marina", 2_600_000, 1000.0),
        // Unknown area: no comparables, skipped
        listing("L-lost", "Middle of Nowhere", 1_500_000, 1000.0),
        // No price and no size: unusable price-per-area, skipped
        bad_data,
    ]
}

#[tokio::test]
async fn run_buckets_listings_by_outcome() {
    let storage = Arc::new(InMemorySignalStore::new());
    let pipeline = pipeline_with(fixture_listings(), Arc::clone(&storage));

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.total_listings, 4);
    assert_eq!(report.analyzed, 2);
    assert_eq!(report.skipped_insufficient_data, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.opportunities, 1);
    assert_eq!(report.below_threshold, 1);
    assert_eq!(report.signals_upserted, 1);
    assert_eq!(report.by_tier.get(&2), Some(&2));
    assert_eq!(storage.len().await, 1);

    let signals = storage.all().await;
    let signal = &signals[0];
    assert_eq!(
        signal.signal_key,
        "bayut:pricing_opportunity:dubai-marina:apartment-2br:L-deal"
    );
    assert_eq!(signal.geo_id, "dubai-marina");
    assert!(signal.composite_score >= 55);
}

#[tokio::test]
async fn reruns_are_idempotent() {
    let storage = Arc::new(InMemorySignalStore::new());
    let pipeline = pipeline_with(fixture_listings(), Arc::clone(&storage));

    let first = pipeline.run().await.unwrap();
    let second = pipeline.run().await.unwrap();

    assert_eq!(first.opportunities, 1);
    assert_eq!(second.opportunities, 1);
    // Same dataset, same keys: the signal row converges instead of duplicating
    assert_eq!(storage.len().await, 1);

    let keys: HashSet<String> = storage
        .all()
        .await
        .into_iter()
        .map(|s| s.signal_key)
        .collect();
    assert_eq!(keys.len(), 1);
}

#[tokio::test]
async fn alias_spelling_reaches_the_same_geography() {
    let storage = Arc::new(InMemorySignalStore::new());
    let pipeline = pipeline_with(
        vec![listing("L-alias", "marsa dubai", 1_400_000, 1000.0)],
        Arc::clone(&storage),
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.opportunities, 1);
    let signals = storage.all().await;
    assert_eq!(signals[0].geo_id, "dubai-marina");
}

#[tokio::test]
async fn empty_listing_set_produces_empty_report() {
    let storage = Arc::new(InMemorySignalStore::new());
    let pipeline = pipeline_with(Vec::new(), Arc::clone(&storage));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.total_listings, 0);
    assert_eq!(report.analyzed, 0);
    assert_eq!(report.signals_upserted, 0);
    assert!(storage.is_empty().await);
}
