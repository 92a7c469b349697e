use anyhow::{Context, Result};
use deal_scoring::DealScorer;
use geo_resolver::{GeoResolver, GeoResolverConfig};
use market_data::{
    ComparableSelector, ContextProvider, ContextProviderConfig, PgGeoStore, PgListingStore,
    PgMetricsStore, PgTransactionStore, SelectorConfig,
};
use signal_pipeline::{
    NeutralSentimentProvider, PgSignalStore, PipelineConfig, SignalPipeline,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("starting deal-signal pipeline");

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("connecting to database")?;

    let mut config = PipelineConfig::default();
    if let Ok(min_score) = std::env::var("MIN_COMPOSITE_SCORE") {
        config.min_composite_score = min_score.parse().context("parsing MIN_COMPOSITE_SCORE")?;
    }
    if let Ok(min_comps) = std::env::var("MIN_COMPARABLE_COUNT") {
        config.min_comparable_count = min_comps.parse().context("parsing MIN_COMPARABLE_COUNT")?;
    }

    let resolver = Arc::new(GeoResolver::new(
        Arc::new(PgGeoStore::new(pool.clone())),
        GeoResolverConfig::default(),
    ));
    let selector = Arc::new(ComparableSelector::new(
        Arc::new(PgTransactionStore::new(pool.clone())),
        SelectorConfig::default(),
    ));
    let context = Arc::new(ContextProvider::new(
        Arc::new(PgMetricsStore::new(pool.clone())),
        ContextProviderConfig::default(),
    ));

    let pipeline = SignalPipeline::new(
        Arc::new(PgListingStore::new(pool.clone())),
        resolver,
        selector,
        context,
        Arc::new(NeutralSentimentProvider),
        DealScorer::default(),
        Arc::new(PgSignalStore::new(pool)),
        config,
    );

    let report = pipeline.run().await?;
    print!("{}", report.summary());

    Ok(())
}
