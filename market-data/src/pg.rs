// Postgres-backed stores
// Runtime sqlx queries (no compile-time macros) so the crate builds without a
// live database. Row shapes follow the ingestion service's schema.

use crate::context::{LiquidityContext, YieldContext};
use crate::stores::{ListingStore, MetricsStore, TransactionFilter, TransactionStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ListingRecord, TransactionRecord};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn find(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        let mut qb = QueryBuilder::new(
            "SELECT id, area, property_type, bedrooms, size_sqft, price, price_per_sqft, \
             transacted_at, building_name FROM transactions WHERE lower(area) = lower(",
        );
        qb.push_bind(&filter.area);
        qb.push(")");

        if let Some(property_type) = &filter.property_type {
            qb.push(" AND lower(property_type) = lower(");
            qb.push_bind(property_type);
            qb.push(")");
        }
        if let Some(bedrooms) = &filter.bedrooms {
            qb.push(" AND lower(bedrooms) = lower(");
            qb.push_bind(bedrooms);
            qb.push(")");
        }
        if let Some((lo, hi)) = filter.size_range {
            qb.push(" AND size_sqft BETWEEN ");
            qb.push_bind(lo);
            qb.push(" AND ");
            qb.push_bind(hi);
        }
        if let Some(building) = &filter.building_name {
            qb.push(" AND building_name ILIKE ");
            qb.push_bind(format!("%{}%", building.trim()));
        }
        qb.push(" ORDER BY transacted_at DESC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("querying transactions")?;

        rows.iter()
            .map(|row| {
                Ok(TransactionRecord {
                    id: row.try_get::<Uuid, _>("id")?,
                    area: row.try_get("area")?,
                    property_type: row.try_get("property_type")?,
                    bedrooms: row.try_get("bedrooms")?,
                    size_sqft: row.try_get("size_sqft")?,
                    price: row.try_get::<Decimal, _>("price")?,
                    price_per_sqft: row.try_get::<Decimal, _>("price_per_sqft")?,
                    transacted_at: row.try_get::<DateTime<Utc>, _>("transacted_at")?,
                    building_name: row.try_get("building_name")?,
                })
            })
            .collect()
    }
}

pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn active_listings(&self) -> Result<Vec<ListingRecord>> {
        let rows = sqlx::query(
            "SELECT id, org_id, source, external_id, area_text, property_type, bedrooms, \
             size_sqft, asking_price, price_per_sqft, building_name, listed_at, \
             days_on_market, is_active FROM listings WHERE is_active = true",
        )
        .fetch_all(&self.pool)
        .await
        .context("querying active listings")?;

        rows.iter()
            .map(|row| {
                Ok(ListingRecord {
                    id: row.try_get::<Uuid, _>("id")?,
                    org_id: row.try_get::<Uuid, _>("org_id")?,
                    source: row.try_get("source")?,
                    external_id: row.try_get("external_id")?,
                    area_text: row.try_get("area_text")?,
                    property_type: row.try_get("property_type")?,
                    bedrooms: row.try_get("bedrooms")?,
                    size_sqft: row.try_get("size_sqft")?,
                    asking_price: row.try_get::<Decimal, _>("asking_price")?,
                    price_per_sqft: row.try_get::<Option<Decimal>, _>("price_per_sqft")?,
                    building_name: row.try_get("building_name")?,
                    listed_at: row.try_get::<DateTime<Utc>, _>("listed_at")?,
                    days_on_market: row
                        .try_get::<Option<i32>, _>("days_on_market")?
                        .map(|d| d.max(0) as u32),
                    is_active: row.try_get("is_active")?,
                })
            })
            .collect()
    }
}

pub struct PgGeoStore {
    pool: PgPool,
}

impl PgGeoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl geo_resolver::GeoReferenceStore for PgGeoStore {
    async fn load_all(&self) -> Result<Vec<common::GeoReference>> {
        let rows = sqlx::query(
            "SELECT id, geo_type, canonical_name, parent_id, aliases, external_area_name \
             FROM geo_references",
        )
        .fetch_all(&self.pool)
        .await
        .context("loading geo reference set")?;

        rows.iter()
            .map(|row| {
                let geo_type = match row.try_get::<String, _>("geo_type")?.as_str() {
                    "city" => common::GeoType::City,
                    "district" => common::GeoType::District,
                    "sub_community" => common::GeoType::SubCommunity,
                    _ => common::GeoType::Community,
                };
                Ok(common::GeoReference {
                    id: row.try_get("id")?,
                    geo_type,
                    canonical_name: row.try_get("canonical_name")?,
                    parent_id: row.try_get("parent_id")?,
                    aliases: row
                        .try_get::<Vec<String>, _>("aliases")?
                        .into_iter()
                        .collect(),
                    external_area_name: row.try_get("external_area_name")?,
                })
            })
            .collect()
    }
}

pub struct PgMetricsStore {
    pool: PgPool,
}

impl PgMetricsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricsStore for PgMetricsStore {
    async fn yield_context(&self, geo_id: &str, segment: &str) -> Result<Option<YieldContext>> {
        let row = sqlx::query(
            "SELECT median_annual_rent, area_gross_yield FROM market_yields \
             WHERE geo_id = $1 AND segment = $2",
        )
        .bind(geo_id)
        .bind(segment)
        .fetch_optional(&self.pool)
        .await
        .context("querying yield snapshot")?;

        row.map(|row| {
            Ok(YieldContext {
                median_annual_rent: row.try_get::<Option<Decimal>, _>("median_annual_rent")?,
                area_gross_yield: row.try_get::<Option<f64>, _>("area_gross_yield")?,
            })
        })
        .transpose()
    }

    async fn liquidity_context(
        &self,
        geo_id: &str,
        property_type: &str,
    ) -> Result<Option<LiquidityContext>> {
        let row = sqlx::query(
            "SELECT avg_days_on_market, median_days_on_market, stale_listings, \
             fresh_listings, liquidity_score FROM market_liquidity \
             WHERE geo_id = $1 AND lower(property_type) = lower($2)",
        )
        .bind(geo_id)
        .bind(property_type)
        .fetch_optional(&self.pool)
        .await
        .context("querying liquidity view")?;

        row.map(|row| {
            Ok(LiquidityContext {
                avg_days_on_market: row.try_get("avg_days_on_market")?,
                median_days_on_market: row.try_get("median_days_on_market")?,
                stale_listings: row.try_get::<i32, _>("stale_listings")?.max(0) as u32,
                fresh_listings: row.try_get::<i32, _>("fresh_listings")?.max(0) as u32,
                liquidity_score: row.try_get("liquidity_score")?,
            })
        })
        .transpose()
    }
}
