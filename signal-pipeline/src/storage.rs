// Signal Storage
// Upsert-by-key persistence: `signal_key` is the conflict key, so re-running
// the pipeline against unchanged data converges instead of accumulating rows.

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::{Signal, SignalSeverity, SignalStatus};
use sqlx::postgres::PgPool;
use sqlx::QueryBuilder;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Inserts or updates every signal, keyed by `signal_key`. Returns how
    /// many rows were written.
    async fn upsert_batch(&self, signals: &[Signal]) -> Result<usize>;
}

/// In-memory store for tests; mirrors the upsert semantics of the Postgres
/// store by keying on `signal_key`.
#[derive(Default)]
pub struct InMemorySignalStore {
    signals: RwLock<HashMap<String, Signal>>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Signal> {
        self.signals.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.signals.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.signals.read().await.is_empty()
    }

    pub async fn get(&self, signal_key: &str) -> Option<Signal> {
        self.signals.read().await.get(signal_key).cloned()
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn upsert_batch(&self, signals: &[Signal]) -> Result<usize> {
        let mut map = self.signals.write().await;
        for signal in signals {
            map.insert(signal.signal_key.clone(), signal.clone());
        }
        Ok(signals.len())
    }
}

fn severity_str(severity: SignalSeverity) -> &'static str {
    match severity {
        SignalSeverity::High => "high",
        SignalSeverity::Medium => "medium",
        SignalSeverity::Low => "low",
    }
}

fn status_str(status: SignalStatus) -> &'static str {
    match status {
        SignalStatus::New => "new",
        SignalStatus::Acknowledged => "acknowledged",
        SignalStatus::Dismissed => "dismissed",
    }
}

pub struct PgSignalStore {
    pool: PgPool,
}

impl PgSignalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalStore for PgSignalStore {
    async fn upsert_batch(&self, signals: &[Signal]) -> Result<usize> {
        if signals.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::new(
            "INSERT INTO signals (org_id, signal_type, geo_id, segment, signal_key, \
             severity, status, composite_score, title, evidence, created_at) ",
        );
        qb.push_values(signals, |mut row, signal| {
            row.push_bind(signal.org_id)
                .push_bind(&signal.signal_type)
                .push_bind(&signal.geo_id)
                .push_bind(&signal.segment)
                .push_bind(&signal.signal_key)
                .push_bind(severity_str(signal.severity))
                .push_bind(status_str(signal.status))
                .push_bind(signal.composite_score as i16)
                .push_bind(&signal.title)
                .push_bind(&signal.evidence)
                .push_bind(signal.created_at);
        });
        qb.push(
            " ON CONFLICT (signal_key) DO UPDATE SET \
             severity = EXCLUDED.severity, \
             composite_score = EXCLUDED.composite_score, \
             title = EXCLUDED.title, \
             evidence = EXCLUDED.evidence, \
             created_at = EXCLUDED.created_at",
        );

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .context("upserting signal batch")?;
        Ok(result.rows_affected() as usize)
    }
}
