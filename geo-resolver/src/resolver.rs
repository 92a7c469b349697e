// Geo Resolver
// Resolves free-text area strings against the canonical geography reference
// set: exact alias lookup, substring containment, then Levenshtein fallback.
// The reference set is cached process-wide and rebuilt wholesale on expiry.

use crate::normalize::{normalize_area_text, slugify};
use anyhow::{Context, Result};
use async_trait::async_trait;
use common::{GeoReference, GeoType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Qualitative match strength for a resolution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Exact,
    Alias,
    Fuzzy,
    Unknown,
}

/// Result of resolving one raw area string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub geo_id: String,
    pub canonical_name: String,
    /// None when the area is unknown (synthesized slug)
    pub geo_type: Option<GeoType>,
    pub confidence: MatchConfidence,
}

/// Backing store for the geography reference set. A load failure is fatal for
/// resolution, since nothing can be resolved without the reference set.
#[async_trait]
pub trait GeoReferenceStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<GeoReference>>;
}

/// Static reference set, for tests and seed fixtures
pub struct InMemoryGeoStore {
    references: Vec<GeoReference>,
}

impl InMemoryGeoStore {
    pub fn new(references: Vec<GeoReference>) -> Self {
        Self { references }
    }
}

#[async_trait]
impl GeoReferenceStore for InMemoryGeoStore {
    async fn load_all(&self) -> Result<Vec<GeoReference>> {
        Ok(self.references.clone())
    }
}

/// Alias index built once per cache refresh. Aliases are normalized before
/// indexing; every alias maps to exactly one entry (last write wins on
/// seed-data collisions, which the admin tooling prevents upstream).
struct AliasIndex {
    entries: Vec<GeoReference>,
    exact: HashMap<String, usize>,
    /// Aliases sorted by descending length then lexicographic, so substring
    /// and fuzzy scans are deterministic: longest alias wins.
    ordered: Vec<(String, usize)>,
}

impl AliasIndex {
    fn build(entries: Vec<GeoReference>) -> Self {
        let mut exact: HashMap<String, usize> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            let mut keys: Vec<String> = vec![normalize_area_text(&entry.canonical_name)];
            if let Some(external) = &entry.external_area_name {
                keys.push(normalize_area_text(external));
            }
            keys.extend(entry.aliases.iter().map(|a| normalize_area_text(a)));
            for key in keys {
                if !key.is_empty() {
                    exact.insert(key, i);
                }
            }
        }

        let mut ordered: Vec<(String, usize)> =
            exact.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self { entries, exact, ordered }
    }

    fn resolution(&self, idx: usize, confidence: MatchConfidence) -> Resolution {
        let entry = &self.entries[idx];
        Resolution {
            geo_id: entry.id.clone(),
            canonical_name: entry.canonical_name.clone(),
            geo_type: Some(entry.geo_type),
            confidence,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeoResolverConfig {
    /// How long a loaded reference set stays fresh
    pub cache_ttl: Duration,
}

impl Default for GeoResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(6 * 60 * 60),
        }
    }
}

struct CachedIndex {
    index: Arc<AliasIndex>,
    built_at: Instant,
}

/// Resolves raw area strings to canonical geography ids
pub struct GeoResolver {
    store: Arc<dyn GeoReferenceStore>,
    config: GeoResolverConfig,
    cache: RwLock<Option<CachedIndex>>,
}

impl GeoResolver {
    pub fn new(store: Arc<dyn GeoReferenceStore>, config: GeoResolverConfig) -> Self {
        Self {
            store,
            config,
            cache: RwLock::new(None),
        }
    }

    /// Drops the cached reference set; the next resolve reloads it. Called
    /// after administrative writes to the geography tree.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
        info!("geo reference cache invalidated");
    }

    /// Resolves a raw area string. Never fails on unmatchable input: unknown
    /// areas come back with a synthesized slug and `Unknown` confidence so the
    /// caller can treat them as "no market data available".
    pub async fn resolve(&self, raw_area_text: &str) -> Result<Resolution> {
        let index = self.index().await?;
        let normalized = normalize_area_text(raw_area_text);

        if normalized.is_empty() {
            return Ok(Self::unknown(raw_area_text));
        }

        // 1. Exact alias hit
        if let Some(&idx) = index.exact.get(&normalized) {
            return Ok(index.resolution(idx, MatchConfidence::Exact));
        }

        // 2. Bidirectional substring containment, longest alias first
        for (alias, idx) in &index.ordered {
            if normalized.contains(alias.as_str()) || alias.contains(normalized.as_str()) {
                debug!(input = %normalized, alias = %alias, "substring alias match");
                return Ok(index.resolution(*idx, MatchConfidence::Alias));
            }
        }

        // 3. Fuzzy fallback on edit distance
        let threshold = (normalized.chars().count() / 5).max(3);
        let mut best: Option<(usize, usize)> = None; // (distance, entry idx)
        for (alias, idx) in &index.ordered {
            let distance = levenshtein(&normalized, alias);
            if distance <= threshold && best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, *idx));
            }
        }
        if let Some((distance, idx)) = best {
            debug!(input = %normalized, distance, "fuzzy alias match");
            return Ok(index.resolution(idx, MatchConfidence::Fuzzy));
        }

        Ok(Self::unknown(raw_area_text))
    }

    fn unknown(raw: &str) -> Resolution {
        Resolution {
            geo_id: slugify(raw),
            canonical_name: raw.trim().to_string(),
            geo_type: None,
            confidence: MatchConfidence::Unknown,
        }
    }

    /// Returns the cached index, rebuilding it when missing or stale. The
    /// rebuild swaps a fresh Arc in wholesale, so concurrent readers never see
    /// a torn index.
    async fn index(&self) -> Result<Arc<AliasIndex>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.built_at.elapsed() < self.config.cache_ttl {
                    return Ok(Arc::clone(&cached.index));
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some(cached) = cache.as_ref() {
            if cached.built_at.elapsed() < self.config.cache_ttl {
                return Ok(Arc::clone(&cached.index));
            }
        }

        let references = self
            .store
            .load_all()
            .await
            .context("loading geo reference set")?;
        info!(count = references.len(), "rebuilding geo alias index");
        let index = Arc::new(AliasIndex::build(references));
        *cache = Some(CachedIndex {
            index: Arc::clone(&index),
            built_at: Instant::now(),
        });
        Ok(index)
    }
}

/// Plain DP Levenshtein distance over chars
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn geo(id: &str, name: &str, aliases: &[&str]) -> GeoReference {
        GeoReference {
            id: id.to_string(),
            geo_type: GeoType::Community,
            canonical_name: name.to_string(),
            parent_id: Some("dubai".to_string()),
            aliases: aliases.iter().map(|a| a.to_string()).collect::<HashSet<_>>(),
            external_area_name: None,
        }
    }

    fn resolver_with(refs: Vec<GeoReference>) -> GeoResolver {
        GeoResolver::new(
            Arc::new(InMemoryGeoStore::new(refs)),
            GeoResolverConfig::default(),
        )
    }

    fn fixture() -> Vec<GeoReference> {
        vec![
            geo("dubai-marina", "Dubai Marina", &["marina", "marsa dubai"]),
            geo(
                "jumeirah-lake-towers",
                "Jumeirah Lake Towers",
                &["jlt", "jumeirah lakes towers"],
            ),
            geo("business-bay", "Business Bay", &[]),
        ]
    }

    #[tokio::test]
    async fn canonical_name_resolves_exact() {
        let resolver = resolver_with(fixture());
        let r = resolver.resolve("Dubai Marina").await.unwrap();
        assert_eq!(r.geo_id, "dubai-marina");
        assert_eq!(r.confidence, MatchConfidence::Exact);
    }

    #[tokio::test]
    async fn every_alias_resolves_to_its_geo() {
        let refs = fixture();
        let resolver = resolver_with(refs.clone());
        for reference in &refs {
            for alias in &reference.aliases {
                let r = resolver.resolve(alias).await.unwrap();
                assert_eq!(r.geo_id, reference.id, "alias {alias:?}");
                assert!(matches!(
                    r.confidence,
                    MatchConfidence::Exact | MatchConfidence::Alias
                ));
            }
        }
    }

    #[tokio::test]
    async fn substring_match_prefers_longest_alias() {
        let refs = vec![
            geo("al-barsha", "Al Barsha", &[]),
            geo("al-barsha-south", "Al Barsha South", &[]),
        ];
        let resolver = resolver_with(refs);
        let r = resolver.resolve("Al Barsha South, Dubai Land").await.unwrap();
        assert_eq!(r.geo_id, "al-barsha-south");
        assert_eq!(r.confidence, MatchConfidence::Alias);
    }

    #[tokio::test]
    async fn typo_resolves_fuzzily() {
        let resolver = resolver_with(fixture());
        let r = resolver.resolve("Busines Bey").await.unwrap();
        assert_eq!(r.geo_id, "business-bay");
        assert_eq!(r.confidence, MatchConfidence::Fuzzy);
    }

    #[tokio::test]
    async fn gibberish_is_unknown_and_slug_safe() {
        let resolver = resolver_with(fixture());
        let r = resolver.resolve("Xqzw Pltk 9000!!").await.unwrap();
        assert_eq!(r.confidence, MatchConfidence::Unknown);
        assert!(r.geo_type.is_none());
        assert!(r
            .geo_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-'));
        assert!(!r.geo_id.is_empty());
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        struct CountingStore {
            loads: AtomicU32,
        }

        #[async_trait]
        impl GeoReferenceStore for CountingStore {
            async fn load_all(&self) -> Result<Vec<GeoReference>> {
                self.loads.fetch_add(1, Ordering::SeqCst);
                Ok(fixture())
            }
        }

        let store = Arc::new(CountingStore { loads: AtomicU32::new(0) });
        let resolver = GeoResolver::new(Arc::clone(&store) as Arc<dyn GeoReferenceStore>, GeoResolverConfig::default());

        resolver.resolve("Dubai Marina").await.unwrap();
        resolver.resolve("JLT").await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        resolver.invalidate().await;
        resolver.resolve("Dubai Marina").await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("marina", "marina"), 0);
        assert_eq!(levenshtein("marina", "merina"), 1);
        assert_eq!(levenshtein("jlt", "jbr"), 2);
    }
}
