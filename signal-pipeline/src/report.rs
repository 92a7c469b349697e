// Run report
// Per-stage accounting for one pipeline run. Skipped-for-insufficient-data,
// failed and below-threshold are distinct buckets: they have different
// remediation paths for the operator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_listings: usize,
    /// Listings that produced a composite score (including below-threshold)
    pub analyzed: usize,
    /// No comparables at the minimum count, or no usable price-per-area
    pub skipped_insufficient_data: usize,
    /// Errored after retries; isolated from the rest of the batch
    pub failed: usize,
    /// Scored, but under the configured minimum composite score
    pub below_threshold: usize,
    /// Signals emitted this run
    pub opportunities: usize,
    pub signals_upserted: usize,
    pub by_rating: HashMap<String, usize>,
    pub by_tier: HashMap<u8, usize>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            total_listings: 0,
            analyzed: 0,
            skipped_insufficient_data: 0,
            failed: 0,
            below_threshold: 0,
            opportunities: 0,
            signals_upserted: 0,
            by_rating: HashMap::new(),
            by_tier: HashMap::new(),
        }
    }

    pub fn record_rating(&mut self, rating: &str) {
        *self.by_rating.entry(rating.to_string()).or_insert(0) += 1;
    }

    pub fn record_tier(&mut self, tier: u8) {
        *self.by_tier.entry(tier).or_insert(0) += 1;
    }

    /// Plain-text summary table for the CLI / log output
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "pipeline run summary");
        let _ = writeln!(out, "  duration            {}s", (self.finished_at - self.started_at).num_seconds());
        let _ = writeln!(out, "  listings            {}", self.total_listings);
        let _ = writeln!(out, "  analyzed            {}", self.analyzed);
        let _ = writeln!(out, "  insufficient data   {}", self.skipped_insufficient_data);
        let _ = writeln!(out, "  failed              {}", self.failed);
        let _ = writeln!(out, "  below threshold     {}", self.below_threshold);
        let _ = writeln!(out, "  opportunities       {}", self.opportunities);
        let _ = writeln!(out, "  signals upserted    {}", self.signals_upserted);

        if !self.by_rating.is_empty() {
            let _ = writeln!(out, "  by rating:");
            let mut ratings: Vec<_> = self.by_rating.iter().collect();
            ratings.sort_by(|a, b| a.0.cmp(b.0));
            for (rating, count) in ratings {
                let _ = writeln!(out, "    {rating:<24} {count}");
            }
        }
        if !self.by_tier.is_empty() {
            let _ = writeln!(out, "  by match tier:");
            let mut tiers: Vec<_> = self.by_tier.iter().collect();
            tiers.sort_by_key(|(tier, _)| **tier);
            for (tier, count) in tiers {
                let _ = writeln!(out, "    tier {tier:<19} {count}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_bucket() {
        let mut report = RunReport::new(Utc::now());
        report.total_listings = 10;
        report.analyzed = 7;
        report.skipped_insufficient_data = 2;
        report.failed = 1;
        report.below_threshold = 4;
        report.opportunities = 3;
        report.record_rating("strong_buy");
        report.record_rating("strong_buy");
        report.record_rating("fair_deal");
        report.record_tier(2);
        report.record_tier(3);

        let summary = report.summary();
        assert!(summary.contains("insufficient data   2"));
        assert!(summary.contains("failed              1"));
        assert!(summary.contains("below threshold     4"));
        assert!(summary.contains("strong_buy"));
        assert!(summary.contains("tier 2"));
        assert_eq!(report.by_rating["strong_buy"], 2);
    }
}
