// Market sentiment input
// Sentiment is a pluggable input to the scorer: the pipeline wires whatever
// provider it has, and the scorer only defaults to neutral when no context is
// supplied at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketOutlook {
    Bullish,
    Neutral,
    Bearish,
}

/// Area-level market sentiment derived from news and development activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentContext {
    pub outlook: MarketOutlook,
    /// Known positive developments (new transit, school, master plan...)
    pub positive_developments: u32,
    /// Known negative developments (oversupply, closures...)
    pub negative_developments: u32,
    /// When the underlying news/context was gathered
    pub as_of: DateTime<Utc>,
}

impl SentimentContext {
    pub fn is_neutral(&self) -> bool {
        self.outlook == MarketOutlook::Neutral
            && self.positive_developments == 0
            && self.negative_developments == 0
    }
}
