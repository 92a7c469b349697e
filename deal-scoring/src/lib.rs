// Composite Deal Scoring (Layer 2)
// Combines price discount, yield premium, comparable match quality, market
// sentiment, liquidity and data recency into one explainable 0-100 score.

pub mod error;
pub mod scorer;
pub mod sentiment;

pub use error::ScoreError;
pub use scorer::{
    DealAnalysis, DealRating, DealScore, DealScorer, ScoreBreakdown, ScoringWeights,
};
pub use sentiment::{MarketOutlook, SentimentContext};
