pub mod engine;
pub mod store;

pub use engine::{
    calculate_match_score, price_range_score, recommendations, score_properties,
    select_top_matches, MatchError, MatchEvaluation, MatchingEngine, PriceFit,
    MAX_MATCHES_PER_LEAD, RETENTION_THRESHOLD,
};
pub use store::{InMemoryMatchStore, MatchStore};
