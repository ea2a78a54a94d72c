//! Boatrace bet recommendations
//!
//! This library provides:
//! - Ranked 単勝 / 2連単 / 2連複 / 3連単 / 3連複 candidates from per-boat
//!   finishing-position probabilities
//! - Confidence tiers per wager type
//! - A flat cross-wager-type view of the top candidates
//! - Probability sources with a uniform fallback
//!
//! # Example
//!
//! ```
//! use boatrace::core::compute_recommendations;
//! use boatrace::data::{fetch_or_uniform, InMemorySource};
//!
//! // No predictions stored for race 1, so the uniform table is used
//! let source = InMemorySource::new();
//! let fetched = fetch_or_uniform(&source, 1);
//!
//! let set = compute_recommendations(&fetched.boats);
//! for candidate in &set.nirenpuku {
//!     println!("{} {:.3}", candidate.combination, candidate.probability);
//! }
//! ```

pub mod core;
pub mod data;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use crate::core::{compute_recommendations, flatten_recommendations, FlatViewConfig};
pub use data::{fetch_or_uniform, JsonFileSource, ProbabilitySource};
pub use error::{InputShapeError, SourceError};
pub use models::{
    BetCandidate, BoatProbability, ConfidenceTier, FlatRecommendation, RecommendResponse,
    RecommendationSet, WagerType,
};
