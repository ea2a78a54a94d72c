//! Probability table loading

pub mod source;

// Re-export commonly used types
pub use source::{
    fetch_or_uniform, load_prediction_file, uniform_field, FetchedProbabilities, InMemorySource,
    JsonFileSource, ProbabilitySource, UNIFORM_FALLBACK_WARNING,
};
