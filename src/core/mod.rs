//! Core business logic modules

pub mod recommend;

// Re-export commonly used types
pub use recommend::{compute_recommendations, flatten_recommendations, FlatViewConfig};
