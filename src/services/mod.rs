pub mod analyzer;
pub mod cache;
pub mod classifier;
pub mod loader;
pub mod markdown;
pub mod router;
pub mod stats;
pub mod summary;
