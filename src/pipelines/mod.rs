//! Concrete deployment pipelines assembled from the engine.
pub mod bot;
pub mod dashboard;
