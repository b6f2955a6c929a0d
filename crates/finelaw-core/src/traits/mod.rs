//! Seams between the orchestrator and its external collaborators.

pub mod embedding;
pub mod provider;

pub use embedding::Embedder;
pub use provider::Provider;
