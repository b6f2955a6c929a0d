//! # FineLaw Core
//!
//! Shared building blocks for the FineLaw workspace: configuration, the error
//! taxonomy, message types, and the `Provider` / `Embedder` seams that the
//! knowledge store and chat orchestrator are written against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::FineLawConfig;
pub use error::{FineLawError, Result};
