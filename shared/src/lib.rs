//! Shared utilities for the commerce/ERP sync workspace
//!
//! Small building blocks used by the client crates and the sync engine:
//!
//! - **Request cache** (`cache`): per-request key/value store with scoped
//!   overrides
//! - **Traversal** (`traverse`): typed path access into decoded JSON
//! - **Text** (`text`): accent/case-insensitive string comparison

pub mod cache;
pub mod text;
pub mod traverse;

// Re-exports
pub use cache::{CacheKey, CacheUndo, RequestCache};
pub use traverse::{Seg, TraverseError};
