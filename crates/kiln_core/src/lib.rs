//! Foundational types for the Kiln pipeline cache.
//!
//! - [`interner`]: global string interner backing selector names/values
//! - [`SelectorSet`]: sorted, hashable shader selector definitions
//! - [`DependencyToken`]: hot-reload staleness tracking
//! - [`VisibilityMarker`]: versions published by visibility barriers
//! - [`errors`]: construction and pool error types

pub mod dependency;
pub mod errors;
pub mod hash;
pub mod interner;
pub mod selectors;
pub mod visibility;

pub use dependency::DependencyToken;
pub use errors::{ConstructionError, ConstructionErrorKind, PoolError, Result};
pub use hash::{fx_hash_key, hash_combine, source_hash};
pub use interner::Symbol;
pub use selectors::SelectorSet;
pub use visibility::VisibilityMarker;
