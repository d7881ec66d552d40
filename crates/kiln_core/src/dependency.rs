//! Dependency tokens
//!
//! A [`DependencyToken`] travels with every constructed artifact (and every
//! construction failure) and answers one question: *is the thing this was
//! built from still current?*
//!
//! Each token carries a validation index that starts at `0`. Calling
//! [`DependencyToken::invalidate`] bumps it; a token is stale when its own
//! index is non-zero or when any token it was registered against is stale.
//! Hot reload works by invalidating the token of a changed source file and
//! letting the accelerator pool notice during its sweep.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use smallvec::SmallVec;

struct TokenInner {
    validation_index: AtomicU32,
    dependencies: SmallVec<[DependencyToken; 2]>,
}

/// Shared, cheaply-cloneable staleness marker.
#[derive(Clone)]
pub struct DependencyToken {
    inner: Arc<TokenInner>,
}

impl DependencyToken {
    /// Creates a fresh token with no upstream dependencies.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dependencies(std::iter::empty())
    }

    /// Creates a token that also becomes stale when any of `dependencies` does.
    #[must_use]
    pub fn with_dependencies(dependencies: impl IntoIterator<Item = DependencyToken>) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                validation_index: AtomicU32::new(0),
                dependencies: dependencies.into_iter().collect(),
            }),
        }
    }

    /// Marks this token (and everything registered against it) out of date.
    pub fn invalidate(&self) {
        self.inner.validation_index.fetch_add(1, Ordering::AcqRel);
    }

    /// Own validation index; `0` means current.
    #[inline]
    #[must_use]
    pub fn validation_index(&self) -> u32 {
        self.inner.validation_index.load(Ordering::Acquire)
    }

    /// `true` once this token or any upstream token was invalidated.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.validation_index() != 0 || self.inner.dependencies.iter().any(Self::is_stale)
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.len()
    }
}

impl Default for DependencyToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DependencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyToken")
            .field("validation_index", &self.validation_index())
            .field("dependencies", &self.inner.dependencies.len())
            .field("stale", &self.is_stale())
            .finish()
    }
}
