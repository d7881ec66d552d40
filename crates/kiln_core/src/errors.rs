//! Error Types
//!
//! Two families of errors exist in the pipeline cache:
//!
//! - [`ConstructionError`]: an artifact (pipeline, descriptor set, pipeline
//!   layout) could not be built. These never abort the pool; they are recorded
//!   against one `(accelerator, config)` pair and the slot simply stays "not
//!   ready" until its dependency token goes stale and a rebuild succeeds.
//! - [`PoolError`]: the pool itself was misused or could not start.
//!
//! ```rust,ignore
//! use kiln_core::errors::{ConstructionError, Result};
//!
//! fn build() -> std::result::Result<(), ConstructionError> {
//!     Err(ConstructionError::failed("shader did not compile"))
//! }
//! ```

use thiserror::Error;

use crate::dependency::DependencyToken;

/// What went wrong while constructing an artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionErrorKind {
    // ========================================================================
    // Backend Failures
    // ========================================================================
    /// The backend reported a failure (compile error, invalid state, ...).
    #[error("construction failed: {0}")]
    Failed(String),

    /// A shared input (pipeline layout, shader patches, bound resource)
    /// never resolved.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    // ========================================================================
    // Lifecycle
    // ========================================================================
    /// The owning accelerator was dropped before its construction ran.
    #[error("accelerator was released before construction finished")]
    AcceleratorReleased,

    /// The executor refused the construction task.
    #[error("construction could not be scheduled: {0}")]
    Unscheduled(String),
}

/// A failed construction, plus the dependency token that should trigger a
/// retry once it goes stale.
#[derive(Error, Debug, Clone)]
#[error("{kind}")]
pub struct ConstructionError {
    kind: ConstructionErrorKind,
    dependency: Option<DependencyToken>,
}

impl ConstructionError {
    #[must_use]
    pub fn new(kind: ConstructionErrorKind) -> Self {
        Self {
            kind,
            dependency: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ConstructionErrorKind::Failed(message.into()))
    }

    #[must_use]
    pub fn missing_dependency(what: impl Into<String>) -> Self {
        Self::new(ConstructionErrorKind::MissingDependency(what.into()))
    }

    /// Attaches the token whose invalidation should cause a rebuild.
    #[must_use]
    pub fn with_dependency(mut self, dependency: DependencyToken) -> Self {
        self.dependency = Some(dependency);
        self
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ConstructionErrorKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn dependency(&self) -> Option<&DependencyToken> {
        self.dependency.as_ref()
    }

    /// `true` when the recorded dependency has gone stale. A failure with no
    /// dependency is never retried automatically.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.dependency.as_ref().is_some_and(DependencyToken::is_stale)
    }
}

/// Errors raised by the accelerator pool itself.
#[derive(Error, Debug)]
pub enum PoolError {
    /// An accelerator or sequencer config from another pool was passed in.
    #[error("{object} belongs to pool {actual_pool}, not pool {expected_pool}")]
    ForeignObject {
        /// What kind of object was passed
        object: &'static str,
        /// The pool that was asked
        expected_pool: u32,
        /// The pool that created the object
        actual_pool: u32,
    },

    /// The default construction thread pool could not be started.
    #[error("failed to start construction executor: {0}")]
    ExecutorStartup(#[from] std::io::Error),
}

/// Alias for `Result<T, PoolError>`.
pub type Result<T> = std::result::Result<T, PoolError>;
