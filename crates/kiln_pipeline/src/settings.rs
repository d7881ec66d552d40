//! Pool Settings
//!
//! Tuning knobs for an [`AcceleratorPool`](crate::AcceleratorPool).
//!
//! ```rust,ignore
//! use kiln_pipeline::{AcceleratorPool, PoolSettings};
//!
//! let pool = AcceleratorPool::new(backend, PoolSettings {
//!     hot_reload_checks_per_barrier: 256,
//!     label: Some("main".into()),
//!     ..Default::default()
//! })?;
//! ```

// ---------------------------------------------------------------------------
// PoolSettings
// ---------------------------------------------------------------------------

/// Construction and hot-reload behaviour of an accelerator pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on `(accelerator, config)` pairs re-checked for stale
    /// dependencies per visibility barrier. The sweep cursor rotates, so
    /// every pair is eventually visited regardless of cache size.
    ///
    /// `0` disables the amortized sweep; `rebuild_all_out_of_date` still works.
    pub hot_reload_checks_per_barrier: usize,

    /// Forwarded to descriptor-set construction requests so the backend can
    /// keep human-readable binding information for debugging tools.
    pub record_binding_info: bool,

    /// Name used in log lines.
    pub label: Option<String>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            hot_reload_checks_per_barrier: 64,
            record_binding_info: false,
            label: None,
        }
    }
}

impl PoolSettings {
    pub(crate) fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("accelerator pool")
    }
}
