//! Accelerator Pool
//!
//! The coordinator that turns descriptions into deduplicated accelerators,
//! drives their construction against every live sequencer config, and
//! publishes finished artifacts at visibility barriers.
//!
//! # Locking
//!
//! Two locks, always taken in this order:
//!
//! 1. **usage** (`RwLock`): readers hold it shared for a batch of lookups
//!    through a [`ReadingLock`]; only a visibility barrier takes it
//!    exclusively.
//! 2. **construction** (`Mutex`): short critical sections around the dedup
//!    tables, pending constructions and completion bookkeeping.
//!
//! Nothing holding the construction lock ever waits for the usage lock, and
//! the read path never touches the construction lock.
//!
//! # Frame Loop
//!
//! ```rust,ignore
//! let pool = AcceleratorPool::new(backend, PoolSettings::default())?;
//! let config = pool.create_sequencer_config("forward", config_desc);
//! let accelerator = pool.create_pipeline_accelerator(pipeline_desc);
//!
//! loop {
//!     let marker = pool.visibility_barrier();
//!     let reader = pool.lock_for_reading();
//!     if let Some(pipeline) = reader.try_get_pipeline(&accelerator, &config, marker) {
//!         // draw
//!     }
//! }
//! ```

mod barrier;
mod construction;
mod reading;
pub(crate) mod state;
mod sweep;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::executor::ThreadPool;
use futures::task::Spawn;
use parking_lot::{Mutex, RwLock};

use kiln_core::{PoolError, Result, SelectorSet, VisibilityMarker, interner};

use crate::accelerator::{Accelerator, DescriptorSetAccelerator, PipelineAccelerator};
use crate::backend::Backend;
use crate::config::SequencerConfig;
use crate::description::{DescriptorSetDescription, PipelineDescription, SequencerConfigDesc};
use crate::future::{ArtifactFuture, LayoutFuture};
use crate::kind::{ArtifactKind, DescriptorSets, Pipelines};
use crate::records::PoolRecords;
use crate::settings::PoolSettings;

pub use reading::ReadingLock;
use state::{ConstructionState, UsageState};

static NEXT_POOL_GUID: AtomicU32 = AtomicU32::new(1);

/// Executor construction tasks are spawned on.
pub type Executor = Arc<dyn Spawn + Send + Sync>;

pub(crate) struct PoolInner<B: Backend> {
    guid: u32,
    backend: Arc<B>,
    settings: PoolSettings,
    executor: Executor,
    published: AtomicU64,
    usage: RwLock<UsageState<B>>,
    construction: Mutex<ConstructionState<B>>,
    self_ref: Weak<PoolInner<B>>,
}

impl<B: Backend> PoolInner<B> {
    #[inline]
    fn published_marker(&self) -> VisibilityMarker {
        VisibilityMarker::from_raw(self.published.load(Ordering::Acquire))
    }

    fn check_guid(&self, object: &'static str, actual_pool: u32) -> Result<()> {
        if actual_pool == self.guid {
            return Ok(());
        }
        Err(report_misuse(PoolError::ForeignObject {
            object,
            expected_pool: self.guid,
            actual_pool,
        }))
    }
}

/// Misuse is a programming error: fatal in debug builds, logged and
/// returned in release builds.
fn report_misuse(err: PoolError) -> PoolError {
    if cfg!(debug_assertions) {
        panic!("accelerator pool misuse: {err}");
    }
    log::error!("accelerator pool misuse: {err}");
    err
}

/// Deduplicating, asynchronously-constructing cache of pipelines and
/// descriptor sets. Cheap to clone; clones share one pool.
pub struct AcceleratorPool<B: Backend> {
    inner: Arc<PoolInner<B>>,
}

impl<B: Backend> Clone for AcceleratorPool<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> AcceleratorPool<B> {
    /// Creates a pool that runs constructions on its own thread pool.
    pub fn new(backend: impl Into<Arc<B>>, settings: PoolSettings) -> Result<Self> {
        let executor = ThreadPool::builder().name_prefix("kiln-construct-").create()?;
        Ok(Self::with_executor(backend, settings, Arc::new(executor)))
    }

    /// Creates a pool that spawns constructions on `executor`.
    pub fn with_executor(
        backend: impl Into<Arc<B>>,
        settings: PoolSettings,
        executor: Executor,
    ) -> Self {
        interner::preload_geometry_selectors();

        let guid = NEXT_POOL_GUID.fetch_add(1, Ordering::Relaxed);
        log::debug!("creating {} (guid {guid})", settings.display_label());

        let backend = backend.into();
        let inner = Arc::new_cyclic(|self_ref| PoolInner {
            guid,
            backend,
            settings,
            executor,
            published: AtomicU64::new(VisibilityMarker::INITIAL.raw()),
            usage: RwLock::new(UsageState::new()),
            construction: Mutex::new(ConstructionState::new()),
            self_ref: self_ref.clone(),
        });
        Self { inner }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn guid(&self) -> u32 {
        self.inner.guid
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.inner.backend
    }

    /// Marker returned by the most recent barrier.
    #[must_use]
    pub fn published_visibility(&self) -> VisibilityMarker {
        self.inner.published_marker()
    }

    #[must_use]
    pub fn live_accelerator_count<K: ArtifactKind<B>>(&self) -> usize {
        K::table_ref(&self.inner.construction.lock()).live_count()
    }

    #[must_use]
    pub fn live_config_count(&self) -> usize {
        self.inner.construction.lock().live_config_indices().len()
    }

    #[must_use]
    pub fn pending_construction_count(&self) -> usize {
        let state = self.inner.construction.lock();
        state.pipelines.pending_count() + state.descriptor_sets.pending_count()
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Returns the live accelerator for `description`, or creates one and
    /// starts building it against every live sequencer config.
    pub fn create_accelerator<K: ArtifactKind<B>>(
        &self,
        description: K::Description,
    ) -> Arc<Accelerator<B, K>> {
        self.inner.create_accelerator::<K>(description)
    }

    pub fn create_pipeline_accelerator(
        &self,
        description: PipelineDescription,
    ) -> Arc<PipelineAccelerator<B>> {
        self.create_accelerator::<Pipelines>(description)
    }

    pub fn create_descriptor_set_accelerator(
        &self,
        description: DescriptorSetDescription,
    ) -> Arc<DescriptorSetAccelerator<B>> {
        self.create_accelerator::<DescriptorSets>(description)
    }

    /// Returns the live config equal to `desc` (adding `name` to its name),
    /// or creates one, requests its pipeline layout and starts building
    /// every live accelerator against it.
    pub fn create_sequencer_config(
        &self,
        name: &str,
        desc: SequencerConfigDesc,
    ) -> Arc<SequencerConfig> {
        self.inner.create_sequencer_config(name, desc)
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Starts building `accelerator` against `config` unless a construction
    /// is already in flight or the last result is still current, in which
    /// case that construction is returned instead.
    pub fn begin_construction<K: ArtifactKind<B>>(
        &self,
        accelerator: &Accelerator<B, K>,
        config: &SequencerConfig,
    ) -> Result<ArtifactFuture<K::Artifact>> {
        self.check_pair(accelerator, config)?;
        let mut state = self.inner.construction.lock();
        Ok(self
            .inner
            .begin_construction::<K>(&mut state, accelerator.slot(), config.index()))
    }

    pub fn has_current_or_future<K: ArtifactKind<B>>(
        &self,
        accelerator: &Accelerator<B, K>,
        config: &SequencerConfig,
    ) -> Result<bool> {
        self.check_pair(accelerator, config)?;
        let state = self.inner.construction.lock();
        Ok(K::table_ref(&state).slots[accelerator.slot() as usize]
            .construction(config.index())
            .is_some_and(|c| c.has_current_or_future()))
    }

    /// The in-flight construction, or the last harvested one. Never starts
    /// new work.
    pub fn artifact_future<K: ArtifactKind<B>>(
        &self,
        accelerator: &Accelerator<B, K>,
        config: &SequencerConfig,
    ) -> Result<Option<ArtifactFuture<K::Artifact>>> {
        self.check_pair(accelerator, config)?;
        let state = self.inner.construction.lock();
        let future = K::table_ref(&state).slots[accelerator.slot() as usize]
            .construction(config.index())
            .and_then(|c| {
                c.pending
                    .clone()
                    .or_else(|| c.current.as_ref().map(|h| h.future.clone()))
            });
        Ok(future)
    }

    /// Shared future of `config`'s pipeline layout.
    pub fn pipeline_layout_future(
        &self,
        config: &SequencerConfig,
    ) -> Result<LayoutFuture<B::Layout>> {
        self.inner.check_guid("sequencer config", config.pool_guid())?;
        let state = self.inner.construction.lock();
        Ok(state.configs[config.index() as usize].layout_future())
    }

    /// Restarts every construction whose dependency went stale. Unbounded;
    /// prefer the amortized sweep done by each barrier for per-frame use.
    pub fn rebuild_all_out_of_date(&self) -> usize {
        let mut state = self.inner.construction.lock();
        self.inner.rebuild_all_out_of_date(&mut state)
    }

    // ========================================================================
    // Global Selectors
    // ========================================================================

    /// Sets a selector applied to every pipeline; restarts every
    /// construction when the value changes.
    pub fn set_global_selector(&self, name: &str, value: &str) {
        let mut state = self.inner.construction.lock();
        if state.global_selectors.get(name) == Some(value) {
            return;
        }
        state.global_selectors.set(name, value);
        log::info!("global selector {name}={value} set; restarting all constructions");
        self.inner.restart_all(&mut state);
    }

    /// Removes a global selector; restarts every construction when it was set.
    pub fn remove_global_selector(&self, name: &str) -> bool {
        let mut state = self.inner.construction.lock();
        if !state.global_selectors.remove(name) {
            return false;
        }
        log::info!("global selector {name} removed; restarting all constructions");
        self.inner.restart_all(&mut state);
        true
    }

    #[must_use]
    pub fn global_selectors(&self) -> SelectorSet {
        self.inner.construction.lock().global_selectors.clone()
    }

    // ========================================================================
    // Visibility
    // ========================================================================

    /// Publishes a new marker, harvesting finished constructions and
    /// sweeping for stale ones. Call once per frame, never concurrently with
    /// itself.
    pub fn visibility_barrier(&self) -> VisibilityMarker {
        self.inner.visibility_barrier(VisibilityMarker::NEVER)
    }

    /// Like [`Self::visibility_barrier`], but returns immediately when the
    /// published marker already reaches `expected`.
    pub fn visibility_barrier_at_least(&self, expected: VisibilityMarker) -> VisibilityMarker {
        self.inner.visibility_barrier(expected)
    }

    /// Takes the usage lock in shared mode for a batch of lookups. Drop the
    /// guard (or call [`ReadingLock::unlock`]) to release it.
    pub fn lock_for_reading(&self) -> ReadingLock<'_, B> {
        ReadingLock::new(self.inner.guid, self.inner.usage.read(), self.inner.published_marker())
    }

    // ========================================================================
    // Debugging
    // ========================================================================

    #[must_use]
    pub fn records(&self) -> PoolRecords {
        let usage = self.inner.usage.read();
        let state = self.inner.construction.lock();
        PoolRecords::collect(
            &self.inner.settings,
            self.inner.guid,
            self.inner.published_marker(),
            &usage,
            &state,
        )
    }

    fn check_pair<K: ArtifactKind<B>>(
        &self,
        accelerator: &Accelerator<B, K>,
        config: &SequencerConfig,
    ) -> Result<()> {
        self.inner.check_guid(K::NAME, accelerator.pool_guid())?;
        self.inner.check_guid("sequencer config", config.pool_guid())
    }
}

impl<B: Backend> std::fmt::Debug for AcceleratorPool<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceleratorPool")
            .field("guid", &self.inner.guid)
            .field("label", &self.inner.settings.label)
            .field("published", &self.inner.published_marker())
            .finish_non_exhaustive()
    }
}
