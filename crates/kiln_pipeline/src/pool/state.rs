//! State behind the pool's two locks.
//!
//! [`UsageState`] sits inside the usage `RwLock` and holds everything a
//! reader may touch. [`ConstructionState`] sits inside the construction
//! `Mutex` and holds the dedup tables, pending constructions and sweep
//! cursor. Lock order is always usage, then construction.

use std::sync::{Arc, Weak};

use futures::FutureExt;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use kiln_core::{ConstructionError, DependencyToken, SelectorSet};

use crate::backend::Backend;
use crate::completed::{CompletedTable, PublishedLayout};
use crate::config::SequencerConfig;
use crate::description::SequencerConfigDesc;
use crate::future::{ConstructionId, LayoutFuture};
use crate::kind::{DescriptorSets, Pipelines};
use crate::table::AcceleratorTable;

/// The shared pipeline layout of one sequencer config.
pub(crate) struct LayoutDependency<L> {
    pub future: LayoutFuture<L>,
    pub resolved: Option<Arc<L>>,
    pub dependency: Option<DependencyToken>,
    pub error: Option<ConstructionError>,
}

impl<L> LayoutDependency<L> {
    pub fn new(future: LayoutFuture<L>) -> Self {
        Self {
            future,
            resolved: None,
            dependency: None,
            error: None,
        }
    }

    /// Records the layout's outcome the first time its future is seen
    /// finished. Returns that outcome once; `None` afterwards or while the
    /// layout is still being built.
    pub fn capture(&mut self) -> Option<Result<Arc<L>, ConstructionError>> {
        if self.resolved.is_some() || self.error.is_some() {
            return None;
        }
        match self.future.peek()? {
            Ok(constructed) => {
                self.resolved = Some(Arc::clone(&constructed.value));
                self.dependency = Some(constructed.dependency.clone());
                Some(Ok(Arc::clone(&constructed.value)))
            }
            Err(err) => {
                self.error = Some(err.clone());
                Some(Err(err.clone()))
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.resolved.is_some()
    }

    /// The captured layout (or failure) was built from inputs that changed.
    pub fn is_stale(&self) -> bool {
        self.dependency.as_ref().is_some_and(DependencyToken::is_stale)
            || self.error.as_ref().is_some_and(ConstructionError::is_stale)
    }
}

pub(crate) struct ConfigSlot<B: Backend> {
    pub hash: u64,
    pub desc: Arc<SequencerConfigDesc>,
    pub weak: Weak<SequencerConfig>,
    /// `None` once released; the layout is dropped with the config.
    pub layout: Option<LayoutDependency<B::Layout>>,
    /// Set by the barrier that cleared this config's artifacts.
    pub released: bool,
}

impl<B: Backend> ConfigSlot<B> {
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.released && self.weak.strong_count() > 0
    }

    pub fn layout_future(&self) -> LayoutFuture<B::Layout> {
        match &self.layout {
            Some(layout) => layout.future.clone(),
            None => futures::future::ready(Err(ConstructionError::missing_dependency(
                "sequencer config was released",
            )))
            .boxed()
            .shared(),
        }
    }

    pub fn is_layout_ready(&self) -> bool {
        self.layout.as_ref().is_some_and(LayoutDependency::is_ready)
    }

    /// Drops the layout and everything else only a live config needs.
    pub fn release(&mut self) {
        self.layout = None;
        self.released = true;
    }
}

/// Everything guarded by the construction lock.
pub struct ConstructionState<B: Backend> {
    pub(crate) global_selectors: SelectorSet,
    pub(crate) config_lookup: FxHashMap<u64, SmallVec<[u32; 1]>>,
    pub(crate) configs: Vec<ConfigSlot<B>>,
    /// Released config slots, reused by configs with new descriptions.
    pub(crate) free_configs: Vec<u32>,
    pub(crate) pipelines: AcceleratorTable<B, Pipelines>,
    pub(crate) descriptor_sets: AcceleratorTable<B, DescriptorSets>,
    pub(crate) sweep_cursor: u64,
    next_construction: u64,
}

impl<B: Backend> ConstructionState<B> {
    pub(crate) fn new() -> Self {
        Self {
            global_selectors: SelectorSet::new(),
            config_lookup: FxHashMap::default(),
            configs: Vec::new(),
            free_configs: Vec::new(),
            pipelines: AcceleratorTable::new(),
            descriptor_sets: AcceleratorTable::new(),
            sweep_cursor: 0,
            next_construction: 1,
        }
    }

    pub(crate) fn next_construction_id(&mut self) -> ConstructionId {
        let id = ConstructionId(self.next_construction);
        self.next_construction += 1;
        id
    }

    /// Slot of a config with an equal description, live or expired.
    pub(crate) fn find_config(&self, hash: u64, desc: &SequencerConfigDesc) -> Option<u32> {
        self.config_lookup
            .get(&hash)?
            .iter()
            .copied()
            .find(|&index| *self.configs[index as usize].desc == *desc)
    }

    /// Removes a recycled config slot's previous description from the
    /// dedup lookup.
    pub(crate) fn forget_config(&mut self, hash: u64, index: u32) {
        if let Some(bucket) = self.config_lookup.get_mut(&hash) {
            bucket.retain(|i| *i != index);
            if bucket.is_empty() {
                self.config_lookup.remove(&hash);
            }
        }
    }

    pub(crate) fn live_config_indices(&self) -> SmallVec<[u32; 8]> {
        self.configs
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_alive())
            .map(|(index, _)| index as u32)
            .collect()
    }
}

/// Everything readers see, guarded by the usage lock.
pub struct UsageState<B: Backend> {
    pub(crate) pipelines: CompletedTable<B::Pipeline>,
    pub(crate) descriptor_sets: CompletedTable<B::DescriptorSet>,
    pub(crate) layouts: Vec<Option<PublishedLayout<B::Layout>>>,
}

impl<B: Backend> UsageState<B> {
    pub(crate) fn new() -> Self {
        Self {
            pipelines: CompletedTable::default(),
            descriptor_sets: CompletedTable::default(),
            layouts: Vec::new(),
        }
    }

    pub(crate) fn publish_layout(&mut self, config_index: u32, layout: PublishedLayout<B::Layout>) {
        let index = config_index as usize;
        if self.layouts.len() <= index {
            self.layouts.resize_with(index + 1, || None);
        }
        self.layouts[index] = Some(layout);
    }

    pub(crate) fn clear_config(&mut self, config_index: u32) {
        if let Some(layout) = self.layouts.get_mut(config_index as usize) {
            *layout = None;
        }
        self.pipelines.clear_config(config_index);
        self.descriptor_sets.clear_config(config_index);
    }
}
