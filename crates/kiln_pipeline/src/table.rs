//! Construction-side bookkeeping for one artifact kind.
//!
//! Everything here is guarded by the pool's construction lock. The
//! published, reader-facing half lives in [`crate::completed`].

use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::accelerator::{Accelerator, AcceleratorId};
use crate::backend::Backend;
use crate::future::{ArtifactFuture, ArtifactResolution, ConstructionId};
use crate::kind::ArtifactKind;

/// Sent by a finished construction, drained by the next barrier.
pub(crate) struct Completion<A> {
    pub slot: u32,
    pub accelerator: AcceleratorId,
    pub config_index: u32,
    pub construction: ConstructionId,
    pub resolution: Arc<ArtifactResolution<A>>,
}

/// A construction the barrier has already harvested.
pub(crate) struct Harvested<A> {
    pub future: ArtifactFuture<A>,
    pub resolution: Arc<ArtifactResolution<A>>,
}

/// Pending and last-harvested construction for one `(accelerator, config)`.
pub(crate) struct ConstructionSlot<A> {
    pub pending: Option<ArtifactFuture<A>>,
    pub current: Option<Harvested<A>>,
}

impl<A> Default for ConstructionSlot<A> {
    fn default() -> Self {
        Self {
            pending: None,
            current: None,
        }
    }
}

impl<A> ConstructionSlot<A> {
    /// A construction is in flight, or the last one (success or failure)
    /// still reflects current inputs.
    pub fn has_current_or_future(&self) -> bool {
        self.pending.is_some() || self.current.as_ref().is_some_and(|h| !h.resolution.is_stale())
    }

    /// Nothing in flight and the harvested result went stale.
    pub fn is_out_of_date(&self) -> bool {
        self.pending.is_none() && self.current.as_ref().is_some_and(|h| h.resolution.is_stale())
    }

    pub fn clear(&mut self) {
        self.pending = None;
        self.current = None;
    }
}

pub(crate) struct AcceleratorSlot<B: Backend, K: ArtifactKind<B>> {
    pub hash: u64,
    /// `None` once released, so parked slots hold no description data.
    pub description: Option<Arc<K::Description>>,
    pub weak: Weak<Accelerator<B, K>>,
    pub id: AcceleratorId,
    pub constructions: Vec<ConstructionSlot<K::Artifact>>,
    /// Cleared by a barrier and parked on the free list.
    pub released: bool,
}

impl<B: Backend, K: ArtifactKind<B>> AcceleratorSlot<B, K> {
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.released && self.weak.strong_count() > 0
    }

    pub fn construction(&self, config_index: u32) -> Option<&ConstructionSlot<K::Artifact>> {
        self.constructions.get(config_index as usize)
    }

    pub fn construction_mut(&mut self, config_index: u32) -> &mut ConstructionSlot<K::Artifact> {
        let index = config_index as usize;
        if self.constructions.len() <= index {
            self.constructions.resize_with(index + 1, ConstructionSlot::default);
        }
        &mut self.constructions[index]
    }
}

/// Result of a dedup lookup.
pub(crate) enum Lookup<B: Backend, K: ArtifactKind<B>> {
    Live(Arc<Accelerator<B, K>>),
    /// An equal description whose accelerator expired before a barrier
    /// released its slot.
    Expired(u32),
    Missing,
}

/// Dedup table, slots and completion channel for one artifact kind.
pub struct AcceleratorTable<B: Backend, K: ArtifactKind<B>> {
    pub(crate) lookup: FxHashMap<u64, SmallVec<[u32; 1]>>,
    pub(crate) slots: Vec<AcceleratorSlot<B, K>>,
    pub(crate) free: Vec<u32>,
    pub(crate) completions_tx: flume::Sender<Completion<K::Artifact>>,
    pub(crate) completions_rx: flume::Receiver<Completion<K::Artifact>>,
}

impl<B: Backend, K: ArtifactKind<B>> AcceleratorTable<B, K> {
    pub(crate) fn new() -> Self {
        let (completions_tx, completions_rx) = flume::unbounded();
        Self {
            lookup: FxHashMap::default(),
            slots: Vec::new(),
            free: Vec::new(),
            completions_tx,
            completions_rx,
        }
    }

    /// Looks up `description` by hash, comparing values within the bucket.
    pub(crate) fn find(&self, hash: u64, description: &K::Description) -> Lookup<B, K> {
        let Some(bucket) = self.lookup.get(&hash) else {
            return Lookup::Missing;
        };

        for &index in bucket {
            let slot = &self.slots[index as usize];
            if slot.description.as_deref() != Some(description) {
                continue;
            }
            return match slot.weak.upgrade() {
                Some(accelerator) => Lookup::Live(accelerator),
                None => Lookup::Expired(index),
            };
        }

        log::warn!(
            "{} description hash collision ({hash:#018x}); keeping both entries",
            K::NAME
        );
        Lookup::Missing
    }

    /// Allocates a slot (recycling a released one when available) and binds
    /// a new accelerator to it.
    pub(crate) fn insert(
        &mut self,
        pool_guid: u32,
        hash: u64,
        description: Arc<K::Description>,
    ) -> Arc<Accelerator<B, K>> {
        let index = self.free.pop().unwrap_or(self.slots.len() as u32);
        let accelerator = Arc::new(Accelerator::new(pool_guid, index, Arc::clone(&description)));
        let slot = AcceleratorSlot {
            hash,
            description: Some(description),
            weak: Arc::downgrade(&accelerator),
            id: accelerator.id(),
            constructions: Vec::new(),
            released: false,
        };

        match self.slots.get_mut(index as usize) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }

        self.lookup.entry(hash).or_default().push(index);
        accelerator
    }

    /// Binds a fresh accelerator to an expired slot in place.
    pub(crate) fn rebind(
        &mut self,
        pool_guid: u32,
        index: u32,
        description: Arc<K::Description>,
    ) -> Arc<Accelerator<B, K>> {
        let slot = &mut self.slots[index as usize];
        let accelerator = Arc::new(Accelerator::new(pool_guid, index, Arc::clone(&description)));
        slot.description = Some(description);
        slot.weak = Arc::downgrade(&accelerator);
        slot.id = accelerator.id();
        slot.constructions.clear();
        accelerator
    }

    /// Drops the slot's constructions, removes it from the dedup lookup and
    /// parks it on the free list. Only called by a barrier, after the
    /// published artifacts for the slot were cleared.
    pub(crate) fn release(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.constructions.clear();
        slot.description = None;
        slot.released = true;
        let hash = slot.hash;

        if let Some(bucket) = self.lookup.get_mut(&hash) {
            bucket.retain(|i| *i != index);
            if bucket.is_empty() {
                self.lookup.remove(&hash);
            }
        }
        self.free.push(index);
    }

    /// Indices of slots whose accelerator is still held by someone.
    pub(crate) fn live_slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_alive())
            .map(|(index, _)| index as u32)
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_alive()).count()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.slots
            .iter()
            .flat_map(|slot| slot.constructions.iter())
            .filter(|c| c.pending.is_some())
            .count()
    }

    /// Drops every construction against `config_index`.
    pub(crate) fn clear_config(&mut self, config_index: u32) {
        for slot in &mut self.slots {
            if let Some(construction) = slot.constructions.get_mut(config_index as usize) {
                construction.clear();
            }
        }
    }
}
