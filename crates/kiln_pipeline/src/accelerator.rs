use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::Backend;
use crate::kind::{ArtifactKind, DescriptorSets, Pipelines};

static NEXT_ACCELERATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique accelerator identity. Never reused, so a recycled table
/// slot is told apart from the accelerator that previously owned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AcceleratorId(u64);

impl AcceleratorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ACCELERATOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A deduplicated description bound to the artifacts built from it.
///
/// Accelerators are handed out as `Arc`s; the pool keeps only a weak
/// reference, so the accelerator (and every artifact built for it) is
/// released once the last caller drops it.
pub struct Accelerator<B: Backend, K: ArtifactKind<B>> {
    id: AcceleratorId,
    pool_guid: u32,
    slot: u32,
    description: Arc<K::Description>,
    _backend: PhantomData<fn() -> B>,
}

/// Accelerator of a render pipeline.
pub type PipelineAccelerator<B> = Accelerator<B, Pipelines>;

/// Accelerator of a material descriptor set.
pub type DescriptorSetAccelerator<B> = Accelerator<B, DescriptorSets>;

impl<B: Backend, K: ArtifactKind<B>> Accelerator<B, K> {
    pub(crate) fn new(pool_guid: u32, slot: u32, description: Arc<K::Description>) -> Self {
        Self {
            id: AcceleratorId::next(),
            pool_guid,
            slot,
            description,
            _backend: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> AcceleratorId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> &Arc<K::Description> {
        &self.description
    }

    /// Guid of the pool that created this accelerator.
    #[inline]
    #[must_use]
    pub fn pool_guid(&self) -> u32 {
        self.pool_guid
    }

    #[inline]
    pub(crate) fn slot(&self) -> u32 {
        self.slot
    }
}

impl<B: Backend, K: ArtifactKind<B>> fmt::Debug for Accelerator<B, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accelerator")
            .field("kind", &K::NAME)
            .field("id", &self.id)
            .field("pool", &self.pool_guid)
            .field("slot", &self.slot)
            .field("description", &self.description)
            .finish()
    }
}
