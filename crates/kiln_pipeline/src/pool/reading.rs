use std::sync::Arc;

use parking_lot::RwLockReadGuard;

use kiln_core::{PoolError, VisibilityMarker};

use crate::accelerator::{Accelerator, DescriptorSetAccelerator, PipelineAccelerator};
use crate::backend::Backend;
use crate::config::SequencerConfig;
use crate::kind::{ArtifactKind, DescriptorSets, Pipelines};

use super::report_misuse;
use super::state::UsageState;

/// Shared hold on the pool's usage lock.
///
/// Lookups through the guard are plain array reads: no construction lock,
/// no atomics. A visibility barrier waits until every guard is dropped, so
/// hold one per batch of lookups (typically one per frame) rather than one
/// per draw, and never across a barrier on the same thread.
pub struct ReadingLock<'a, B: Backend> {
    guid: u32,
    usage: RwLockReadGuard<'a, UsageState<B>>,
    published: VisibilityMarker,
}

impl<'a, B: Backend> ReadingLock<'a, B> {
    pub(super) fn new(
        guid: u32,
        usage: RwLockReadGuard<'a, UsageState<B>>,
        published: VisibilityMarker,
    ) -> Self {
        Self { guid, usage, published }
    }

    /// Marker of the latest barrier; stable while the guard is held.
    #[inline]
    #[must_use]
    pub fn published(&self) -> VisibilityMarker {
        self.published
    }

    /// The artifact built for `accelerator` against `config`, if one was
    /// published at or before `marker`.
    #[must_use]
    pub fn try_get_artifact<K: ArtifactKind<B>>(
        &self,
        accelerator: &Accelerator<B, K>,
        config: &SequencerConfig,
        marker: VisibilityMarker,
    ) -> Option<&Arc<K::Artifact>> {
        if !self.owns(K::NAME, accelerator.pool_guid())
            || !self.owns("sequencer config", config.pool_guid())
        {
            return None;
        }
        K::completed(&self.usage).get(accelerator.slot(), accelerator.id(), config.index(), marker)
    }

    #[must_use]
    pub fn try_get_pipeline(
        &self,
        accelerator: &PipelineAccelerator<B>,
        config: &SequencerConfig,
        marker: VisibilityMarker,
    ) -> Option<&Arc<B::Pipeline>> {
        self.try_get_artifact::<Pipelines>(accelerator, config, marker)
    }

    #[must_use]
    pub fn try_get_descriptor_set(
        &self,
        accelerator: &DescriptorSetAccelerator<B>,
        config: &SequencerConfig,
        marker: VisibilityMarker,
    ) -> Option<&Arc<B::DescriptorSet>> {
        self.try_get_artifact::<DescriptorSets>(accelerator, config, marker)
    }

    /// `config`'s pipeline layout, if it was published at or before `marker`.
    #[must_use]
    pub fn try_get_pipeline_layout(
        &self,
        config: &SequencerConfig,
        marker: VisibilityMarker,
    ) -> Option<&Arc<B::Layout>> {
        if !self.owns("sequencer config", config.pool_guid()) {
            return None;
        }
        let published = self.usage.layouts.get(config.index() as usize)?.as_ref()?;
        published.visible_from.visible_to(marker).then_some(&published.layout)
    }

    /// Releases the usage lock.
    pub fn unlock(self) {
        drop(self.usage);
    }

    fn owns(&self, object: &'static str, actual_pool: u32) -> bool {
        if actual_pool == self.guid {
            return true;
        }
        report_misuse(PoolError::ForeignObject {
            object,
            expected_pool: self.guid,
            actual_pool,
        });
        false
    }
}
