//! Artifact kinds
//!
//! The dedup, construction, harvest and visibility machinery of the pool is
//! written once, generic over an [`ArtifactKind`]. Two kinds exist:
//! [`Pipelines`] and [`DescriptorSets`]. Each names its description and
//! artifact types and knows which backend call builds it.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use kiln_core::{DependencyToken, SelectorSet};

use crate::backend::{Backend, ConstructionFuture, DescriptorSetRequest, PipelineRequest};
use crate::completed::CompletedTable;
use crate::description::{DescriptorSetDescription, PipelineDescription, SequencerConfigDesc};
use crate::pool::state::{ConstructionState, UsageState};
use crate::table::AcceleratorTable;

/// Inputs shared by every construction against one sequencer config.
pub struct ConstructionContext<B: Backend> {
    pub(crate) layout: Arc<B::Layout>,
    pub(crate) layout_dependency: DependencyToken,
    pub(crate) config: Arc<SequencerConfigDesc>,
    pub(crate) global_selectors: SelectorSet,
    pub(crate) record_binding_info: bool,
}

impl<B: Backend> ConstructionContext<B> {
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &Arc<B::Layout> {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub fn layout_dependency(&self) -> &DependencyToken {
        &self.layout_dependency
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SequencerConfigDesc {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn global_selectors(&self) -> &SelectorSet {
        &self.global_selectors
    }
}

/// One family of cached artifacts.
///
/// The trait is sealed: its table accessors name types private to this
/// crate, so only [`Pipelines`] and [`DescriptorSets`] implement it.
pub trait ArtifactKind<B: Backend>: Sized + Send + Sync + 'static {
    type Description: Hash + Eq + fmt::Debug + Send + Sync + 'static;
    type Artifact: Send + Sync + 'static;

    /// Used in log lines and misuse reports.
    const NAME: &'static str;

    fn content_hash(description: &Self::Description) -> u64;

    fn construct(
        backend: &B,
        description: &Arc<Self::Description>,
        context: &ConstructionContext<B>,
    ) -> ConstructionFuture<Self::Artifact>;

    #[doc(hidden)]
    fn table(state: &mut ConstructionState<B>) -> &mut AcceleratorTable<B, Self>;

    #[doc(hidden)]
    fn table_ref(state: &ConstructionState<B>) -> &AcceleratorTable<B, Self>;

    #[doc(hidden)]
    fn completed(usage: &UsageState<B>) -> &CompletedTable<Self::Artifact>;

    #[doc(hidden)]
    fn completed_mut(usage: &mut UsageState<B>) -> &mut CompletedTable<Self::Artifact>;
}

/// Render pipelines, specialised per sequencer config.
#[derive(Debug, Clone, Copy)]
pub enum Pipelines {}

impl<B: Backend> ArtifactKind<B> for Pipelines {
    type Description = PipelineDescription;
    type Artifact = B::Pipeline;

    const NAME: &'static str = "pipeline";

    fn content_hash(description: &PipelineDescription) -> u64 {
        description.content_hash()
    }

    fn construct(
        backend: &B,
        description: &Arc<PipelineDescription>,
        context: &ConstructionContext<B>,
    ) -> ConstructionFuture<B::Pipeline> {
        let selectors =
            layered_selectors(&context.global_selectors, description, &context.config.selectors);
        backend.create_pipeline(PipelineRequest {
            description: Arc::clone(description),
            layout: Arc::clone(&context.layout),
            layout_dependency: context.layout_dependency.clone(),
            selectors,
            technique: context.config.technique,
            target: context.config.target.clone(),
        })
    }

    fn table(state: &mut ConstructionState<B>) -> &mut AcceleratorTable<B, Self> {
        &mut state.pipelines
    }

    fn table_ref(state: &ConstructionState<B>) -> &AcceleratorTable<B, Self> {
        &state.pipelines
    }

    fn completed(usage: &UsageState<B>) -> &CompletedTable<B::Pipeline> {
        &usage.pipelines
    }

    fn completed_mut(usage: &mut UsageState<B>) -> &mut CompletedTable<B::Pipeline> {
        &mut usage.pipelines
    }
}

/// Material descriptor sets.
#[derive(Debug, Clone, Copy)]
pub enum DescriptorSets {}

impl<B: Backend> ArtifactKind<B> for DescriptorSets {
    type Description = DescriptorSetDescription;
    type Artifact = B::DescriptorSet;

    const NAME: &'static str = "descriptor set";

    fn content_hash(description: &DescriptorSetDescription) -> u64 {
        description.content_hash()
    }

    fn construct(
        backend: &B,
        description: &Arc<DescriptorSetDescription>,
        context: &ConstructionContext<B>,
    ) -> ConstructionFuture<B::DescriptorSet> {
        backend.create_descriptor_set(DescriptorSetRequest {
            description: Arc::clone(description),
            layout: Arc::clone(&context.layout),
            layout_dependency: context.layout_dependency.clone(),
            technique: context.config.technique,
            record_binding_info: context.record_binding_info,
        })
    }

    fn table(state: &mut ConstructionState<B>) -> &mut AcceleratorTable<B, Self> {
        &mut state.descriptor_sets
    }

    fn table_ref(state: &ConstructionState<B>) -> &AcceleratorTable<B, Self> {
        &state.descriptor_sets
    }

    fn completed(usage: &UsageState<B>) -> &CompletedTable<B::DescriptorSet> {
        &usage.descriptor_sets
    }

    fn completed_mut(usage: &mut UsageState<B>) -> &mut CompletedTable<B::DescriptorSet> {
        &mut usage.descriptor_sets
    }
}

/// Global < material < geometry < sequencer.
fn layered_selectors(
    global: &SelectorSet,
    description: &PipelineDescription,
    sequencer: &SelectorSet,
) -> SelectorSet {
    let mut selectors = global.clone();
    selectors.merge(description.material_selectors());
    selectors.merge(description.geometry_selectors());
    selectors.merge(sequencer);
    selectors
}
