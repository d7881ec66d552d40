//! The construction backend.
//!
//! The pool never builds GPU objects itself. Every artifact is requested
//! from a [`Backend`], which returns a boxed future resolving to the built
//! value plus the [`DependencyToken`] that should trigger a rebuild when it
//! goes stale. Backend calls are made from arbitrary threads (sometimes
//! while the pool holds its construction lock), so they must return quickly
//! and do the heavy work inside the future.

use std::sync::Arc;

use futures::future::BoxFuture;

use kiln_core::{ConstructionError, DependencyToken, SelectorSet};

use crate::description::{DescriptorSetDescription, PipelineDescription, TargetShape, TechniqueId};

/// A successfully built value and what it was built from.
#[derive(Debug, Clone)]
pub struct Constructed<T> {
    pub value: T,
    pub dependency: DependencyToken,
}

impl<T> Constructed<T> {
    #[must_use]
    pub fn new(value: T, dependency: DependencyToken) -> Self {
        Self { value, dependency }
    }

    pub(crate) fn map<U>(self, f: impl FnOnce(T) -> U) -> Constructed<U> {
        Constructed {
            value: f(self.value),
            dependency: self.dependency,
        }
    }
}

/// Future returned by every backend call.
pub type ConstructionFuture<T> = BoxFuture<'static, Result<Constructed<T>, ConstructionError>>;

/// Request for the pipeline layout shared by everything built against one
/// sequencer config.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutRequest {
    pub technique: TechniqueId,
    pub target: TargetShape,
}

/// Request for one render pipeline, specialised against a sequencer config.
pub struct PipelineRequest<L> {
    pub description: Arc<PipelineDescription>,
    pub layout: Arc<L>,
    pub layout_dependency: DependencyToken,
    /// Global, material, geometry and sequencer selectors layered in that
    /// order; later layers win.
    pub selectors: SelectorSet,
    pub technique: TechniqueId,
    pub target: TargetShape,
}

/// Request for one material descriptor set.
pub struct DescriptorSetRequest<L> {
    pub description: Arc<DescriptorSetDescription>,
    pub layout: Arc<L>,
    pub layout_dependency: DependencyToken,
    pub technique: TechniqueId,
    /// Ask the backend to keep human-readable binding information.
    pub record_binding_info: bool,
}

/// Builds the artifacts the pool caches.
pub trait Backend: Send + Sync + 'static {
    type Layout: Send + Sync + 'static;
    type Pipeline: Send + Sync + 'static;
    type DescriptorSet: Send + Sync + 'static;

    fn create_pipeline_layout(&self, request: &LayoutRequest) -> ConstructionFuture<Self::Layout>;

    fn create_pipeline(
        &self,
        request: PipelineRequest<Self::Layout>,
    ) -> ConstructionFuture<Self::Pipeline>;

    fn create_descriptor_set(
        &self,
        request: DescriptorSetRequest<Self::Layout>,
    ) -> ConstructionFuture<Self::DescriptorSet>;
}
