//! # Kiln
//!
//! A deduplicating, asynchronously-constructed cache of render pipelines and
//! descriptor sets, with a visibility-barrier protocol that lets a render
//! thread read finished artifacts every frame without waiting on
//! construction.
//!
//! This umbrella crate re-exports the member crates:
//!
//! - [`kiln_core`]: selectors, dependency tokens, visibility markers, errors
//! - [`kiln_pipeline`]: descriptions, the backend trait, accelerators and the
//!   pool
//!
//! ```rust,ignore
//! use kiln::prelude::*;
//!
//! let pool = AcceleratorPool::new(MyBackend::new(device), PoolSettings::default())?;
//! let forward = pool.create_sequencer_config("forward", config_desc);
//! let accelerator = pool.create_pipeline_accelerator(pipeline_desc);
//!
//! let marker = pool.visibility_barrier();
//! let reader = pool.lock_for_reading();
//! if let Some(pipeline) = reader.try_get_pipeline(&accelerator, &forward, marker) {
//!     // record draw
//! }
//! ```

pub use kiln_core;
pub use kiln_pipeline;

pub use kiln_core::{
    ConstructionError, ConstructionErrorKind, DependencyToken, PoolError, Result, SelectorSet,
    VisibilityMarker,
};
pub use kiln_pipeline::description::{
    BindingValue, DescriptorSetDescription, InputElement, MaterialBinding, PipelineDescription,
    RenderStateSet, ResourceId, SamplerKey, SequencerConfigDesc, ShaderPatches, TargetShape,
    TechniqueId,
};
pub use kiln_pipeline::{
    Accelerator, AcceleratorPool, ArtifactFuture, ArtifactKind, ArtifactResolution, Backend,
    Constructed, ConstructionFuture, DescriptorSetAccelerator, DescriptorSetRequest,
    DescriptorSets, LayoutRequest, PipelineAccelerator, PipelineRequest, Pipelines, PoolRecords,
    PoolSettings, ReadingLock, SequencerConfig,
};

/// Everything a typical renderer integration needs.
pub mod prelude {
    pub use kiln_core::{DependencyToken, SelectorSet, VisibilityMarker};
    pub use kiln_pipeline::description::{
        DescriptorSetDescription, InputElement, PipelineDescription, RenderStateSet,
        SequencerConfigDesc, ShaderPatches, TargetShape, TechniqueId,
    };
    pub use kiln_pipeline::{AcceleratorPool, Backend, PoolSettings, ReadingLock, SequencerConfig};
}
