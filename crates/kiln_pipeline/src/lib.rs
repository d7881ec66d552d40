//! Pipeline and descriptor-set accelerators for the Kiln pipeline cache.
//!
//! - [`description`]: hashable descriptions of what to build
//! - [`Backend`]: the collaborator that actually builds GPU objects
//! - [`Accelerator`]: a deduplicated description bound to its artifacts
//! - [`SequencerConfig`]: a rendering context artifacts are specialised for
//! - [`AcceleratorPool`]: dedup tables, background construction and the
//!   visibility barrier
//! - [`ReadingLock`]: lock-free per-frame artifact lookups

pub mod accelerator;
pub mod backend;
pub mod config;
pub mod description;
pub mod future;
pub mod kind;
pub mod records;
pub mod settings;

mod completed;
mod pool;
mod table;

pub use accelerator::{Accelerator, AcceleratorId, DescriptorSetAccelerator, PipelineAccelerator};
pub use backend::{
    Backend, Constructed, ConstructionFuture, DescriptorSetRequest, LayoutRequest, PipelineRequest,
};
pub use config::{SequencerConfig, SequencerConfigId};
pub use future::{ArtifactFuture, ArtifactResolution, ConstructionId, LayoutFuture};
pub use kind::{ArtifactKind, ConstructionContext, DescriptorSets, Pipelines};
pub use pool::{AcceleratorPool, Executor, ReadingLock};
pub use records::{ConfigRecord, PipelineRecord, PoolRecords};
pub use settings::PoolSettings;
