//! Descriptions
//!
//! Cheap, hashable values describing what to build. A description is the
//! dedup key of an accelerator: two descriptions that compare equal are
//! always interchangeable.
//!
//! - [`PipelineDescription`]: shader patches, material selectors, input
//!   assembly, topology and render state
//! - [`DescriptorSetDescription`]: shader patches, material bindings and an
//!   optional deform binding
//! - [`SequencerConfigDesc`]: technique, selectors and target shape of a
//!   rendering context

mod descriptor_set;
mod pipeline;
mod state;
mod target;
mod vertex;

use serde::Serialize;

use kiln_core::source_hash;

pub use descriptor_set::{
    BindingValue, DescriptorSetDescription, MaterialBinding, ResourceId, SamplerKey,
};
pub use pipeline::PipelineDescription;
pub use state::{BlendComponentKey, BlendStateKey, DepthBiasKey, RenderStateSet};
pub use target::{SequencerConfigDesc, TargetShape, TechniqueId};
pub use vertex::{InputElement, geometry_selectors, input_assembly_hash};

/// Identity of a compiled collection of shader patches.
///
/// The backend owns compilation; the cache only needs a stable value that
/// changes whenever the patch sources change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct ShaderPatches(u64);

impl ShaderPatches {
    #[must_use]
    pub fn from_source(source: &str) -> Self {
        Self(source_hash(source))
    }

    #[must_use]
    pub const fn from_hash(hash: u64) -> Self {
        Self(hash)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}
