use kiln_core::{SelectorSet, fx_hash_key};

use super::ShaderPatches;
use super::state::RenderStateSet;
use super::vertex::{InputElement, geometry_selectors, input_assembly_hash};

/// Everything that identifies a render pipeline independent of the
/// sequencer config it is specialised against.
///
/// Geometry selectors are derived from the input assembly when the
/// description is built, so two descriptions with the same inputs always
/// carry the same selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDescription {
    patches: ShaderPatches,
    material_selectors: SelectorSet,
    input_assembly: Vec<InputElement>,
    topology: wgpu::PrimitiveTopology,
    render_state: RenderStateSet,
    geometry_selectors: SelectorSet,
}

impl PipelineDescription {
    #[must_use]
    pub fn new(
        patches: ShaderPatches,
        material_selectors: SelectorSet,
        input_assembly: Vec<InputElement>,
        topology: wgpu::PrimitiveTopology,
        render_state: RenderStateSet,
    ) -> Self {
        let geometry_selectors = geometry_selectors(&input_assembly);
        Self {
            patches,
            material_selectors,
            input_assembly,
            topology,
            render_state,
            geometry_selectors,
        }
    }

    #[inline]
    #[must_use]
    pub fn patches(&self) -> ShaderPatches {
        self.patches
    }

    #[inline]
    #[must_use]
    pub fn material_selectors(&self) -> &SelectorSet {
        &self.material_selectors
    }

    #[inline]
    #[must_use]
    pub fn geometry_selectors(&self) -> &SelectorSet {
        &self.geometry_selectors
    }

    #[inline]
    #[must_use]
    pub fn input_assembly(&self) -> &[InputElement] {
        &self.input_assembly
    }

    #[inline]
    #[must_use]
    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.topology
    }

    #[inline]
    #[must_use]
    pub fn render_state(&self) -> &RenderStateSet {
        &self.render_state
    }

    #[must_use]
    pub fn input_assembly_hash(&self) -> u64 {
        input_assembly_hash(&self.input_assembly)
    }

    #[must_use]
    pub fn content_hash(&self) -> u64 {
        fx_hash_key(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(selector: &str) -> PipelineDescription {
        let mut material = SelectorSet::new();
        material.set(selector, "1");
        PipelineDescription::new(
            ShaderPatches::from_source("fn main() {}"),
            material,
            vec![InputElement::new("POSITION", 0, wgpu::VertexFormat::Float32x3)],
            wgpu::PrimitiveTopology::TriangleList,
            RenderStateSet::opaque(),
        )
    }

    #[test]
    fn test_equal_descriptions_hash_equal() {
        assert_eq!(description("X").content_hash(), description("X").content_hash());
        assert_eq!(description("X"), description("X"));
        assert_ne!(description("X").content_hash(), description("Y").content_hash());
    }

    #[test]
    fn test_geometry_selectors_are_derived() {
        let desc = description("X");
        assert!(desc.geometry_selectors().contains("GEO_HAS_POSITION"));
        assert!(!desc.material_selectors().contains("GEO_HAS_POSITION"));
    }
}
