use smallvec::SmallVec;

use kiln_core::fx_hash_key;

use super::ShaderPatches;

/// Opaque id of a GPU resource (texture, buffer view) owned by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// Hashable sampler description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerKey {
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub address_mode_w: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::MipmapFilterMode,
    pub compare: Option<wgpu::CompareFunction>,
    pub anisotropy_clamp: u16,
}

impl Default for SamplerKey {
    fn default() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            compare: None,
            anisotropy_clamp: 1,
        }
    }
}

impl SamplerKey {
    #[must_use]
    pub fn clamped() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Self::default()
        }
    }
}

/// What a material binding slot holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingValue {
    Resource(ResourceId),
    Sampler(SamplerKey),
    /// Raw bytes of a uniform constant.
    Constant(SmallVec<[u8; 16]>),
}

impl BindingValue {
    /// Encodes a plain-old-data constant.
    #[must_use]
    pub fn constant<T: bytemuck::Pod>(value: &T) -> Self {
        Self::Constant(SmallVec::from_slice(bytemuck::bytes_of(value)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialBinding {
    pub slot: u32,
    pub value: BindingValue,
}

impl MaterialBinding {
    #[must_use]
    pub fn new(slot: u32, value: BindingValue) -> Self {
        Self { slot, value }
    }
}

/// Everything that identifies a material descriptor set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorSetDescription {
    patches: ShaderPatches,
    bindings: Vec<MaterialBinding>,
    deform_binding: Option<u64>,
}

impl DescriptorSetDescription {
    #[must_use]
    pub fn new(patches: ShaderPatches, bindings: Vec<MaterialBinding>) -> Self {
        Self {
            patches,
            bindings,
            deform_binding: None,
        }
    }

    /// Attaches the hash of the deformer's binding layout (skinning, morph
    /// targets) this descriptor set must be compatible with.
    #[must_use]
    pub fn with_deform_binding(mut self, deform_binding_hash: u64) -> Self {
        self.deform_binding = Some(deform_binding_hash);
        self
    }

    #[inline]
    #[must_use]
    pub fn patches(&self) -> ShaderPatches {
        self.patches
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &[MaterialBinding] {
        &self.bindings
    }

    #[inline]
    #[must_use]
    pub fn deform_binding(&self) -> Option<u64> {
        self.deform_binding
    }

    #[must_use]
    pub fn content_hash(&self) -> u64 {
        fx_hash_key(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_encoding() {
        let value = BindingValue::constant(&[1.0f32, 0.5, 0.25, 1.0]);
        let BindingValue::Constant(bytes) = &value else {
            panic!("expected constant");
        };
        assert_eq!(bytes.len(), 16);
        assert_eq!(value, BindingValue::constant(&[1.0f32, 0.5, 0.25, 1.0]));
    }

    #[test]
    fn test_bindings_and_deform_affect_identity() {
        let patches = ShaderPatches::from_source("material");
        let base = DescriptorSetDescription::new(
            patches,
            vec![
                MaterialBinding::new(0, BindingValue::Resource(ResourceId(7))),
                MaterialBinding::new(1, BindingValue::Sampler(SamplerKey::default())),
            ],
        );
        let clamped = DescriptorSetDescription::new(
            patches,
            vec![
                MaterialBinding::new(0, BindingValue::Resource(ResourceId(7))),
                MaterialBinding::new(1, BindingValue::Sampler(SamplerKey::clamped())),
            ],
        );

        assert_ne!(base.content_hash(), clamped.content_hash());
        assert_ne!(base, base.clone().with_deform_binding(42));
        assert_eq!(base.content_hash(), base.clone().content_hash());
    }
}
