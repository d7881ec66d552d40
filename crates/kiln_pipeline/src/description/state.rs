//! Hashable render state.
//!
//! `wgpu` state descriptors (`BlendState`, `DepthBiasState`, ...) do not
//! implement `Hash` / `Eq` because some fields are floats. The mirrors here
//! keep exactly the fields that affect pipeline identity and store floats as
//! raw bits, so a [`RenderStateSet`] can sit inside a pipeline description.

use std::hash::BuildHasher;

/// Hashable mirror of `wgpu::BlendComponent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponentKey {
    pub src_factor: wgpu::BlendFactor,
    pub dst_factor: wgpu::BlendFactor,
    pub operation: wgpu::BlendOperation,
}

impl From<wgpu::BlendComponent> for BlendComponentKey {
    fn from(b: wgpu::BlendComponent) -> Self {
        Self {
            src_factor: b.src_factor,
            dst_factor: b.dst_factor,
            operation: b.operation,
        }
    }
}

impl BlendComponentKey {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::BlendComponent {
        wgpu::BlendComponent {
            src_factor: self.src_factor,
            dst_factor: self.dst_factor,
            operation: self.operation,
        }
    }
}

/// Hashable mirror of `wgpu::BlendState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateKey {
    pub color: BlendComponentKey,
    pub alpha: BlendComponentKey,
}

impl From<wgpu::BlendState> for BlendStateKey {
    fn from(b: wgpu::BlendState) -> Self {
        Self {
            color: b.color.into(),
            alpha: b.alpha.into(),
        }
    }
}

impl BlendStateKey {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::BlendState {
        wgpu::BlendState {
            color: self.color.to_wgpu(),
            alpha: self.alpha.to_wgpu(),
        }
    }
}

/// Hashable mirror of `wgpu::DepthBiasState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepthBiasKey {
    pub constant: i32,
    pub slope_scale_bits: u32,
    pub clamp_bits: u32,
}

impl From<wgpu::DepthBiasState> for DepthBiasKey {
    fn from(b: wgpu::DepthBiasState) -> Self {
        Self {
            constant: b.constant,
            slope_scale_bits: b.slope_scale.to_bits(),
            clamp_bits: b.clamp.to_bits(),
        }
    }
}

impl DepthBiasKey {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::DepthBiasState {
        wgpu::DepthBiasState {
            constant: self.constant,
            slope_scale: f32::from_bits(self.slope_scale_bits),
            clamp: f32::from_bits(self.clamp_bits),
        }
    }
}

/// Material-level render state: everything about a draw's fixed-function
/// configuration that is independent of the render target it lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderStateSet {
    pub blend: Option<BlendStateKey>,
    /// `wgpu::ColorWrites` bits.
    pub write_mask: u32,
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub depth_bias: DepthBiasKey,
    pub alpha_to_coverage: bool,
}

impl Default for RenderStateSet {
    fn default() -> Self {
        Self::opaque()
    }
}

impl RenderStateSet {
    /// Back-face culled, depth-tested and depth-written, no blending.
    #[must_use]
    pub fn opaque() -> Self {
        Self {
            blend: None,
            write_mask: wgpu::ColorWrites::ALL.bits(),
            cull_mode: Some(wgpu::Face::Back),
            front_face: wgpu::FrontFace::Ccw,
            depth_write: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            depth_bias: DepthBiasKey::default(),
            alpha_to_coverage: false,
        }
    }

    /// Premultiplied-free alpha blending with depth writes disabled.
    #[must_use]
    pub fn alpha_blended() -> Self {
        Self {
            blend: Some(wgpu::BlendState::ALPHA_BLENDING.into()),
            depth_write: false,
            ..Self::opaque()
        }
    }

    #[must_use]
    pub fn double_sided(mut self) -> Self {
        self.cull_mode = None;
        self
    }

    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        rustc_hash::FxBuildHasher.hash_one(self)
    }
}
