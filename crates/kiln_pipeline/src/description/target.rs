use serde::Serialize;
use smallvec::SmallVec;

use kiln_core::{SelectorSet, fx_hash_key, hash_combine, source_hash};

/// Identifies the technique (shader family / pass delegate) a sequencer
/// config renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct TechniqueId(pub u64);

impl TechniqueId {
    /// Stable id derived from a technique name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(source_hash(name))
    }
}

/// The shape of the render target a sequencer config draws into.
///
/// Only the parts that change how a pipeline must be built are recorded:
/// attachment formats, sample count and the subpass position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetShape {
    pub color_formats: SmallVec<[wgpu::TextureFormat; 4]>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
    pub subpass_index: u32,
    pub subpass_count: u32,
}

impl Default for TargetShape {
    fn default() -> Self {
        Self {
            color_formats: SmallVec::new(),
            depth_format: None,
            sample_count: 1,
            subpass_index: 0,
            subpass_count: 1,
        }
    }
}

impl TargetShape {
    #[must_use]
    pub fn new(color_formats: &[wgpu::TextureFormat]) -> Self {
        Self {
            color_formats: SmallVec::from_slice(color_formats),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_depth(mut self, format: wgpu::TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    #[must_use]
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    #[must_use]
    pub fn with_subpass(mut self, subpass_index: u32, subpass_count: u32) -> Self {
        self.subpass_index = subpass_index;
        self.subpass_count = subpass_count;
        self
    }

    /// Hash of everything in the shape that affects pipeline construction.
    #[must_use]
    pub fn relevance_hash(&self) -> u64 {
        fx_hash_key(self)
    }
}

/// Everything that identifies a sequencer config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SequencerConfigDesc {
    pub technique: TechniqueId,
    pub selectors: SelectorSet,
    pub target: TargetShape,
}

impl SequencerConfigDesc {
    #[must_use]
    pub fn new(technique: TechniqueId, target: TargetShape) -> Self {
        Self {
            technique,
            selectors: SelectorSet::new(),
            target,
        }
    }

    #[must_use]
    pub fn with_selectors(mut self, selectors: SelectorSet) -> Self {
        self.selectors = selectors;
        self
    }

    /// Dedup key: technique, then selectors, then target relevance.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let hash = hash_combine(self.technique.0, 0);
        let hash = hash_combine(self.selectors.compute_hash(), hash);
        hash_combine(self.target.relevance_hash(), hash)
    }
}
