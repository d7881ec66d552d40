use kiln_core::{SelectorSet, fx_hash_key};

/// One vertex input the pipeline consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElement {
    /// Semantic name, e.g. `POSITION`, `TEXCOORD`.
    pub semantic: String,
    pub semantic_index: u32,
    pub format: wgpu::VertexFormat,
    pub input_slot: u32,
    pub step_mode: wgpu::VertexStepMode,
}

impl InputElement {
    /// Per-vertex element in input slot 0.
    #[must_use]
    pub fn new(
        semantic: impl Into<String>,
        semantic_index: u32,
        format: wgpu::VertexFormat,
    ) -> Self {
        Self {
            semantic: semantic.into(),
            semantic_index,
            format,
            input_slot: 0,
            step_mode: wgpu::VertexStepMode::Vertex,
        }
    }

    #[must_use]
    pub fn in_slot(mut self, input_slot: u32) -> Self {
        self.input_slot = input_slot;
        self
    }

    #[must_use]
    pub fn per_instance(mut self) -> Self {
        self.step_mode = wgpu::VertexStepMode::Instance;
        self
    }

    /// Selector name advertising this element to the shader,
    /// e.g. `GEO_HAS_TEXCOORD` / `GEO_HAS_TEXCOORD1`.
    #[must_use]
    pub fn selector_name(&self) -> String {
        let semantic = self.semantic.to_ascii_uppercase();
        if self.semantic_index == 0 {
            format!("GEO_HAS_{semantic}")
        } else {
            format!("GEO_HAS_{semantic}{}", self.semantic_index)
        }
    }
}

/// Derives the `GEO_HAS_*` selectors for an input assembly.
///
/// Elements are visited by semantic ascending, then semantic index
/// descending. An empty input assembly means the shader generates geometry
/// from the vertex id, advertised as `GEO_HAS_VERTEX_ID`.
#[must_use]
pub fn geometry_selectors(input_assembly: &[InputElement]) -> SelectorSet {
    let mut selectors = SelectorSet::with_capacity(input_assembly.len().max(1));

    if input_assembly.is_empty() {
        selectors.set("GEO_HAS_VERTEX_ID", "1");
        return selectors;
    }

    let mut ordered: Vec<&InputElement> = input_assembly.iter().collect();
    ordered.sort_by(|a, b| {
        a.semantic
            .cmp(&b.semantic)
            .then_with(|| b.semantic_index.cmp(&a.semantic_index))
    });

    for element in ordered {
        selectors.set(&element.selector_name(), "1");
    }
    selectors
}

/// Order-sensitive hash of an input assembly.
#[must_use]
pub fn input_assembly_hash(input_assembly: &[InputElement]) -> u64 {
    fx_hash_key(input_assembly)
}
