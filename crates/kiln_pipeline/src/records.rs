//! Debugging snapshots of a pool's contents.

use serde::Serialize;

use kiln_core::VisibilityMarker;

use crate::backend::Backend;
use crate::description::{ShaderPatches, TechniqueId};
use crate::pool::state::{ConstructionState, UsageState};
use crate::settings::PoolSettings;

/// Selectors per line in rendered selector text.
const SELECTORS_PER_LINE: usize = 4;

/// One live pipeline accelerator.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRecord {
    pub slot: u32,
    pub shader_patches: ShaderPatches,
    pub material_selectors: String,
    pub geometry_selectors: String,
    pub input_assembly_hash: u64,
    pub topology: String,
    pub render_state_hash: u64,
    /// Sequencer configs this accelerator has a published pipeline for.
    pub published_configs: usize,
}

/// One live sequencer config.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigRecord {
    pub index: u32,
    pub name: String,
    pub technique: TechniqueId,
    pub selectors: String,
    pub target_relevance: u64,
    pub layout_ready: bool,
}

/// Snapshot of a pool, for debugging displays and logs.
#[derive(Debug, Clone, Serialize)]
pub struct PoolRecords {
    pub label: Option<String>,
    pub guid: u32,
    pub published: VisibilityMarker,
    pub pipelines: Vec<PipelineRecord>,
    pub configs: Vec<ConfigRecord>,
    pub descriptor_set_count: usize,
    pub pending_constructions: usize,
    pub published_artifacts: usize,
    /// Published artifacts still waiting for a hot-reload rebuild.
    pub stale_artifacts: usize,
}

impl PoolRecords {
    pub(crate) fn collect<B: Backend>(
        settings: &PoolSettings,
        guid: u32,
        published: VisibilityMarker,
        usage: &UsageState<B>,
        state: &ConstructionState<B>,
    ) -> Self {
        let config_count = state.configs.len() as u32;

        let pipelines = state
            .pipelines
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_alive())
            .filter_map(|(index, slot)| {
                let index = index as u32;
                let description = slot.description.as_ref()?;
                Some(PipelineRecord {
                    slot: index,
                    shader_patches: description.patches(),
                    material_selectors: description
                        .material_selectors()
                        .to_display_string(SELECTORS_PER_LINE),
                    geometry_selectors: description
                        .geometry_selectors()
                        .to_display_string(SELECTORS_PER_LINE),
                    input_assembly_hash: description.input_assembly_hash(),
                    topology: format!("{:?}", description.topology()),
                    render_state_hash: description.render_state().compute_hash(),
                    published_configs: (0..config_count)
                        .filter(|&config| usage.pipelines.entry(index, config).is_some())
                        .count(),
                })
            })
            .collect();

        let configs = state
            .configs
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let config = slot.weak.upgrade().filter(|_| !slot.released)?;
                Some(ConfigRecord {
                    index: index as u32,
                    name: config.name(),
                    technique: slot.desc.technique,
                    selectors: slot.desc.selectors.to_display_string(SELECTORS_PER_LINE),
                    target_relevance: slot.desc.target.relevance_hash(),
                    layout_ready: slot.is_layout_ready(),
                })
            })
            .collect();

        Self {
            label: settings.label.clone(),
            guid,
            published,
            pipelines,
            configs,
            descriptor_set_count: state.descriptor_sets.live_count(),
            pending_constructions: state.pipelines.pending_count()
                + state.descriptor_sets.pending_count(),
            published_artifacts: usage.pipelines.published_count()
                + usage.descriptor_sets.published_count(),
            stale_artifacts: usage.pipelines.stale_count() + usage.descriptor_sets.stale_count(),
        }
    }
}
