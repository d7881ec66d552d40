//! Hot-reload sweeps.
//!
//! The amortized sweep walks the flattened `(accelerator slot, live config)`
//! space of both artifact kinds with a rotating cursor, checking at most
//! `hot_reload_checks_per_barrier` pairs per barrier. A pair is restarted
//! when nothing is in flight for it and its harvested result was built from
//! a dependency that has since gone stale.

use crate::backend::Backend;
use crate::kind::{ArtifactKind, DescriptorSets, Pipelines};

use super::PoolInner;
use super::state::ConstructionState;

impl<B: Backend> PoolInner<B> {
    /// Returns the number of constructions restarted.
    pub(super) fn sweep(&self, state: &mut ConstructionState<B>) -> usize {
        let budget = self.settings.hot_reload_checks_per_barrier as u64;
        let configs = state.live_config_indices();
        let config_count = configs.len() as u64;
        let pipeline_slots = state.pipelines.slots.len() as u64;
        let descriptor_set_slots = state.descriptor_sets.slots.len() as u64;
        let total = config_count * (pipeline_slots + descriptor_set_slots);
        if budget == 0 || total == 0 {
            return 0;
        }

        let mut cursor = state.sweep_cursor % total;
        let mut restarted = 0;
        for _ in 0..budget.min(total) {
            let config_index = configs[(cursor % config_count) as usize];
            let flat_slot = cursor / config_count;
            cursor = (cursor + 1) % total;

            let rebuilt = if flat_slot < pipeline_slots {
                self.rebuild_if_out_of_date::<Pipelines>(state, flat_slot as u32, config_index)
            } else {
                let slot = (flat_slot - pipeline_slots) as u32;
                self.rebuild_if_out_of_date::<DescriptorSets>(state, slot, config_index)
            };
            restarted += usize::from(rebuilt);
        }

        state.sweep_cursor = cursor;
        restarted
    }

    /// Checks every pair. Returns the number of constructions restarted.
    pub(super) fn rebuild_all_out_of_date(&self, state: &mut ConstructionState<B>) -> usize {
        let mut restarted = 0;
        for config_index in state.live_config_indices() {
            restarted += self.rebuild_kind_out_of_date::<Pipelines>(state, config_index);
            restarted += self.rebuild_kind_out_of_date::<DescriptorSets>(state, config_index);
        }
        if restarted > 0 {
            log::info!(
                "{}: restarted {restarted} out-of-date constructions",
                self.settings.display_label()
            );
        }
        restarted
    }

    fn rebuild_kind_out_of_date<K: ArtifactKind<B>>(
        &self,
        state: &mut ConstructionState<B>,
        config_index: u32,
    ) -> usize {
        let slots: Vec<u32> = K::table(state).live_slots().collect();
        slots
            .into_iter()
            .filter(|&slot| self.rebuild_if_out_of_date::<K>(state, slot, config_index))
            .count()
    }

    fn rebuild_if_out_of_date<K: ArtifactKind<B>>(
        &self,
        state: &mut ConstructionState<B>,
        slot: u32,
        config_index: u32,
    ) -> bool {
        let out_of_date = K::table(state).slots.get(slot as usize).is_some_and(|accelerator| {
            accelerator.is_alive()
                && accelerator
                    .construction(config_index)
                    .is_some_and(|c| c.is_out_of_date())
        });
        if out_of_date {
            log::info!(
                "{} in slot {slot} is out of date for sequencer config {config_index}; rebuilding",
                K::NAME
            );
            self.start_construction::<K>(state, slot, config_index);
        }
        out_of_date
    }
}
