//! The visibility barrier.
//!
//! Each barrier publishes one new [`VisibilityMarker`] and, while holding
//! both locks:
//!
//! 1. captures freshly built pipeline layouts, rebuilds stale ones and
//!    releases the artifacts of expired sequencer configs;
//! 2. releases expired accelerators and binds recycled slots to their new
//!    owners;
//! 3. runs the amortized hot-reload sweep (skipped when a layout rebuild
//!    already restarted work this frame);
//! 4. harvests every construction that finished since the previous barrier
//!    and publishes its result under the new marker.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use smallvec::SmallVec;

use kiln_core::VisibilityMarker;

use crate::backend::Backend;
use crate::completed::{CompletedEntry, PublishedLayout};
use crate::kind::{ArtifactKind, DescriptorSets, Pipelines};
use crate::table::Harvested;

use super::PoolInner;
use super::state::{ConstructionState, UsageState};

#[derive(Debug, Default)]
pub(super) struct BarrierStats {
    pub configs_released: usize,
    pub layouts_rebuilt: usize,
    pub accelerators_released: usize,
    pub restarted: usize,
    pub published: usize,
    pub failed: usize,
    pub discarded: usize,
}

impl<B: Backend> PoolInner<B> {
    pub(super) fn visibility_barrier(&self, expected: VisibilityMarker) -> VisibilityMarker {
        let current = self.published_marker();
        if current >= expected {
            return current;
        }

        let mut usage = self.usage.write();
        let mut state = self.construction.lock();

        let marker = self.published_marker().next();
        self.published.store(marker.raw(), Ordering::Release);

        let mut stats = BarrierStats::default();
        let invalidated = self.update_configs(&mut usage, &mut state, marker, &mut stats);
        self.update_accelerators::<Pipelines>(&mut usage, &mut state, &mut stats);
        self.update_accelerators::<DescriptorSets>(&mut usage, &mut state, &mut stats);

        if !invalidated {
            stats.restarted += self.sweep(&mut state);
        }

        self.harvest::<Pipelines>(&mut usage, &mut state, marker, &mut stats);
        self.harvest::<DescriptorSets>(&mut usage, &mut state, marker, &mut stats);

        log::debug!(
            "{}: barrier {} published {} ({} failed, {} discarded), restarted {}, \
             rebuilt {} layouts, released {} configs / {} accelerators",
            self.settings.display_label(),
            marker.raw(),
            stats.published,
            stats.failed,
            stats.discarded,
            stats.restarted,
            stats.layouts_rebuilt,
            stats.configs_released,
            stats.accelerators_released,
        );
        marker
    }

    /// Returns `true` when a config's layout was rebuilt, which restarts
    /// every accelerator against it.
    fn update_configs(
        &self,
        usage: &mut UsageState<B>,
        state: &mut ConstructionState<B>,
        marker: VisibilityMarker,
        stats: &mut BarrierStats,
    ) -> bool {
        let mut invalidated = false;

        for index in 0..state.configs.len() as u32 {
            let slot = &mut state.configs[index as usize];
            if slot.released {
                continue;
            }

            if slot.weak.strong_count() == 0 {
                slot.release();
                usage.clear_config(index);
                state.pipelines.clear_config(index);
                state.descriptor_sets.clear_config(index);
                state.free_configs.push(index);
                stats.configs_released += 1;
                log::info!("{}: sequencer config {index} released", self.settings.display_label());
                continue;
            }

            let Some(dependency) = slot.layout.as_mut() else {
                continue;
            };
            match dependency.capture() {
                Some(Ok(layout)) => usage.publish_layout(
                    index,
                    PublishedLayout {
                        layout,
                        visible_from: marker,
                    },
                ),
                Some(Err(err)) => {
                    log::warn!("pipeline layout for sequencer config {index} failed: {err}");
                }
                None => {}
            }

            if dependency.is_stale() {
                log::info!(
                    "pipeline layout for sequencer config {index} is out of date; rebuilding"
                );
                slot.layout = Some(self.request_layout(&slot.desc));
                self.restart_config::<Pipelines>(state, index);
                self.restart_config::<DescriptorSets>(state, index);
                stats.layouts_rebuilt += 1;
                invalidated = true;
            }
        }

        invalidated
    }

    fn update_accelerators<K: ArtifactKind<B>>(
        &self,
        usage: &mut UsageState<B>,
        state: &mut ConstructionState<B>,
        stats: &mut BarrierStats,
    ) {
        let table = K::table(state);
        let completed = K::completed_mut(usage);

        for index in 0..table.slots.len() as u32 {
            let slot = &table.slots[index as usize];
            if slot.released {
                continue;
            }
            if slot.weak.strong_count() == 0 {
                completed.unbind(index);
                table.release(index);
                stats.accelerators_released += 1;
            } else {
                completed.bind(index, slot.id);
            }
        }
    }

    fn harvest<K: ArtifactKind<B>>(
        &self,
        usage: &mut UsageState<B>,
        state: &mut ConstructionState<B>,
        marker: VisibilityMarker,
        stats: &mut BarrierStats,
    ) {
        let live_configs: SmallVec<[bool; 16]> =
            state.configs.iter().map(|c| c.is_alive()).collect();
        let completions = K::table(state).completions_rx.clone();
        let mut restarts: SmallVec<[(u32, u32); 4]> = SmallVec::new();

        for completion in completions.try_iter() {
            let config_index = completion.config_index;
            let slot = match K::table(state).slots.get_mut(completion.slot as usize) {
                Some(slot) if slot.id == completion.accelerator && slot.is_alive() => slot,
                _ => {
                    stats.discarded += 1;
                    continue;
                }
            };
            if !live_configs.get(config_index as usize).copied().unwrap_or(false) {
                stats.discarded += 1;
                continue;
            }

            let construction = slot.construction_mut(config_index);
            let Some(future) = construction
                .pending
                .take_if(|pending| pending.id() == completion.construction)
            else {
                // Superseded by a restart.
                stats.discarded += 1;
                continue;
            };
            construction.current = Some(Harvested {
                future,
                resolution: Arc::clone(&completion.resolution),
            });

            let completed = K::completed_mut(usage);
            match completion.resolution.result() {
                Ok(constructed) => {
                    completed.publish(
                        completion.slot,
                        config_index,
                        CompletedEntry {
                            artifact: Arc::clone(&constructed.value),
                            visible_from: marker,
                            dependency: constructed.dependency.clone(),
                        },
                    );
                    stats.published += 1;
                }
                Err(err) => {
                    completed.clear_entry(completion.slot, config_index);
                    log::warn!(
                        "{} construction failed (slot {}, sequencer config {config_index}): {err}",
                        K::NAME,
                        completion.slot
                    );
                    stats.failed += 1;
                    if err.is_stale() {
                        restarts.push((completion.slot, config_index));
                    }
                }
            }
        }

        for (slot, config_index) in restarts {
            self.start_construction::<K>(state, slot, config_index);
            stats.restarted += 1;
        }
    }
}
