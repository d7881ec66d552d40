//! Starting constructions and handling their completion.

use std::sync::Arc;

use futures::FutureExt;
use futures::task::SpawnExt;

use kiln_core::{ConstructionError, ConstructionErrorKind, VisibilityMarker};

use crate::accelerator::{Accelerator, AcceleratorId};
use crate::backend::{Backend, Constructed, ConstructionFuture, LayoutRequest};
use crate::config::{SequencerConfig, SequencerConfigId};
use crate::description::SequencerConfigDesc;
use crate::future::{ArtifactFuture, ArtifactResolution, ConstructionId};
use crate::kind::{ArtifactKind, ConstructionContext, DescriptorSets, Pipelines};
use crate::table::{Completion, Lookup};

use super::PoolInner;
use super::state::{ConfigSlot, ConstructionState, LayoutDependency};

/// Where a finished construction reports back to.
struct CompletionTarget<A> {
    completions: flume::Sender<Completion<A>>,
    slot: u32,
    accelerator: AcceleratorId,
    config_index: u32,
    construction: ConstructionId,
}

impl<A> Clone for CompletionTarget<A> {
    fn clone(&self) -> Self {
        Self {
            completions: self.completions.clone(),
            slot: self.slot,
            accelerator: self.accelerator,
            config_index: self.config_index,
            construction: self.construction,
        }
    }
}

impl<A> CompletionTarget<A> {
    fn send(&self, resolution: &Arc<ArtifactResolution<A>>) {
        let completion = Completion {
            slot: self.slot,
            accelerator: self.accelerator,
            config_index: self.config_index,
            construction: self.construction,
            resolution: Arc::clone(resolution),
        };
        if self.completions.send(completion).is_err() {
            log::error!("completion channel closed; construction {:?} dropped", self.construction);
        }
    }
}

fn layout_failure(err: &ConstructionError) -> ConstructionError {
    let failure = ConstructionError::missing_dependency(format!("pipeline layout: {err}"));
    match err.dependency() {
        Some(dependency) => failure.with_dependency(dependency.clone()),
        None => failure,
    }
}

impl<B: Backend> PoolInner<B> {
    // ========================================================================
    // Accelerators & Configs
    // ========================================================================

    pub(super) fn create_accelerator<K: ArtifactKind<B>>(
        &self,
        description: K::Description,
    ) -> Arc<Accelerator<B, K>> {
        let hash = K::content_hash(&description);
        let mut state = self.construction.lock();

        let table = K::table(&mut state);
        let accelerator = match table.find(hash, &description) {
            Lookup::Live(accelerator) => return accelerator,
            Lookup::Expired(index) => table.rebind(self.guid, index, Arc::new(description)),
            Lookup::Missing => table.insert(self.guid, hash, Arc::new(description)),
        };

        let configs = state.live_config_indices();
        log::debug!(
            "{}: new {} accelerator in slot {} ({} configs to build)",
            self.settings.display_label(),
            K::NAME,
            accelerator.slot(),
            configs.len()
        );
        for config_index in configs {
            self.start_construction::<K>(&mut state, accelerator.slot(), config_index);
        }
        accelerator
    }

    pub(super) fn create_sequencer_config(
        &self,
        name: &str,
        desc: SequencerConfigDesc,
    ) -> Arc<SequencerConfig> {
        let hash = desc.content_hash();
        let mut state = self.construction.lock();

        let index = match state.find_config(hash, &desc) {
            Some(index) => {
                let slot = &mut state.configs[index as usize];
                if let Some(config) = slot.weak.upgrade() {
                    config.merge_name(name);
                    return config;
                }
                // Expired: same index, fresh layout.
                slot.layout = Some(self.request_layout(&slot.desc));
                state.free_configs.retain(|&free| free != index);
                index
            }
            None => {
                let desc = Arc::new(desc);
                let slot = ConfigSlot {
                    hash,
                    layout: Some(self.request_layout(&desc)),
                    desc,
                    weak: std::sync::Weak::new(),
                    released: false,
                };
                let index = match state.free_configs.pop() {
                    Some(index) => {
                        let previous = std::mem::replace(&mut state.configs[index as usize], slot);
                        state.forget_config(previous.hash, index);
                        index
                    }
                    None => {
                        state.configs.push(slot);
                        state.configs.len() as u32 - 1
                    }
                };
                state.config_lookup.entry(hash).or_default().push(index);
                index
            }
        };

        let slot = &mut state.configs[index as usize];
        let config = Arc::new(SequencerConfig::new(
            SequencerConfigId::new(self.guid, index),
            Arc::clone(&slot.desc),
            name,
        ));
        slot.weak = Arc::downgrade(&config);
        slot.released = false;

        log::debug!(
            "{}: sequencer config {index} ({name}) created",
            self.settings.display_label()
        );
        self.construct_missing::<Pipelines>(&mut state, index);
        self.construct_missing::<DescriptorSets>(&mut state, index);
        config
    }

    pub(super) fn request_layout(&self, desc: &SequencerConfigDesc) -> LayoutDependency<B::Layout> {
        let request = LayoutRequest {
            technique: desc.technique,
            target: desc.target.clone(),
        };
        let future = self
            .backend
            .create_pipeline_layout(&request)
            .map(|result| result.map(|constructed| constructed.map(Arc::new)))
            .boxed()
            .shared();

        // Drive the layout even when nothing is waiting on it yet, so the
        // barrier can capture it.
        if let Err(err) = self.executor.spawn(future.clone().map(|_| ())) {
            log::error!("could not schedule pipeline layout construction: {err}");
            let failure =
                ConstructionError::new(ConstructionErrorKind::Unscheduled(err.to_string()));
            return LayoutDependency::new(futures::future::ready(Err(failure)).boxed().shared());
        }
        LayoutDependency::new(future)
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Starts constructions for every live accelerator of kind `K` that has
    /// nothing current or in flight for `config_index`.
    pub(super) fn construct_missing<K: ArtifactKind<B>>(
        &self,
        state: &mut ConstructionState<B>,
        config_index: u32,
    ) {
        let table = K::table(state);
        let missing: Vec<u32> = table
            .live_slots()
            .filter(|&slot| {
                !table.slots[slot as usize]
                    .construction(config_index)
                    .is_some_and(|c| c.has_current_or_future())
            })
            .collect();

        for slot in missing {
            self.start_construction::<K>(state, slot, config_index);
        }
    }

    /// Restarts every live accelerator of kind `K` against `config_index`.
    pub(super) fn restart_config<K: ArtifactKind<B>>(
        &self,
        state: &mut ConstructionState<B>,
        config_index: u32,
    ) {
        let slots: Vec<u32> = K::table(state).live_slots().collect();
        for slot in slots {
            self.start_construction::<K>(state, slot, config_index);
        }
    }

    /// Restarts every `(accelerator, config)` pair of both kinds.
    pub(super) fn restart_all(&self, state: &mut ConstructionState<B>) {
        for config_index in state.live_config_indices() {
            self.restart_config::<Pipelines>(state, config_index);
            self.restart_config::<DescriptorSets>(state, config_index);
        }
    }

    pub(super) fn begin_construction<K: ArtifactKind<B>>(
        &self,
        state: &mut ConstructionState<B>,
        slot: u32,
        config_index: u32,
    ) -> ArtifactFuture<K::Artifact> {
        let construction = K::table(state).slots[slot as usize].construction_mut(config_index);
        if let Some(pending) = &construction.pending {
            return pending.clone();
        }
        if let Some(current) = &construction.current
            && !current.resolution.is_stale()
        {
            return current.future.clone();
        }
        self.start_construction::<K>(state, slot, config_index)
    }

    /// Starts a new construction of `slot` against `config_index`, replacing
    /// whatever was pending. The previous artifact stays published until the
    /// new one is harvested.
    pub(super) fn start_construction<K: ArtifactKind<B>>(
        &self,
        state: &mut ConstructionState<B>,
        slot: u32,
        config_index: u32,
    ) -> ArtifactFuture<K::Artifact> {
        let id = state.next_construction_id();
        let config = &state.configs[config_index as usize];
        let layout = config.layout_future();
        let config_desc = Arc::clone(&config.desc);
        let global_selectors = state.global_selectors.clone();
        let record_binding_info = self.settings.record_binding_info;

        let table = K::table(state);
        let accelerator_slot = &table.slots[slot as usize];
        let target = CompletionTarget {
            completions: table.completions_tx.clone(),
            slot,
            accelerator: accelerator_slot.id,
            config_index,
            construction: id,
        };

        let work: ConstructionFuture<K::Artifact> = if let (Some(Ok(resolved)), Some(description)) =
            (layout.peek(), accelerator_slot.description.as_ref())
        {
            // Layout already built: call the backend inline.
            let context = ConstructionContext {
                layout: Arc::clone(&resolved.value),
                layout_dependency: resolved.dependency.clone(),
                config: config_desc,
                global_selectors,
                record_binding_info,
            };
            K::construct(&self.backend, description, &context)
        } else {
            let backend = Arc::clone(&self.backend);
            let accelerator = accelerator_slot.weak.clone();
            async move {
                let layout = layout.await.map_err(|err| layout_failure(&err))?;
                let Some(accelerator) = accelerator.upgrade() else {
                    return Err(ConstructionError::new(ConstructionErrorKind::AcceleratorReleased));
                };
                let context = ConstructionContext {
                    layout: layout.value,
                    layout_dependency: layout.dependency,
                    config: config_desc,
                    global_selectors,
                    record_binding_info,
                };
                let work = K::construct(&backend, accelerator.description(), &context);
                drop(accelerator);
                work.await
            }
            .boxed()
        };

        let future = self.spawn_construction(id, work, target);
        K::table(state).slots[slot as usize]
            .construction_mut(config_index)
            .pending = Some(future.clone());
        future
    }

    fn spawn_construction<A: Send + Sync + 'static>(
        &self,
        id: ConstructionId,
        work: ConstructionFuture<A>,
        target: CompletionTarget<A>,
    ) -> ArtifactFuture<A> {
        let pool = self.self_ref.clone();
        let fallback = target.clone();
        let (sender, receiver) = futures::channel::oneshot::channel();

        let task = async move {
            let result = work.await.map(|constructed| constructed.map(Arc::new));
            let resolution = match pool.upgrade() {
                Some(pool) => pool.complete(&target, result),
                None => Arc::new(ArtifactResolution::new(result, VisibilityMarker::NEVER)),
            };
            let _ = sender.send(resolution);
        };

        match self.executor.spawn(task) {
            Ok(()) => ArtifactFuture::new(
                id,
                receiver
                    .map(|received| {
                        received.unwrap_or_else(|_| {
                            Arc::new(ArtifactResolution::new(
                                Err(ConstructionError::new(ConstructionErrorKind::Unscheduled(
                                    "construction task was dropped by the executor".into(),
                                ))),
                                VisibilityMarker::NEVER,
                            ))
                        })
                    })
                    .boxed(),
            ),
            Err(err) => {
                log::error!("could not schedule construction {id:?}: {err}");
                // Caller holds the construction lock.
                let resolution = Arc::new(ArtifactResolution::new(
                    Err(ConstructionError::new(ConstructionErrorKind::Unscheduled(
                        err.to_string(),
                    ))),
                    self.published_marker().next(),
                ));
                fallback.send(&resolution);
                ArtifactFuture::ready(id, resolution)
            }
        }
    }

    /// Reports a finished construction. The visibility marker is computed
    /// and the completion queued under the construction lock, so the next
    /// barrier to publish is exactly the one that harvests it.
    fn complete<A>(
        &self,
        target: &CompletionTarget<A>,
        result: Result<Constructed<Arc<A>>, ConstructionError>,
    ) -> Arc<ArtifactResolution<A>> {
        let _state = self.construction.lock();
        let resolution = Arc::new(ArtifactResolution::new(result, self.published_marker().next()));
        target.send(&resolution);
        resolution
    }
}
