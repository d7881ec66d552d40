//! Shared fixtures for the integration tests.
//!
//! [`MockBackend`] builds plain structs instead of GPU objects and lets a
//! test script what happens to each construction:
//!
//! - failures per shader patch collection
//! - a gate holding every construction started after [`MockBackend::hold`]
//! - a latch blocking the next synchronous backend call
//! - dependency tokens per shader patch collection and for layouts

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::Shared;
use parking_lot::Mutex;

use kiln::prelude::*;
use kiln::{
    ArtifactResolution, BindingValue, Constructed, ConstructionError, ConstructionFuture,
    DescriptorSetAccelerator, DescriptorSetRequest, LayoutRequest, MaterialBinding,
    PipelineAccelerator, PipelineRequest, ResourceId,
};

pub const SHADER_SOURCE: &str = "fn vs_main() {} fn fs_main() {}";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Artifacts
// ============================================================================

#[derive(Debug)]
pub struct MockLayout {
    pub build: u64,
    pub technique: TechniqueId,
    alive: Arc<AtomicU64>,
}

impl Drop for MockLayout {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct MockPipeline {
    pub build: u64,
    pub patches: ShaderPatches,
    pub selectors: SelectorSet,
    pub layout_build: u64,
}

#[derive(Debug)]
pub struct MockDescriptorSet {
    pub build: u64,
    pub binding_count: usize,
    pub layout_build: u64,
    pub binding_info: Option<String>,
}

// ============================================================================
// Backend
// ============================================================================

type Gate = Shared<oneshot::Receiver<()>>;

#[derive(Default)]
struct Script {
    failing: Vec<ShaderPatches>,
    failing_layouts: bool,
    patch_tokens: Vec<(ShaderPatches, DependencyToken)>,
    layout_token: Option<DependencyToken>,
    gate: Option<(oneshot::Sender<()>, Gate)>,
    latch: Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>,
}

impl Script {
    fn patch_token(&mut self, patches: ShaderPatches) -> DependencyToken {
        if let Some((_, token)) = self.patch_tokens.iter().find(|(p, _)| *p == patches) {
            return token.clone();
        }
        let token = DependencyToken::new();
        self.patch_tokens.push((patches, token.clone()));
        token
    }

    fn layout_token(&mut self) -> DependencyToken {
        self.layout_token.get_or_insert_with(DependencyToken::new).clone()
    }
}

#[derive(Default)]
pub struct MockBackend {
    script: Mutex<Script>,
    next_build: AtomicU64,
    layouts_built: AtomicU64,
    layouts_alive: Arc<AtomicU64>,
    pipelines_built: AtomicU64,
    descriptor_sets_built: AtomicU64,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layouts_built(&self) -> u64 {
        self.layouts_built.load(Ordering::SeqCst)
    }

    /// Layouts built and not yet dropped by anyone.
    pub fn layouts_alive(&self) -> u64 {
        self.layouts_alive.load(Ordering::SeqCst)
    }

    pub fn pipelines_built(&self) -> u64 {
        self.pipelines_built.load(Ordering::SeqCst)
    }

    pub fn descriptor_sets_built(&self) -> u64 {
        self.descriptor_sets_built.load(Ordering::SeqCst)
    }

    /// Constructions of `patches` started from now on fail.
    pub fn fail_patches(&self, patches: ShaderPatches) {
        self.script.lock().failing.push(patches);
    }

    pub fn heal_patches(&self, patches: ShaderPatches) {
        self.script.lock().failing.retain(|p| *p != patches);
    }

    pub fn fail_layouts(&self, fail: bool) {
        self.script.lock().failing_layouts = fail;
    }

    /// Marks everything built from `patches` stale, like a shader edit.
    pub fn edit_patches(&self, patches: ShaderPatches) {
        let mut script = self.script.lock();
        let token = script.patch_token(patches);
        script.patch_tokens.retain(|(p, _)| *p != patches);
        token.invalidate();
    }

    /// Marks every pipeline layout stale.
    pub fn edit_layouts(&self) {
        if let Some(token) = self.script.lock().layout_token.take() {
            token.invalidate();
        }
    }

    /// Constructions started from now on wait until [`Self::release`].
    pub fn hold(&self) {
        let (sender, receiver) = oneshot::channel();
        self.script.lock().gate = Some((sender, receiver.shared()));
    }

    pub fn release(&self) {
        if let Some((sender, _)) = self.script.lock().gate.take() {
            let _ = sender.send(());
        }
    }

    /// The next synchronous pipeline call blocks until the returned sender
    /// fires. The receiver reports once the call has been entered.
    pub fn block_next_call(&self) -> (mpsc::Sender<()>, mpsc::Receiver<()>) {
        let (release_tx, release_rx) = mpsc::channel();
        let (entered_tx, entered_rx) = mpsc::channel();
        self.script.lock().latch = Some((entered_tx, release_rx));
        (release_tx, entered_rx)
    }

    fn next_build(&self) -> u64 {
        self.next_build.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn gate(&self) -> Option<Gate> {
        self.script.lock().gate.as_ref().map(|(_, gate)| gate.clone())
    }

    fn finish<T: Send + 'static>(
        gate: Option<Gate>,
        result: Result<Constructed<T>, ConstructionError>,
    ) -> ConstructionFuture<T> {
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            result
        }
        .boxed()
    }
}

impl Backend for MockBackend {
    type Layout = MockLayout;
    type Pipeline = MockPipeline;
    type DescriptorSet = MockDescriptorSet;

    fn create_pipeline_layout(&self, request: &LayoutRequest) -> ConstructionFuture<MockLayout> {
        self.layouts_built.fetch_add(1, Ordering::SeqCst);
        let (failing, token) = {
            let mut script = self.script.lock();
            (script.failing_layouts, script.layout_token())
        };
        let result = if failing {
            Err(ConstructionError::failed("layout rejected").with_dependency(token))
        } else {
            self.layouts_alive.fetch_add(1, Ordering::SeqCst);
            let layout = MockLayout {
                build: self.next_build(),
                technique: request.technique,
                alive: Arc::clone(&self.layouts_alive),
            };
            Ok(Constructed::new(layout, token))
        };
        Self::finish(self.gate(), result)
    }

    fn create_pipeline(
        &self,
        request: PipelineRequest<MockLayout>,
    ) -> ConstructionFuture<MockPipeline> {
        let latch = self.script.lock().latch.take();
        if let Some((entered, release)) = latch {
            let _ = entered.send(());
            let _ = release.recv();
        }

        self.pipelines_built.fetch_add(1, Ordering::SeqCst);
        let patches = request.description.patches();
        let (failing, token) = {
            let mut script = self.script.lock();
            (script.failing.contains(&patches), script.patch_token(patches))
        };
        let dependency =
            DependencyToken::with_dependencies([token, request.layout_dependency.clone()]);
        let result = if failing {
            Err(ConstructionError::failed("shader compilation failed").with_dependency(dependency))
        } else {
            let pipeline = MockPipeline {
                build: self.next_build(),
                patches,
                selectors: request.selectors,
                layout_build: request.layout.build,
            };
            Ok(Constructed::new(pipeline, dependency))
        };
        Self::finish(self.gate(), result)
    }

    fn create_descriptor_set(
        &self,
        request: DescriptorSetRequest<MockLayout>,
    ) -> ConstructionFuture<MockDescriptorSet> {
        self.descriptor_sets_built.fetch_add(1, Ordering::SeqCst);
        let patches = request.description.patches();
        let (failing, token) = {
            let mut script = self.script.lock();
            (script.failing.contains(&patches), script.patch_token(patches))
        };
        let dependency =
            DependencyToken::with_dependencies([token, request.layout_dependency.clone()]);
        let result = if failing {
            Err(ConstructionError::failed("descriptor set rejected").with_dependency(dependency))
        } else {
            let bindings = request.description.bindings();
            let set = MockDescriptorSet {
                build: self.next_build(),
                binding_count: bindings.len(),
                layout_build: request.layout.build,
                binding_info: request.record_binding_info.then(|| {
                    bindings.iter().map(|b| b.slot.to_string()).collect::<Vec<_>>().join(",")
                }),
            };
            Ok(Constructed::new(set, dependency))
        };
        Self::finish(self.gate(), result)
    }
}

// ============================================================================
// Pools & Descriptions
// ============================================================================

pub fn new_pool() -> (AcceleratorPool<MockBackend>, Arc<MockBackend>) {
    new_pool_with(PoolSettings::default())
}

pub fn new_pool_with(settings: PoolSettings) -> (AcceleratorPool<MockBackend>, Arc<MockBackend>) {
    init_logger();
    let backend = Arc::new(MockBackend::new());
    let pool = AcceleratorPool::new(Arc::clone(&backend), settings).expect("thread pool");
    (pool, backend)
}

pub fn patches() -> ShaderPatches {
    ShaderPatches::from_source(SHADER_SOURCE)
}

pub fn selectors(pairs: &[(&str, &str)]) -> SelectorSet {
    SelectorSet::from(pairs)
}

pub fn pipeline_desc_with(
    patches: ShaderPatches,
    material: &[(&str, &str)],
) -> PipelineDescription {
    PipelineDescription::new(
        patches,
        selectors(material),
        vec![
            InputElement::new("position", 0, wgpu::VertexFormat::Float32x3),
            InputElement::new("normal", 0, wgpu::VertexFormat::Float32x3),
            InputElement::new("texcoord", 0, wgpu::VertexFormat::Float32x2),
        ],
        wgpu::PrimitiveTopology::TriangleList,
        RenderStateSet::opaque(),
    )
}

pub fn pipeline_desc(material: &[(&str, &str)]) -> PipelineDescription {
    pipeline_desc_with(patches(), material)
}

pub fn config_desc(technique: &str) -> SequencerConfigDesc {
    SequencerConfigDesc::new(
        TechniqueId::from_name(technique),
        TargetShape::new(&[wgpu::TextureFormat::Rgba8UnormSrgb])
            .with_depth(wgpu::TextureFormat::Depth32Float),
    )
}

pub fn descriptor_set_desc(resource: u64) -> DescriptorSetDescription {
    DescriptorSetDescription::new(
        patches(),
        vec![
            MaterialBinding::new(0, BindingValue::Resource(ResourceId(resource))),
            MaterialBinding::new(1, BindingValue::constant(&[1.0f32, 0.5, 0.25, 1.0])),
        ],
    )
}

// ============================================================================
// Stalling
// ============================================================================

/// Waits for the construction of `accelerator` against `config` and
/// advances visibility until its result is published.
pub fn stall_for_pipeline(
    pool: &AcceleratorPool<MockBackend>,
    accelerator: &PipelineAccelerator<MockBackend>,
    config: &SequencerConfig,
) -> (Arc<ArtifactResolution<MockPipeline>>, VisibilityMarker) {
    let future = pool.begin_construction(accelerator, config).expect("same pool");
    let resolution = pollster::block_on(future);
    let marker = pool.visibility_barrier_at_least(resolution.visible_at());
    (resolution, marker)
}

pub fn stall_for_descriptor_set(
    pool: &AcceleratorPool<MockBackend>,
    accelerator: &DescriptorSetAccelerator<MockBackend>,
    config: &SequencerConfig,
) -> (Arc<ArtifactResolution<MockDescriptorSet>>, VisibilityMarker) {
    let future = pool.begin_construction(accelerator, config).expect("same pool");
    let resolution = pollster::block_on(future);
    let marker = pool.visibility_barrier_at_least(resolution.visible_at());
    (resolution, marker)
}

/// Polls `condition` until it holds or a second has passed. Executor tasks
/// drop their captures shortly after the future they drive resolves.
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Build number of the pipeline visible at `marker`, if any.
pub fn visible_pipeline(
    pool: &AcceleratorPool<MockBackend>,
    accelerator: &PipelineAccelerator<MockBackend>,
    config: &SequencerConfig,
    marker: VisibilityMarker,
) -> Option<u64> {
    let reader = pool.lock_for_reading();
    reader.try_get_pipeline(accelerator, config, marker).map(|p| p.build)
}
