//! Construction Integration Tests
//!
//! Tests for:
//! - Idempotent `begin_construction`
//! - `artifact_future` never starting work
//! - Construction against every live sequencer config
//! - Selector layering and global selector changes
//! - Descriptor set construction
//! - Accelerators, configs and pools dropped mid-construction

mod common;

use std::sync::Arc;

use common::*;
use kiln::prelude::*;
use kiln::{ConstructionErrorKind, DescriptorSets, Pipelines};

// ============================================================================
// Construction Handles
// ============================================================================

#[test]
fn begin_construction_is_idempotent() {
    let (pool, backend) = new_pool();
    backend.hold();
    let config = pool.create_sequencer_config("main", config_desc("forward"));
    let accelerator = pool.create_pipeline_accelerator(pipeline_desc(&[]));

    let first = pool.begin_construction(&accelerator, &config).expect("same pool");
    let second = pool.begin_construction(&accelerator, &config).expect("same pool");
    let observed = pool
        .artifact_future(&accelerator, &config)
        .expect("same pool")
        .expect("in flight");

    assert!(first.same_construction(&second));
    assert!(first.same_construction(&observed));
    assert!(!first.is_ready());
    assert!(pool.has_current_or_future(&accelerator, &config).expect("same pool"));
    assert_eq!(pool.pending_construction_count(), 1);

    backend.release();
    let resolution = pollster::block_on(first.clone());
    pool.visibility_barrier_at_least(resolution.visible_at());

    // Harvested and current: the same construction is handed out again.
    let again = pool.begin_construction(&accelerator, &config).expect("same pool");
    assert_eq!(again.id(), first.id());
    assert!(again.is_ready());
    assert_eq!(backend.pipelines_built(), 1);
    assert_eq!(pool.pending_construction_count(), 0);
}

#[test]
fn artifact_future_does_not_restart_stale_work() {
    let settings = PoolSettings {
        hot_reload_checks_per_barrier: 0,
        ..PoolSettings::default()
    };
    let (pool, backend) = new_pool_with(settings);
    let config = pool.create_sequencer_config("main", config_desc("forward"));
    let accelerator = pool.create_pipeline_accelerator(pipeline_desc(&[]));
    let (resolution, _) = stall_for_pipeline(&pool, &accelerator, &config);

    backend.edit_patches(patches());
    pool.visibility_barrier();
    assert!(resolution.is_stale());
    assert!(!pool.has_current_or_future(&accelerator, &config).expect("same pool"));

    let stale = pool
        .artifact_future(&accelerator, &config)
        .expect("same pool")
        .expect("harvested");
    assert!(stale.peek().is_some_and(|r| r.is_stale()));
    assert_eq!(backend.pipelines_built(), 1);

    let fresh = pool.begin_construction(&accelerator, &config).expect("same pool");
    assert!(!fresh.same_construction(&stale));
    assert_eq!(backend.pipelines_built(), 2);
    assert!(!pollster::block_on(fresh).is_stale());
}

#[test]
fn later_configs_and_accelerators_get_work() {
    let (pool, _backend) = new_pool();
    let accelerator = pool.create_pipeline_accelerator(pipeline_desc(&[]));
    let config = pool.create_sequencer_config("main", config_desc("forward"));
    assert!(pool.artifact_future(&accelerator, &config).expect("same pool").is_some());

    let descriptor_set = pool.create_descriptor_set_accelerator(descriptor_set_desc(1));
    assert!(pool.artifact_future(&descriptor_set, &config).expect("same pool").is_some());
    assert_eq!(pool.pending_construction_count(), 2);

    stall_for_pipeline(&pool, &accelerator, &config);
    stall_for_descriptor_set(&pool, &descriptor_set, &config);
    assert_eq!(pool.pending_construction_count(), 0);
}

// ============================================================================
// Configs
// ============================================================================

#[test]
fn accelerator_is_built_for_every_config() {
    let (pool, backend) = new_pool();
    let accelerator = pool.create_pipeline_accelerator(pipeline_desc(&[]));
    assert_eq!(pool.pending_construction_count(), 0);

    let forward = pool.create_sequencer_config("forward", config_desc("forward"));
    let prepass = pool.create_sequencer_config(
        "prepass",
        config_desc("prepass").with_selectors(selectors(&[("DEPTH_ONLY", "1")])),
    );

    let (a, marker_a) = stall_for_pipeline(&pool, &accelerator, &forward);
    let (b, marker_b) = stall_for_pipeline(&pool, &accelerator, &prepass);
    let marker = marker_a.max(marker_b);

    assert_eq!(backend.pipelines_built(), 2);
    assert!(!Arc::ptr_eq(a.artifact().expect("built"), b.artifact().expect("built")));

    let reader = pool.lock_for_reading();
    let depth = reader.try_get_pipeline(&accelerator, &prepass, marker).expect("visible");
    assert_eq!(depth.selectors.get("DEPTH_ONLY"), Some("1"));
    let color = reader.try_get_pipeline(&accelerator, &forward, marker).expect("visible");
    assert!(!color.selectors.contains("DEPTH_ONLY"));
}

// ============================================================================
// Selectors
// ============================================================================

#[test]
fn selectors_are_layered() {
    let (pool, _backend) = new_pool();
    pool.set_global_selector("QUALITY", "high");
    pool.set_global_selector("X", "global");

    let config = pool.create_sequencer_config(
        "main",
        config_desc("forward").with_selectors(selectors(&[("Y", "sequencer")])),
    );
    let accelerator =
        pool.create_pipeline_accelerator(pipeline_desc(&[("X", "1"), ("Y", "material")]));
    let (resolution, _) = stall_for_pipeline(&pool, &accelerator, &config);

    let pipeline = resolution.artifact().expect("built");
    assert_eq!(pipeline.selectors.get("QUALITY"), Some("high"));
    assert_eq!(pipeline.selectors.get("X"), Some("1"));
    assert_eq!(pipeline.selectors.get("Y"), Some("sequencer"));
    assert_eq!(pipeline.selectors.get("GEO_HAS_POSITION"), Some("1"));
    assert_eq!(pipeline.selectors.get("GEO_HAS_TEXCOORD"), Some("1"));
    assert!(!pipeline.selectors.contains("GEO_HAS_VERTEX_ID"));
}

#[test]
fn global_selector_changes_restart_work() {
    let (pool, backend) = new_pool();
    let config = pool.create_sequencer_config("main", config_desc("forward"));
    let accelerator = pool.create_pipeline_accelerator(pipeline_desc(&[]));
    let (first, _) = stall_for_pipeline(&pool, &accelerator, &config);
    assert_eq!(backend.pipelines_built(), 1);

    pool.set_global_selector("QUALITY", "high");
    let (second, marker) = stall_for_pipeline(&pool, &accelerator, &config);
    assert_eq!(backend.pipelines_built(), 2);
    assert!(!Arc::ptr_eq(first.artifact().expect("built"), second.artifact().expect("built")));
    {
        let reader = pool.lock_for_reading();
        let pipeline = reader.try_get_pipeline(&accelerator, &config, marker).expect("visible");
        assert_eq!(pipeline.selectors.get("QUALITY"), Some("high"));
    }

    // Same value again: nothing to do.
    pool.set_global_selector("QUALITY", "high");
    assert_eq!(backend.pipelines_built(), 2);
    assert_eq!(pool.global_selectors().get("QUALITY"), Some("high"));

    assert!(pool.remove_global_selector("QUALITY"));
    let (third, _) = stall_for_pipeline(&pool, &accelerator, &config);
    assert_eq!(backend.pipelines_built(), 3);
    assert!(!third.artifact().expect("built").selectors.contains("QUALITY"));

    assert!(!pool.remove_global_selector("QUALITY"));
    assert_eq!(backend.pipelines_built(), 3);
}

// ============================================================================
// Descriptor Sets
// ============================================================================

#[test]
fn descriptor_sets_are_built_against_the_config_layout() {
    let settings = PoolSettings {
        record_binding_info: true,
        ..PoolSettings::default()
    };
    let (pool, backend) = new_pool_with(settings);
    let config = pool.create_sequencer_config("main", config_desc("forward"));
    let accelerator = pool.create_descriptor_set_accelerator(descriptor_set_desc(42));

    let (resolution, marker) = stall_for_descriptor_set(&pool, &accelerator, &config);
    assert!(resolution.is_ok());
    assert_eq!(backend.descriptor_sets_built(), 1);
    assert_eq!(pool.live_accelerator_count::<DescriptorSets>(), 1);
    assert_eq!(pool.live_accelerator_count::<Pipelines>(), 0);

    let reader = pool.lock_for_reading();
    let set = reader.try_get_descriptor_set(&accelerator, &config, marker).expect("visible");
    let layout = reader.try_get_pipeline_layout(&config, marker).expect("layout");
    assert_eq!(set.binding_count, 2);
    assert_eq!(set.layout_build, layout.build);
    assert_eq!(set.binding_info.as_deref(), Some("0,1"));
}

#[test]
fn descriptor_set_failure_is_reported() {
    let (pool, backend) = new_pool();
    backend.fail_patches(patches());
    let config = pool.create_sequencer_config("main", config_desc("forward"));
    let accelerator = pool.create_descriptor_set_accelerator(descriptor_set_desc(3));

    let (resolution, marker) = stall_for_descriptor_set(&pool, &accelerator, &config);
    let error = resolution.error().expect("failed");
    assert!(matches!(error.kind(), ConstructionErrorKind::Failed(_)));
    assert!(
        pool.lock_for_reading()
            .try_get_descriptor_set(&accelerator, &config, marker)
            .is_none()
    );
}

// ============================================================================
// Lifetimes
// ============================================================================

#[test]
fn accelerator_dropped_before_layout_resolves() {
    let (pool, backend) = new_pool();
    backend.hold();
    let config = pool.create_sequencer_config("main", config_desc("forward"));
    let accelerator = pool.create_pipeline_accelerator(pipeline_desc(&[]));
    let future = pool.begin_construction(&accelerator, &config).expect("same pool");
    drop(accelerator);

    backend.release();
    let resolution = pollster::block_on(future);
    assert!(matches!(
        resolution.error().map(|e| e.kind()),
        Some(ConstructionErrorKind::AcceleratorReleased)
    ));
    assert_eq!(backend.pipelines_built(), 0);

    pool.visibility_barrier_at_least(resolution.visible_at());
    assert_eq!(pool.records().published_artifacts, 0);
}

#[test]
fn config_dropped_while_construction_is_pending() {
    let (pool, backend) = new_pool();
    backend.hold();
    let accelerator = pool.create_pipeline_accelerator(pipeline_desc(&[]));
    let config = pool.create_sequencer_config("main", config_desc("forward"));
    let index = config.index();
    let future = pool.begin_construction(&accelerator, &config).expect("same pool");
    assert_eq!(pool.pending_construction_count(), 1);

    drop(config);
    pool.visibility_barrier();
    assert_eq!(pool.live_config_count(), 0);
    assert_eq!(pool.pending_construction_count(), 0);

    // The cancelled construction still finishes, but its result is dropped.
    backend.release();
    let cancelled = pollster::block_on(future);
    assert!(cancelled.is_ok());
    pool.visibility_barrier_at_least(cancelled.visible_at());
    assert_eq!(pool.records().published_artifacts, 0);

    let revived = pool.create_sequencer_config("main", config_desc("forward"));
    assert_eq!(revived.index(), index);
    let published = pool.published_visibility();
    assert!(
        pool.lock_for_reading()
            .try_get_pipeline(&accelerator, &revived, published)
            .is_none()
    );

    let (resolution, marker) = stall_for_pipeline(&pool, &accelerator, &revived);
    let rebuilt = visible_pipeline(&pool, &accelerator, &revived, marker).expect("visible");
    assert_ne!(Some(rebuilt), cancelled.artifact().map(|p| p.build));
    assert_eq!(resolution.artifact().map(|p| p.build), Some(rebuilt));
}

#[test]
fn pool_dropped_before_completion() {
    let (pool, backend) = new_pool();
    let config = pool.create_sequencer_config("main", config_desc("forward"));
    pollster::block_on(pool.pipeline_layout_future(&config).expect("same pool")).expect("layout");

    backend.hold();
    let accelerator = pool.create_pipeline_accelerator(pipeline_desc(&[]));
    let future = pool.begin_construction(&accelerator, &config).expect("same pool");
    drop(pool);

    backend.release();
    let resolution = pollster::block_on(future);
    assert!(resolution.visible_at().is_never());
}
