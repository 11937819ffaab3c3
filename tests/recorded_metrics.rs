//! Recorded metric values for a reconciliation run.
//!
//! Each test installs a thread-local `DebuggingRecorder` and drives the run
//! on a current-thread runtime so every metric lands on that recorder.
//!
//! Run with: `cargo test --test recorded_metrics`

use std::sync::Arc;

use lease_sync::ports::{InMemoryLeaseSource, InMemoryRelationshipStore};
use lease_sync::{
    AssociationType, LeaseRecord, LeaseStatus, LeaseSyncConfig, LeaseSyncEngine, RunOptions, TenantRecord,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

fn counter(snapshotter: &Snapshotter, name: &str, label: (&str, &str)) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, _, _, _)| {
            let key = key.key();
            key.name() == name && key.labels().any(|l| l.key() == label.0 && l.value() == label.1)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => v,
            _ => 0,
        })
        .sum()
}

fn engine_with(store: Arc<InMemoryRelationshipStore>) -> LeaseSyncEngine {
    LeaseSyncEngine::new(LeaseSyncConfig::default(), Arc::new(InMemoryLeaseSource::new()), store, None).unwrap()
}

fn active_lease(id: &str, unit: &str, email: &str) -> LeaseRecord {
    LeaseRecord::new(id, LeaseStatus::Active)
        .with_unit(unit)
        .with_tenant(TenantRecord::new(format!("T-{id}"), Some(email), "Tenant"))
}

fn run_recorded(engine: &LeaseSyncEngine, work: Vec<LeaseRecord>, options: RunOptions) -> Snapshotter {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(engine.run_reconciliation(work, &options));
    });
    snapshotter
}

#[test]
fn test_transition_and_outcome_counters() {
    let store = Arc::new(InMemoryRelationshipStore::new());
    store.add_contact("C-1", "a@example.com");
    store.add_listing("LST-1", "U1");
    store.add_edge("C-1", "LST-1", AssociationType::FutureTenant);

    let engine = engine_with(store);
    let work = vec![
        active_lease("L-1", "U1", "a@example.com"),
        active_lease("L-2", "U-missing", "a@example.com"),
    ];
    let snapshotter = run_recorded(&engine, work, RunOptions::new());

    assert_eq!(counter(&snapshotter, "lease_sync_transitions_total", ("transition", "futureToActive")), 1);
    assert_eq!(counter(&snapshotter, "lease_sync_leases_total", ("outcome", "changed")), 1);
    assert_eq!(counter(&snapshotter, "lease_sync_leases_total", ("outcome", "skipped")), 1);
    assert_eq!(counter(&snapshotter, "lease_sync_edge_writes_total", ("dry_run", "false")), 2);
}

#[test]
fn test_dry_run_writes_are_labelled() {
    let store = Arc::new(InMemoryRelationshipStore::new());
    store.add_contact("C-1", "a@example.com");
    store.add_listing("LST-1", "U1");
    store.add_edge("C-1", "LST-1", AssociationType::FutureTenant);

    let engine = engine_with(store.clone());
    let snapshotter = run_recorded(
        &engine,
        vec![active_lease("L-1", "U1", "a@example.com")],
        RunOptions::new().dry_run(true),
    );

    assert_eq!(counter(&snapshotter, "lease_sync_edge_writes_total", ("dry_run", "true")), 2);
    assert_eq!(counter(&snapshotter, "lease_sync_edge_writes_total", ("dry_run", "false")), 0);
    assert_eq!(store.write_count(), 0);
}

#[test]
fn test_listing_cache_hits_are_counted() {
    let store = Arc::new(InMemoryRelationshipStore::new());
    store.add_contact("C-1", "a@example.com");
    store.add_contact("C-2", "b@example.com");
    store.add_listing("LST-1", "U1");

    let engine = engine_with(store);
    let work = vec![
        active_lease("L-1", "U1", "a@example.com"),
        active_lease("L-2", "U1", "b@example.com"),
        active_lease("L-3", "U1", "a@example.com"),
    ];
    let snapshotter = run_recorded(&engine, work, RunOptions::new());

    assert_eq!(counter(&snapshotter, "lease_sync_listing_cache_total", ("result", "miss")), 1);
    assert_eq!(counter(&snapshotter, "lease_sync_listing_cache_total", ("result", "hit")), 2);
}
