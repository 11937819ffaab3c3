// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Dry-run then live reconciliation over in-memory ports.
//!
//! Demonstrates:
//! 1. Seeding a small lease portfolio and relationship graph
//! 2. A dry run that reports decisions without writing
//! 3. A live run applying the same decisions
//! 4. A second live run showing nothing left to do
//! 5. Displaying the captured metrics
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=lease_sync=debug cargo run --example dry_run
//! ```

use std::sync::Arc;

use lease_sync::ports::{InMemoryLeaseSource, InMemoryRelationshipStore, TracingObserver};
use lease_sync::{
    AssociationType, LeaseRecord, LeaseStatus, LeaseSyncConfig, LeaseSyncEngine, RunOptions, SyncReport, TenantRecord,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lease_sync=info")))
        .with_target(false)
        .compact()
        .init();

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Seed the source and the graph
    // ─────────────────────────────────────────────────────────────────────────
    let source = Arc::new(InMemoryLeaseSource::new());
    let store = Arc::new(InMemoryRelationshipStore::new());

    let portfolio = [
        ("L-100", LeaseStatus::Active, "U-1", "alice@example.com", Some(AssociationType::FutureTenant)),
        ("L-101", LeaseStatus::Terminated, "U-2", "bob@example.com", Some(AssociationType::ActiveTenant)),
        ("L-102", LeaseStatus::Expired, "U-3", "carol@example.com", Some(AssociationType::FutureTenant)),
        ("L-103", LeaseStatus::Future, "U-4", "dave@example.com", None),
        ("L-104", LeaseStatus::Active, "U-5", "erin@example.com", Some(AssociationType::ActiveTenant)),
        ("L-105", LeaseStatus::Unknown, "U-6", "frank@example.com", None),
    ];

    for (i, (lease_id, status, unit, email, edge)) in portfolio.iter().enumerate() {
        let contact = format!("C-{i}");
        let listing = format!("LST-{unit}");
        store.add_contact(&contact, email);
        store.add_listing(&listing, unit);
        if let Some(ty) = edge {
            store.add_edge(&contact, &listing, *ty);
        }
        source.add_lease(
            LeaseRecord::new(*lease_id, *status)
                .with_unit(*unit)
                .with_tenant(TenantRecord::new(format!("T-{i}"), Some(*email), format!("Tenant {i}")))
                .with_last_updated(1_700_000_000_000 + i as i64),
        );
    }

    let engine = LeaseSyncEngine::new(
        LeaseSyncConfig::default(),
        source.clone(),
        store.clone(),
        Some(Arc::new(TracingObserver)),
    )?;

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Dry run
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n── Dry run ──");
    let dry = engine.sync_since(0, None, &RunOptions::new().dry_run(true)).await?;
    print_report(&dry);
    println!("   writes issued: {}", store.write_count());

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Live run
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n── Live run ──");
    let live = engine.sync_since(0, None, &RunOptions::new()).await?;
    print_report(&live);
    println!("   writes issued: {}", store.write_count());
    assert_eq!(dry.stats, live.stats);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Converged
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n── Second live run ──");
    let again = engine.sync_since(0, None, &RunOptions::new()).await?;
    print_report(&again);

    println!("\n── Metrics ──");
    dump_metrics(&snapshotter);

    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("   run {} (dry_run={})", report.run_id, report.dry_run);
    println!("   {}", report.stats);
    for outcome in &report.outcomes {
        let plans: Vec<String> = outcome
            .pairs
            .iter()
            .filter(|p| p.outcome.applied)
            .map(|p| format!("-{:?} +{:?}", p.outcome.removed, p.outcome.added))
            .collect();
        println!("   └─ {} {:?} {}", outcome.lease_id, outcome.disposition, plans.join(" "));
    }
    if let Some(checkpoint) = report.next_checkpoint {
        println!("   next checkpoint: {checkpoint}");
    }
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        let rendered = match value {
            DebugValue::Counter(v) => v.to_string(),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => format!("count={}", samples.len()),
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }

    lines.sort();
    for line in &lines {
        println!("   └─ {line}");
    }
}
