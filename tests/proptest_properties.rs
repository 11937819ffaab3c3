//! Property-based tests for the state machine, the reconciliation diff and
//! whole-run convergence.
//!
//! Uses proptest to generate lease statuses and arbitrary starting edge sets,
//! then checks that every run converges, stays put once converged, and that
//! dry-run reports exactly what a live run does.
//!
//! Run with: `cargo test --test proptest_properties`

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use lease_sync::ports::{InMemoryLeaseSource, InMemoryRelationshipStore};
use lease_sync::{
    derive_transition, plan_reconciliation, AssociationEdge, AssociationType, LeaseRecord, LeaseStatus,
    LeaseSyncConfig, LeaseSyncEngine, RunOptions, SyncReport, TenantRecord, TransitionType,
};

// =============================================================================
// Strategies
// =============================================================================

fn status_strategy() -> impl Strategy<Value = LeaseStatus> {
    prop::sample::select(LeaseStatus::ALL.to_vec())
}

fn edge_type_strategy() -> impl Strategy<Value = AssociationType> {
    prop::sample::select(vec![
        AssociationType::FutureTenant,
        AssociationType::ActiveTenant,
        AssociationType::InactiveTenant,
        AssociationType::Owner,
    ])
}

/// Arbitrary starting edge set for one pair, including "impossible" ones
/// holding several tenant types at once.
fn edge_set_strategy() -> impl Strategy<Value = BTreeSet<AssociationType>> {
    prop::collection::btree_set(edge_type_strategy(), 0..4)
}

fn edges(types: &BTreeSet<AssociationType>) -> Vec<AssociationEdge> {
    types.iter().map(|ty| AssociationEdge::new("C", "L", *ty)).collect()
}

/// Apply a plan to an in-memory edge set the way the reconciler does.
fn apply(types: &mut BTreeSet<AssociationType>, remove: &[AssociationType], add: Option<AssociationType>) {
    for ty in remove {
        types.remove(ty);
    }
    if let Some(ty) = add {
        types.insert(ty);
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

/// One lease per (status, starting edges) case. Lease `i` lands on pair
/// `i % pairs`, so `pairs < cases.len()` makes later leases revisit a pair an
/// earlier one already reconciled. A pair is seeded with the edges of the
/// first case that lands on it.
fn seeded_run(
    cases: &[(LeaseStatus, BTreeSet<AssociationType>)],
    pairs: usize,
) -> (Arc<InMemoryRelationshipStore>, LeaseSyncEngine, Vec<LeaseRecord>) {
    let store = Arc::new(InMemoryRelationshipStore::new());
    let mut work = Vec::with_capacity(cases.len());

    for (i, (status, types)) in cases.iter().enumerate() {
        let p = i % pairs;
        let email = format!("t{p}@example.com");
        let unit = format!("U{p}");
        if i < pairs {
            store.add_contact(&format!("C{p}"), &email);
            store.add_listing(&format!("LST{p}"), &unit);
            for ty in types {
                store.add_edge(&format!("C{p}"), &format!("LST{p}"), *ty);
            }
        }
        work.push(
            LeaseRecord::new(format!("L{i}"), *status)
                .with_unit(unit)
                .with_tenant(TenantRecord::new(format!("T{p}"), Some(&email), "Tenant")),
        );
    }

    let engine = LeaseSyncEngine::new(
        LeaseSyncConfig::default(),
        Arc::new(InMemoryLeaseSource::new()),
        store.clone(),
        None,
    )
    .unwrap();
    (store, engine, work)
}

fn run(engine: &LeaseSyncEngine, work: Vec<LeaseRecord>, dry_run: bool) -> SyncReport {
    runtime().block_on(engine.run_reconciliation(work, &RunOptions::new().dry_run(dry_run)))
}

// =============================================================================
// State machine
// =============================================================================

proptest! {
    /// Every status maps to exactly one outcome; only Unknown maps to none
    #[test]
    fn prop_transition_mapping_is_total(status in status_strategy()) {
        match derive_transition(status) {
            None => prop_assert_eq!(status, LeaseStatus::Unknown),
            Some(t) => {
                prop_assert!(t.target.is_tenant_class());
                let expected = match status {
                    LeaseStatus::Future => AssociationType::FutureTenant,
                    LeaseStatus::Active => AssociationType::ActiveTenant,
                    _ => AssociationType::InactiveTenant,
                };
                prop_assert_eq!(t.target, expected);
            }
        }
    }

    /// Refinement never changes the target, only the bucket
    #[test]
    fn prop_refine_keeps_target(status in status_strategy(), types in edge_set_strategy()) {
        if let Some(t) = derive_transition(status) {
            let refined = t.refine(&edges(&types));
            prop_assert_eq!(refined.target, t.target);
            if refined.kind == TransitionType::FutureToInactive {
                prop_assert!(types.contains(&AssociationType::FutureTenant));
                prop_assert!(!types.contains(&AssociationType::ActiveTenant));
            }
        }
    }
}

// =============================================================================
// Reconciliation diff
// =============================================================================

proptest! {
    /// Applying a plan converges the pair; planning again yields nothing
    #[test]
    fn prop_plan_then_replan_is_noop(status in status_strategy(), start in edge_set_strategy()) {
        let Some(t) = derive_transition(status) else { return Ok(()); };
        let t = t.refine(&edges(&start));

        let mut types = start.clone();
        let plan = plan_reconciliation(t.target, t.kind, &edges(&types));
        apply(&mut types, &plan.remove, plan.add);

        prop_assert!(types.contains(&t.target));
        prop_assert!(plan_reconciliation(t.target, t.kind, &edges(&types)).is_noop());
    }

    /// Only the transition's removable type is ever removed
    #[test]
    fn prop_plan_removes_only_removable_type(status in status_strategy(), start in edge_set_strategy()) {
        let Some(t) = derive_transition(status) else { return Ok(()); };

        let plan = plan_reconciliation(t.target, t.kind, &edges(&start));
        for ty in &plan.remove {
            prop_assert_eq!(*ty, t.kind.removable_type());
            prop_assert!(start.contains(ty));
        }
        prop_assert!(plan.write_count() <= 2);
    }

    /// An applied futureToActive leaves ACTIVE_TENANT and no FUTURE_TENANT,
    /// whatever else the pair held
    #[test]
    fn prop_future_to_active_is_monotonic(start in edge_set_strategy()) {
        let mut types = start;
        let plan = plan_reconciliation(AssociationType::ActiveTenant, TransitionType::FutureToActive, &edges(&types));
        prop_assume!(!plan.is_noop());

        apply(&mut types, &plan.remove, plan.add);
        prop_assert!(types.contains(&AssociationType::ActiveTenant));
        prop_assert!(!types.contains(&AssociationType::FutureTenant));
    }

    /// A pair already holding its target is left completely alone
    #[test]
    fn prop_target_present_means_zero_writes(status in status_strategy(), start in edge_set_strategy()) {
        let Some(t) = derive_transition(status) else { return Ok(()); };
        let mut types = start;
        types.insert(t.target);

        prop_assert!(plan_reconciliation(t.target, t.kind, &edges(&types)).is_noop());
    }
}

// =============================================================================
// Whole runs
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After one run, a second run over the same leases writes nothing
    #[test]
    fn prop_second_run_writes_nothing(
        cases in prop::collection::vec((status_strategy(), edge_set_strategy()), 1..8),
    ) {
        let (store, engine, work) = seeded_run(&cases, cases.len());

        let first = run(&engine, work.clone(), false);
        prop_assert_eq!(first.stats.errors, 0);
        let writes = store.write_count();

        let second = run(&engine, work, false);
        prop_assert_eq!(second.stats.changed(), 0);
        prop_assert_eq!(store.write_count(), writes);

        for (i, (status, _)) in cases.iter().enumerate() {
            if let Some(t) = derive_transition(*status) {
                let (contact, listing) = (format!("C{i}"), format!("LST{i}"));
                prop_assert!(store.edge_types(&contact, &listing).contains(&t.target));
            }
        }
    }

    /// Dry-run reports the same stats and per-pair plans as a live run,
    /// including when several leases in the run share a (contact, listing)
    /// pair
    #[test]
    fn prop_dry_run_matches_live(
        cases in prop::collection::vec((status_strategy(), edge_set_strategy()), 1..8),
        pairs in 1usize..4,
    ) {
        let pairs = pairs.min(cases.len());
        let (dry_store, dry_engine, work) = seeded_run(&cases, pairs);
        let (_, live_engine, _) = seeded_run(&cases, pairs);

        let dry = run(&dry_engine, work.clone(), true);
        let live = run(&live_engine, work, false);

        prop_assert_eq!(dry_store.write_count(), 0);
        prop_assert_eq!(dry.stats, live.stats);
        prop_assert_eq!(dry.outcomes.len(), live.outcomes.len());
        for (d, l) in dry.outcomes.iter().zip(&live.outcomes) {
            prop_assert_eq!(&d.disposition, &l.disposition);
            let d_plans: Vec<_> = d.pairs.iter().map(|p| (p.outcome.removed.clone(), p.outcome.added)).collect();
            let l_plans: Vec<_> = l.pairs.iter().map(|p| (p.outcome.removed.clone(), p.outcome.added)).collect();
            prop_assert_eq!(d_plans, l_plans);
        }
    }
}
