//! Public types for the run controller.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fetch::SafetyLimit;
use crate::lifecycle::TransitionType;
use crate::reconcile::ReconcileOutcome;
use crate::scope::ProcessingScope;

/// How a run bounds the amount of work it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPolicy {
    /// Process the whole work set
    #[default]
    Unlimited,
    /// Truncate the work set to this many leases before iterating
    Examined(usize),
    /// Stop once this many leases have actually changed
    Changed(usize),
}

/// Per-run options supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub scope: ProcessingScope,
    pub limit: LimitPolicy,
    /// Fill the listing cache with batched lookups before iterating.
    ///
    /// Covers every in-scope lease with a known status. Under
    /// [`LimitPolicy::Changed`] the run may stop before reaching some of
    /// them, so a few listings can be fetched and never used.
    pub prefetch_listings: bool,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ProcessingScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: LimitPolicy) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn prefetch_listings(mut self, prefetch: bool) -> Self {
        self.prefetch_listings = prefetch;
        self
    }
}

/// Counters accumulated over one run.
///
/// The transition counters and `errors` are the headline numbers; the rest
/// explain where the other leases went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub future_to_active: u64,
    pub active_to_inactive: u64,
    pub future_to_inactive: u64,
    pub errors: u64,
    /// Leases skipped for a resolution miss
    pub skipped: u64,
    /// Leases whose pairs were all already converged
    pub unchanged: u64,
    pub edges_removed: u64,
    pub edges_added: u64,
}

impl SyncStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&mut self, transition: TransitionType) {
        match transition {
            TransitionType::FutureToActive => self.future_to_active += 1,
            TransitionType::ActiveToInactive => self.active_to_inactive += 1,
            TransitionType::FutureToInactive => self.future_to_inactive += 1,
        }
    }

    #[must_use]
    pub fn transition_count(&self, transition: TransitionType) -> u64 {
        match transition {
            TransitionType::FutureToActive => self.future_to_active,
            TransitionType::ActiveToInactive => self.active_to_inactive,
            TransitionType::FutureToInactive => self.future_to_inactive,
        }
    }

    /// Leases that produced at least one association change.
    #[must_use]
    pub fn changed(&self) -> u64 {
        self.future_to_active + self.active_to_inactive + self.future_to_inactive
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }

    pub fn merge(&mut self, other: &SyncStats) {
        self.future_to_active += other.future_to_active;
        self.active_to_inactive += other.active_to_inactive;
        self.future_to_inactive += other.future_to_inactive;
        self.errors += other.errors;
        self.skipped += other.skipped;
        self.unchanged += other.unchanged;
        self.edges_removed += other.edges_removed;
        self.edges_added += other.edges_added;
    }
}

impl std::fmt::Display for SyncStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "futureToActive={} activeToInactive={} futureToInactive={} errors={} skipped={} unchanged={}",
            self.future_to_active,
            self.active_to_inactive,
            self.future_to_inactive,
            self.errors,
            self.skipped,
            self.unchanged
        )
    }
}

/// Reconciliation of one (contact, listing) pair within a lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairOutcome {
    pub contact_id: String,
    pub listing_id: String,
    pub outcome: ReconcileOutcome,
}

/// What happened to one lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum LeaseDisposition {
    /// At least one pair was (or in dry-run, would be) rewritten
    Changed { transition: TransitionType },
    Unchanged,
    /// Status not interpreted; nothing counted
    Ignored,
    Skipped { reason: String },
    Failed { kind: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaseOutcome {
    pub lease_id: String,
    pub unit_id: Option<String>,
    #[serde(flatten)]
    pub disposition: LeaseDisposition,
    pub pairs: Vec<PairOutcome>,
}

/// Everything a caller needs after a run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub stats: SyncStats,
    /// Leases in the work set as handed to the run
    pub fetched: usize,
    /// Leases the loop actually looked at
    pub examined: usize,
    /// Safety ceiling that cut the fetch short, if any
    pub fetch_limit: Option<SafetyLimit>,
    /// Largest `last_updated` in the work set; persist it to resume
    pub next_checkpoint: Option<i64>,
    pub duration_ms: u64,
    pub outcomes: Vec<LeaseOutcome>,
}

impl SyncReport {
    /// Outcome recorded for a lease id.
    #[must_use]
    pub fn outcome(&self, lease_id: &str) -> Option<&LeaseOutcome> {
        self.outcomes.iter().find(|o| o.lease_id == lease_id)
    }
}
