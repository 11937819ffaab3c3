//! The per-lease loop.
//!
//! Shared state during a run is the listing cache, the dry-run edge overlay
//! and the stats accumulator, all owned by the loop. Leases are processed
//! sequentially, so none of them needs locking.

use std::time::Instant;

use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::association::ContactEntity;
use crate::error::{LeaseError, ResolutionMiss};
use crate::lease::LeaseRecord;
use crate::lifecycle::{derive_transition, Transition, TransitionType};
use crate::metrics;
use crate::reconcile::{PlannedEdges, ReconcileOutcome};
use crate::resolve::ListingCache;
use crate::scope::{assert_in_scope, ProcessingScope, ScopeCheck};

use super::types::{LeaseDisposition, LeaseOutcome, LimitPolicy, PairOutcome, RunOptions, SyncReport, SyncStats};
use super::LeaseSyncEngine;

/// A lease that failed, with the pairs it had already reconciled.
struct LeaseFailure {
    error: LeaseError,
    pairs: Vec<PairOutcome>,
}

impl From<LeaseError> for LeaseFailure {
    fn from(error: LeaseError) -> Self {
        Self { error, pairs: Vec::new() }
    }
}

impl From<ResolutionMiss> for LeaseFailure {
    fn from(miss: ResolutionMiss) -> Self {
        LeaseError::from(miss).into()
    }
}

impl LeaseSyncEngine {
    /// Reconcile every lease of `work_set` and return the run's report.
    ///
    /// Never fails: per-lease problems are counted in `stats.errors` or
    /// `stats.skipped` and the loop continues.
    #[tracing::instrument(skip(self, work_set, options), fields(run_id, leases = work_set.len(), dry_run))]
    pub async fn run_reconciliation(&self, work_set: Vec<LeaseRecord>, options: &RunOptions) -> SyncReport {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let dry_run = options.dry_run || self.config.dry_run;
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        tracing::Span::current().record("dry_run", dry_run);

        let fetched = work_set.len();
        let next_checkpoint = work_set.iter().map(|l| l.last_updated).max();
        let mut leases = work_set;
        if let LimitPolicy::Examined(max) = options.limit {
            leases.truncate(max);
        }
        metrics::set_work_set_size(leases.len());

        info!(leases = leases.len(), fetched, limit = ?options.limit, "Starting reconciliation run");
        self.observer.event(
            "run_started",
            &json!({ "run_id": run_id.to_string(), "leases": leases.len(), "dry_run": dry_run }),
        );

        let mut cache = ListingCache::new();
        let mut planned = PlannedEdges::new();
        if options.prefetch_listings {
            // Leases the loop would ignore or reject never resolve a listing.
            let units: Vec<String> = leases
                .iter()
                .filter(|l| derive_transition(l.status).is_some())
                .filter(|l| assert_in_scope(l, &options.scope).is_ok())
                .filter_map(|l| l.unit().map(str::to_string))
                .collect();
            match self.resolver.resolve_listings_by_unit_ids(&units, &mut cache).await {
                Ok(found) => debug!(units = units.len(), found, "Prefetched listings"),
                Err(err) => warn!(error = %err, "Listing prefetch failed, continuing with per-lease lookups"),
            }
        }

        let mut stats = SyncStats::new();
        let mut outcomes = Vec::with_capacity(leases.len());
        let mut examined = 0;

        for lease in &leases {
            if let LimitPolicy::Changed(target) = options.limit {
                if stats.changed() >= target as u64 {
                    info!(changed = stats.changed(), "Change limit reached, stopping run");
                    break;
                }
            }
            examined += 1;

            let outcome = match self.process_lease(lease, &options.scope, dry_run, &mut cache, &mut planned).await {
                Ok((disposition, pairs)) => {
                    self.record_success(lease, &disposition, &pairs, dry_run, &mut stats);
                    LeaseOutcome { lease_id: lease.id.clone(), unit_id: lease.unit_id.clone(), disposition, pairs }
                }
                Err(LeaseFailure { error, pairs }) => {
                    let disposition = self.record_failure(lease, &error, &pairs, &mut stats);
                    LeaseOutcome { lease_id: lease.id.clone(), unit_id: lease.unit_id.clone(), disposition, pairs }
                }
            };
            outcomes.push(outcome);
        }

        let duration = started.elapsed();
        metrics::record_run_duration(duration);
        info!(
            examined,
            cache_entries = cache.len(),
            cache_hits = cache.hits(),
            planned_pairs = planned.len(),
            duration_ms = duration.as_millis() as u64,
            stats = %stats,
            "Reconciliation run complete"
        );
        self.observer.event(
            "run_completed",
            &json!({ "run_id": run_id.to_string(), "examined": examined, "stats": stats }),
        );

        SyncReport {
            run_id,
            dry_run,
            stats,
            fetched,
            examined,
            fetch_limit: None,
            next_checkpoint,
            duration_ms: duration.as_millis() as u64,
            outcomes,
        }
    }

    /// State machine → scope guard → resolution → reconcile, for one lease.
    async fn process_lease(
        &self,
        lease: &LeaseRecord,
        scope: &ProcessingScope,
        dry_run: bool,
        cache: &mut ListingCache,
        planned: &mut PlannedEdges,
    ) -> Result<(LeaseDisposition, Vec<PairOutcome>), LeaseFailure> {
        let Some(transition) = derive_transition(lease.status) else {
            info!(lease_id = %lease.id, status = %lease.status, "Unrecognized lease status, skipping");
            return Ok((LeaseDisposition::Ignored, Vec::new()));
        };

        if assert_in_scope(lease, scope)? == ScopeCheck::Unverifiable {
            warn!(lease_id = %lease.id, "Lease has no unit id; scope cannot be verified");
            self.observer.warn("scope_unverifiable", &json!({ "lease_id": lease.id }));
        }

        let unit_id = lease.unit().ok_or(ResolutionMiss::NoUnit)?;
        if lease.tenant_ids.is_empty() {
            return Err(ResolutionMiss::NoTenants.into());
        }

        let listing = self.resolver.resolve_listing(unit_id, cache).await?;
        let contacts = self.resolve_contacts(lease).await?;

        let mut pairs = Vec::with_capacity(contacts.len());
        let mut changed: Option<TransitionType> = None;
        for contact in &contacts {
            let outcome = match self.reconcile_pair(&contact.id, &listing.id, transition, dry_run, planned).await {
                Ok(outcome) => outcome,
                Err(error) => return Err(LeaseFailure { error, pairs }),
            };
            if outcome.applied && changed.is_none() {
                changed = Some(outcome.transition);
            }
            pairs.push(PairOutcome {
                contact_id: contact.id.clone(),
                listing_id: listing.id.clone(),
                outcome,
            });
        }

        let disposition = match changed {
            Some(transition) => LeaseDisposition::Changed { transition },
            None => LeaseDisposition::Unchanged,
        };
        Ok((disposition, pairs))
    }

    /// Read, refine and reconcile one (contact, listing) pair.
    ///
    /// In dry-run, a pair an earlier lease already planned is read from
    /// `planned` so the decision matches what a live run would see.
    async fn reconcile_pair(
        &self,
        contact_id: &str,
        listing_id: &str,
        transition: Transition,
        dry_run: bool,
        planned: &mut PlannedEdges,
    ) -> Result<ReconcileOutcome, LeaseError> {
        let current = match planned.current(contact_id, listing_id) {
            Some(edges) => edges,
            None => self.reconciler.current_edges(contact_id, listing_id).await?,
        };
        let refined = transition.refine(&current);
        let outcome = self
            .reconciler
            .reconcile(contact_id, listing_id, refined.target, refined.kind, &current, dry_run)
            .await?;
        if dry_run {
            planned.record(contact_id, listing_id, &current, &outcome);
        }
        Ok(outcome)
    }

    /// Contacts for every tenant of the lease that resolves.
    ///
    /// Tenants that miss are skipped one by one; the lease only misses when
    /// none resolve.
    async fn resolve_contacts(&self, lease: &LeaseRecord) -> Result<Vec<ContactEntity>, LeaseError> {
        let mut contacts: Vec<ContactEntity> = Vec::new();
        let mut last_miss = None;

        for tenant_id in &lease.tenant_ids {
            let resolved = match self.resolver.resolve_tenant(lease, tenant_id).await {
                Ok(tenant) => self.resolver.resolve_contact(&tenant).await,
                Err(err) => Err(err),
            };
            match resolved {
                Ok(contact) => {
                    if !contacts.iter().any(|c| c.id == contact.id) {
                        contacts.push(contact);
                    }
                }
                Err(LeaseError::Resolution(miss)) => {
                    warn!(lease_id = %lease.id, tenant_id = %tenant_id, reason = %miss, "Tenant did not resolve to a contact");
                    self.observer.warn(
                        "tenant_unresolved",
                        &json!({ "lease_id": lease.id, "tenant_id": tenant_id, "reason": miss.to_string() }),
                    );
                    last_miss = Some(miss);
                }
                Err(err) => return Err(err),
            }
        }

        if contacts.is_empty() {
            let miss = match last_miss {
                Some(miss) if lease.tenant_ids.len() == 1 => miss,
                _ => ResolutionMiss::NoContacts,
            };
            return Err(miss.into());
        }
        Ok(contacts)
    }

    fn record_success(
        &self,
        lease: &LeaseRecord,
        disposition: &LeaseDisposition,
        pairs: &[PairOutcome],
        dry_run: bool,
        stats: &mut SyncStats,
    ) {
        match disposition {
            LeaseDisposition::Changed { transition } => {
                stats.record_transition(*transition);
                count_edges(pairs, stats);
                metrics::record_transition(transition.as_str());
                metrics::record_lease_outcome("changed");
                info!(lease_id = %lease.id, transition = %transition, pairs = pairs.len(), dry_run, "Lease reconciled");
                self.observer.event(
                    "lease_changed",
                    &json!({ "lease_id": lease.id, "transition": transition, "dry_run": dry_run, "pairs": pairs }),
                );
            }
            LeaseDisposition::Unchanged => {
                stats.unchanged += 1;
                metrics::record_lease_outcome("unchanged");
                debug!(lease_id = %lease.id, "Lease already converged");
            }
            LeaseDisposition::Ignored => {
                metrics::record_lease_outcome("ignored");
            }
            LeaseDisposition::Skipped { .. } | LeaseDisposition::Failed { .. } => {}
        }
    }

    fn record_failure(
        &self,
        lease: &LeaseRecord,
        err: &LeaseError,
        pairs: &[PairOutcome],
        stats: &mut SyncStats,
    ) -> LeaseDisposition {
        // Pairs reconciled before the failure did write.
        count_edges(pairs, stats);
        let meta = json!({ "lease_id": lease.id, "unit_id": lease.unit_id, "kind": err.kind(), "pairs": pairs });
        if err.is_error() {
            stats.errors += 1;
            metrics::record_lease_outcome("error");
            metrics::record_lease_error(err.kind());
            error!(lease_id = %lease.id, unit_id = ?lease.unit_id, kind = err.kind(), error = %err, "Lease reconciliation failed");
            self.observer.error(err, &meta);
            LeaseDisposition::Failed { kind: err.kind().to_string(), message: err.to_string() }
        } else {
            stats.skipped += 1;
            metrics::record_lease_outcome("skipped");
            warn!(lease_id = %lease.id, reason = %err, "Skipping lease");
            self.observer.warn("lease_skipped", &meta);
            LeaseDisposition::Skipped { reason: err.to_string() }
        }
    }
}

fn count_edges(pairs: &[PairOutcome], stats: &mut SyncStats) {
    for pair in pairs {
        stats.edges_removed += pair.outcome.removed.len() as u64;
        stats.edges_added += u64::from(pair.outcome.added.is_some());
    }
}
