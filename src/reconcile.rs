// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relationship reconciler.
//!
//! Converges the edges between one contact and one listing toward a single
//! desired type:
//!
//! 1. Target already present → nothing to do, zero writes.
//! 2. Otherwise remove every current edge of the transition's removable type.
//! 3. Then add the target.
//!
//! Deciding ([`plan_reconciliation`]) is pure; applying ([`Reconciler`]) issues
//! independent delete/create calls. They are not transactional: if a delete
//! lands and the create fails, the next run sees the target still missing and
//! finishes the job. Dry-run uses the same plan and skips only the calls.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::association::{AssociationEdge, AssociationType};
use crate::error::{LeaseError, Stage};
use crate::lifecycle::TransitionType;
use crate::metrics;
use crate::ports::RelationshipStore;

/// Writes needed to converge one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    pub remove: Vec<AssociationType>,
    pub add: Option<AssociationType>,
}

impl ReconcilePlan {
    /// True when the pair is already converged.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.remove.is_empty() && self.add.is_none()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.remove.len() + usize::from(self.add.is_some())
    }
}

/// Compute the minimal diff from `current` to `target` for `transition`.
///
/// Only edges of `transition.removable_type()` are ever removed; owner
/// edges and other tenant types are left alone.
#[must_use]
pub fn plan_reconciliation(
    target: AssociationType,
    transition: TransitionType,
    current: &[AssociationEdge],
) -> ReconcilePlan {
    if current.iter().any(|e| e.type_id == target) {
        return ReconcilePlan { remove: Vec::new(), add: None };
    }

    let removable = transition.removable_type();
    let mut remove: Vec<AssociationType> = current
        .iter()
        .map(|e| e.type_id)
        .filter(|ty| *ty == removable)
        .collect();
    remove.dedup();

    ReconcilePlan { remove, add: Some(target) }
}

/// What reconciling one pair did (or, in dry-run, would do).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    /// False when the pair was already converged
    pub applied: bool,
    pub removed: Vec<AssociationType>,
    pub added: Option<AssociationType>,
    pub transition: TransitionType,
    pub dry_run: bool,
}

pub struct Reconciler {
    store: Arc<dyn RelationshipStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RelationshipStore>) -> Self {
        Self { store }
    }

    /// Current edges between a contact and a listing.
    pub async fn current_edges(&self, contact_id: &str, listing_id: &str) -> Result<Vec<AssociationEdge>, LeaseError> {
        let _timer = crate::time_call!("target", "read_edges");
        self.store
            .list_associations(contact_id, listing_id)
            .await
            .map_err(LeaseError::io(Stage::ReadEdges))
    }

    /// Plan and apply the diff for one pair.
    pub async fn reconcile(
        &self,
        contact_id: &str,
        listing_id: &str,
        target: AssociationType,
        transition: TransitionType,
        current: &[AssociationEdge],
        dry_run: bool,
    ) -> Result<ReconcileOutcome, LeaseError> {
        let plan = plan_reconciliation(target, transition, current);
        if plan.is_noop() {
            debug!(contact_id, listing_id, target = %target, "Pair already converged");
            return Ok(ReconcileOutcome {
                applied: false,
                removed: Vec::new(),
                added: None,
                transition,
                dry_run,
            });
        }

        for ty in &plan.remove {
            let edge = AssociationEdge::new(contact_id, listing_id, *ty);
            metrics::record_edge_write("delete", ty.as_str(), dry_run);
            if dry_run {
                info!(contact_id, listing_id, edge_type = %ty, "[dry-run] Would remove association");
                continue;
            }
            let _timer = crate::time_call!("target", "delete_edge");
            self.store
                .delete_association(&edge)
                .await
                .map_err(LeaseError::io(Stage::WriteEdge))?;
            debug!(contact_id, listing_id, edge_type = %ty, "Removed association");
        }

        if let Some(ty) = plan.add {
            let edge = AssociationEdge::new(contact_id, listing_id, ty);
            metrics::record_edge_write("create", ty.as_str(), dry_run);
            if dry_run {
                info!(contact_id, listing_id, edge_type = %ty, "[dry-run] Would add association");
            } else {
                let _timer = crate::time_call!("target", "create_edge");
                self.store
                    .create_association(&edge)
                    .await
                    .map_err(LeaseError::io(Stage::WriteEdge))?;
                debug!(contact_id, listing_id, edge_type = %ty, "Added association");
            }
        }

        Ok(ReconcileOutcome {
            applied: true,
            removed: plan.remove,
            added: plan.add,
            transition,
            dry_run,
        })
    }
}

/// Edges a dry run has planned so far, per (contact, listing) pair.
///
/// A later lease on the same pair must see the state a live run would have
/// left behind, not the untouched store. Discard after the run.
#[derive(Debug, Default)]
pub struct PlannedEdges {
    pairs: HashMap<(String, String), BTreeSet<AssociationType>>,
}

impl PlannedEdges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Planned edges for a pair, or `None` if no plan has touched it yet.
    #[must_use]
    pub fn current(&self, contact_id: &str, listing_id: &str) -> Option<Vec<AssociationEdge>> {
        self.pairs
            .get(&(contact_id.to_string(), listing_id.to_string()))
            .map(|types| {
                types
                    .iter()
                    .map(|ty| AssociationEdge::new(contact_id, listing_id, *ty))
                    .collect()
            })
    }

    /// Fold an outcome into the pair's state, starting from `current`.
    pub fn record(&mut self, contact_id: &str, listing_id: &str, current: &[AssociationEdge], outcome: &ReconcileOutcome) {
        let mut types: BTreeSet<AssociationType> = current.iter().map(|e| e.type_id).collect();
        for ty in &outcome.removed {
            types.remove(ty);
        }
        if let Some(ty) = outcome.added {
            types.insert(ty);
        }
        self.pairs.insert((contact_id.to_string(), listing_id.to_string()), types);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
