// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lease lifecycle state machine.
//!
//! Maps a lease status to the association type a tenant should hold on the
//! unit's listing, plus the transition bucket the change is reported under.
//! This mapping is the only place lease statuses are interpreted.
//!
//! | status                      | target            | transition         |
//! |-----------------------------|-------------------|--------------------|
//! | Future                      | `FUTURE_TENANT`   | `futureToActive`   |
//! | Active                      | `ACTIVE_TENANT`   | `futureToActive`   |
//! | Past, Expired, Terminated   | `INACTIVE_TENANT` | `activeToInactive` |
//! | anything else               | skipped           |                    |
//!
//! # Example
//!
//! ```
//! use lease_sync::{derive_transition, AssociationType, LeaseStatus, TransitionType};
//!
//! let t = derive_transition(LeaseStatus::Active).unwrap();
//! assert_eq!(t.target, AssociationType::ActiveTenant);
//! assert_eq!(t.kind, TransitionType::FutureToActive);
//!
//! assert!(derive_transition(LeaseStatus::Unknown).is_none());
//! ```

use serde::{Deserialize, Serialize};

use crate::association::{AssociationEdge, AssociationType};
use crate::lease::LeaseStatus;

/// Which status change a reconciliation decision belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionType {
    FutureToActive,
    ActiveToInactive,
    FutureToInactive,
}

impl TransitionType {
    /// The only edge type this transition may remove.
    #[must_use]
    pub fn removable_type(&self) -> AssociationType {
        match self {
            Self::FutureToActive => AssociationType::FutureTenant,
            Self::ActiveToInactive => AssociationType::ActiveTenant,
            Self::FutureToInactive => AssociationType::FutureTenant,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FutureToActive => "futureToActive",
            Self::ActiveToInactive => "activeToInactive",
            Self::FutureToInactive => "futureToInactive",
        }
    }
}

impl std::fmt::Display for TransitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired association type plus the bucket it is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub target: AssociationType,
    pub kind: TransitionType,
}

impl Transition {
    /// Reclassify against the pair's current edges.
    ///
    /// An inactive lease whose pair still holds `FUTURE_TENANT` and no
    /// `ACTIVE_TENANT` never went active, so it is counted as
    /// `futureToInactive` and the future edge becomes the removable one.
    #[must_use]
    pub fn refine(self, current: &[AssociationEdge]) -> Self {
        if self.kind != TransitionType::ActiveToInactive {
            return self;
        }
        let has = |ty: AssociationType| current.iter().any(|e| e.type_id == ty);
        if has(AssociationType::FutureTenant) && !has(AssociationType::ActiveTenant) {
            Self { kind: TransitionType::FutureToInactive, ..self }
        } else {
            self
        }
    }
}

/// Map a lease status to its target association, or `None` to skip the lease.
#[must_use]
pub fn derive_transition(status: LeaseStatus) -> Option<Transition> {
    let (target, kind) = match status {
        LeaseStatus::Future => (AssociationType::FutureTenant, TransitionType::FutureToActive),
        LeaseStatus::Active => (AssociationType::ActiveTenant, TransitionType::FutureToActive),
        LeaseStatus::Past | LeaseStatus::Expired | LeaseStatus::Terminated => {
            (AssociationType::InactiveTenant, TransitionType::ActiveToInactive)
        }
        LeaseStatus::Unknown => return None,
    };
    Some(Transition { target, kind })
}
