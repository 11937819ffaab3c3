//! Processing-boundary guard.
//!
//! A scoped run (explicit units or properties) may only write associations
//! for leases on those units. A lease outside the boundary is a hard error for
//! that lease: it means upstream filtering let something through.
//!
//! # Example
//!
//! ```
//! use lease_sync::{assert_in_scope, LeaseRecord, LeaseStatus, ProcessingScope, ScopeCheck};
//!
//! let scope = ProcessingScope::units(["U1"]);
//! let inside = LeaseRecord::new("L-1", LeaseStatus::Active).with_unit("U1");
//! let outside = LeaseRecord::new("L-2", LeaseStatus::Active).with_unit("U2");
//!
//! assert_eq!(assert_in_scope(&inside, &scope).unwrap(), ScopeCheck::InScope);
//! assert!(assert_in_scope(&outside, &scope).is_err());
//! ```

use std::collections::HashSet;

use crate::error::LeaseError;
use crate::lease::{LeaseRecord, UnitRef};

/// The boundary a run is allowed to mutate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProcessingScope {
    /// Global incremental pull; nothing to check
    #[default]
    Unbounded,
    Bounded {
        units: HashSet<String>,
        properties: HashSet<String>,
    },
}

impl ProcessingScope {
    pub fn units<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Bounded {
            units: units.into_iter().map(Into::into).collect(),
            properties: HashSet::new(),
        }
    }

    pub fn properties<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Bounded {
            units: HashSet::new(),
            properties: properties.into_iter().map(Into::into).collect(),
        }
    }

    /// Scope covering exactly the given units.
    pub fn from_unit_refs<'a>(refs: impl IntoIterator<Item = &'a UnitRef>) -> Self {
        Self::units(refs.into_iter().map(|r| r.unit_id.clone()))
    }

    #[must_use]
    pub fn is_bounded(&self) -> bool {
        matches!(self, Self::Bounded { .. })
    }
}

/// How a lease passed the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeCheck {
    /// The run is not bounded
    Unbounded,
    InScope,
    /// Bounded run, but the lease carries no unit id to check
    Unverifiable,
}

/// Check a lease against the run's scope.
///
/// Leases without a unit id pass as [`ScopeCheck::Unverifiable`]; the caller
/// is expected to warn about them.
pub fn assert_in_scope(lease: &LeaseRecord, scope: &ProcessingScope) -> Result<ScopeCheck, LeaseError> {
    let ProcessingScope::Bounded { units, properties } = scope else {
        return Ok(ScopeCheck::Unbounded);
    };
    let Some(unit_id) = lease.unit() else {
        return Ok(ScopeCheck::Unverifiable);
    };

    let property_ok = lease
        .property_id
        .as_deref()
        .is_some_and(|p| properties.contains(p));
    if units.contains(unit_id) || property_ok {
        Ok(ScopeCheck::InScope)
    } else {
        Err(LeaseError::ScopeViolation {
            lease_id: lease.id.clone(),
            unit_id: unit_id.to_string(),
        })
    }
}
