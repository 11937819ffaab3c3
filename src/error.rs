//! Error taxonomy.
//!
//! - [`PortError`]: a collaborator call failed (transport, rate limit, rejection).
//! - [`LeaseError`]: one lease could not be reconciled. Caught at the lease
//!   boundary; never aborts the run.
//! - [`SyncError`]: the run itself could not start.

use thiserror::Error;

/// Failure reported by a source or target collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rate limited by remote API")]
    RateLimited,
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// The collaborator step a lease failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveTenant,
    ResolveContact,
    ResolveListing,
    ReadEdges,
    WriteEdge,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolveTenant => write!(f, "resolve_tenant"),
            Self::ResolveContact => write!(f, "resolve_contact"),
            Self::ResolveListing => write!(f, "resolve_listing"),
            Self::ReadEdges => write!(f, "read_edges"),
            Self::WriteEdge => write!(f, "write_edge"),
        }
    }
}

/// Why a lease was skipped without being counted as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionMiss {
    #[error("lease has no unit id")]
    NoUnit,
    #[error("lease has no tenants")]
    NoTenants,
    #[error("tenant {tenant_id} not found in source")]
    TenantNotFound { tenant_id: String },
    #[error("tenant {tenant_id} has no email")]
    NoEmail { tenant_id: String },
    #[error("no contact for {email}")]
    ContactNotFound { email: String },
    #[error("no listing for unit {unit_id}")]
    ListingNotFound { unit_id: String },
    #[error("no tenant of the lease resolved to a contact")]
    NoContacts,
}

/// Per-lease failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LeaseError {
    #[error("resolution miss: {0}")]
    Resolution(#[from] ResolutionMiss),

    #[error("lease {lease_id} targets unit {unit_id} outside the run scope")]
    ScopeViolation { lease_id: String, unit_id: String },

    #[error("{stage} failed: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: PortError,
    },
}

impl LeaseError {
    pub(crate) fn io(stage: Stage) -> impl FnOnce(PortError) -> Self {
        move |source| Self::Io { stage, source }
    }

    /// Whether this failure counts toward `SyncStats::errors`.
    ///
    /// Resolution misses are skips; scope violations and I/O failures are errors.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Resolution(_))
    }

    /// Short label for metrics and observer events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "resolution_miss",
            Self::ScopeViolation { .. } => "scope_violation",
            Self::Io { .. } => "io",
        }
    }
}

/// Run-level failure. Only raised before any lease is processed.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("initial fetch failed: {0}")]
    Fetch(#[source] PortError),
    #[error("invalid configuration: {0}")]
    Config(String),
}
