//! Lease records as read from the source system.
//!
//! A [`LeaseRecord`] is an immutable snapshot taken at fetch time. It is
//! re-fetched on every run and never persisted by the engine.
//!
//! # Example
//!
//! ```
//! use lease_sync::{LeaseRecord, LeaseStatus};
//!
//! let lease = LeaseRecord::new("L-1", LeaseStatus::Active)
//!     .with_unit("U-1")
//!     .with_tenant_ids(["T-1"]);
//!
//! assert_eq!(lease.unit_id.as_deref(), Some("U-1"));
//! assert_eq!("terminated".parse::<LeaseStatus>().unwrap(), LeaseStatus::Terminated);
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status reported by the source system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeaseStatus {
    Future,
    Active,
    Past,
    Expired,
    Terminated,
    /// Anything the source reports that this engine does not interpret
    #[serde(other)]
    Unknown,
}

impl LeaseStatus {
    /// Every status, including `Unknown`.
    pub const ALL: [LeaseStatus; 6] = [
        LeaseStatus::Future,
        LeaseStatus::Active,
        LeaseStatus::Past,
        LeaseStatus::Expired,
        LeaseStatus::Terminated,
        LeaseStatus::Unknown,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Future => "Future",
            Self::Active => "Active",
            Self::Past => "Past",
            Self::Expired => "Expired",
            Self::Terminated => "Terminated",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaseStatus {
    type Err = std::convert::Infallible;

    /// Case-insensitive; unrecognized values parse as `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_lowercase().as_str() {
            "future" => Self::Future,
            "active" => Self::Active,
            "past" => Self::Past,
            "expired" => Self::Expired,
            "terminated" => Self::Terminated,
            _ => Self::Unknown,
        };
        Ok(status)
    }
}

/// A tenant referenced by a lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

impl TenantRecord {
    pub fn new(id: impl Into<String>, email: Option<&str>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.map(str::to_string),
            display_name: display_name.into(),
        }
    }

    /// Trimmed, lowercased email, or `None` when missing or blank.
    #[must_use]
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_ascii_lowercase)
    }
}

/// A unit identifier together with the property it belongs to, if known.
///
/// The property id is what batched lease lookups group by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitRef {
    pub unit_id: String,
    #[serde(default)]
    pub property_id: Option<String>,
}

impl UnitRef {
    pub fn new(unit_id: impl Into<String>) -> Self {
        Self { unit_id: unit_id.into(), property_id: None }
    }

    pub fn in_property(unit_id: impl Into<String>, property_id: impl Into<String>) -> Self {
        Self { unit_id: unit_id.into(), property_id: Some(property_id.into()) }
    }
}

/// Snapshot of a rental agreement at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub id: String,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    pub status: LeaseStatus,
    #[serde(default)]
    pub tenant_ids: Vec<String>,
    /// Tenant records the source already embedded in the lease payload
    #[serde(default)]
    pub tenants: Vec<TenantRecord>,
    /// Last update timestamp (epoch millis)
    #[serde(default)]
    pub last_updated: i64,
}

impl LeaseRecord {
    pub fn new(id: impl Into<String>, status: LeaseStatus) -> Self {
        Self {
            id: id.into(),
            unit_id: None,
            property_id: None,
            status,
            tenant_ids: Vec::new(),
            tenants: Vec::new(),
            last_updated: 0,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit_id: impl Into<String>) -> Self {
        self.unit_id = Some(unit_id.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, property_id: impl Into<String>) -> Self {
        self.property_id = Some(property_id.into());
        self
    }

    #[must_use]
    pub fn with_tenant_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tenant_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Embed a tenant record; also adds its id to `tenant_ids` if missing.
    #[must_use]
    pub fn with_tenant(mut self, tenant: TenantRecord) -> Self {
        if !self.tenant_ids.contains(&tenant.id) {
            self.tenant_ids.push(tenant.id.clone());
        }
        self.tenants.push(tenant);
        self
    }

    #[must_use]
    pub fn with_last_updated(mut self, millis: i64) -> Self {
        self.last_updated = millis;
        self
    }

    /// Unit id, ignoring blank values.
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        self.unit_id.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Embedded tenant record for `tenant_id`, if the payload carried one.
    #[must_use]
    pub fn embedded_tenant(&self, tenant_id: &str) -> Option<&TenantRecord> {
        self.tenants.iter().find(|t| t.id == tenant_id)
    }
}
