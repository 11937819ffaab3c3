//! Target-system entities and the typed edges between them.

use serde::{Deserialize, Serialize};

/// Association types understood by the engine.
///
/// A closed set; clients translate these to whatever numeric ids the
/// target system uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssociationType {
    FutureTenant,
    ActiveTenant,
    InactiveTenant,
    Owner,
}

impl AssociationType {
    /// Tenant-class types; at most one of these should hold per pair.
    #[must_use]
    pub fn is_tenant_class(&self) -> bool {
        !matches!(self, Self::Owner)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FutureTenant => "FUTURE_TENANT",
            Self::ActiveTenant => "ACTIVE_TENANT",
            Self::InactiveTenant => "INACTIVE_TENANT",
            Self::Owner => "OWNER",
        }
    }
}

impl std::fmt::Display for AssociationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact in the target system, keyed naturally by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntity {
    pub id: String,
    pub email: String,
}

/// A listing in the target system, keyed naturally by unit id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntity {
    pub id: String,
    pub unit_id: String,
}

/// A typed link between a contact and a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationEdge {
    pub contact_id: String,
    pub listing_id: String,
    pub type_id: AssociationType,
}

impl AssociationEdge {
    pub fn new(contact_id: impl Into<String>, listing_id: impl Into<String>, type_id: AssociationType) -> Self {
        Self {
            contact_id: contact_id.into(),
            listing_id: listing_id.into(),
            type_id,
        }
    }
}
