//! Collaborator interfaces.
//!
//! The engine never talks HTTP itself. Source-of-record and relationship-graph
//! clients implement these traits; retries and rate limiting live in those
//! clients, not here.

use async_trait::async_trait;
use serde_json::Value;

use crate::association::{AssociationEdge, ContactEntity, ListingEntity};
use crate::error::PortError;
use crate::lease::{LeaseRecord, TenantRecord};

/// One page of an offset-paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

/// Read access to the lease source-of-record.
#[async_trait]
pub trait LeaseSource: Send + Sync {
    /// Leases whose `last_updated` is at or after `since` (epoch millis),
    /// in a stable order so offsets are meaningful across pages.
    async fn list_leases_updated_since(&self, since: i64, page: PageRequest) -> Result<Vec<LeaseRecord>, PortError>;

    async fn list_leases_for_unit(&self, unit_id: &str) -> Result<Vec<LeaseRecord>, PortError>;

    /// Leases for several units of one property in a single request.
    /// Default implementation falls back to one request per unit.
    async fn list_leases_for_units(&self, property_id: &str, unit_ids: &[String]) -> Result<Vec<LeaseRecord>, PortError> {
        let _ = property_id;
        let mut leases = Vec::new();
        for unit_id in unit_ids {
            leases.extend(self.list_leases_for_unit(unit_id).await?);
        }
        Ok(leases)
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, PortError>;
}

/// Read/write access to the relationship graph.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn find_contact_by_email(&self, email: &str) -> Result<Option<ContactEntity>, PortError>;

    async fn find_listing_by_unit_id(&self, unit_id: &str) -> Result<Option<ListingEntity>, PortError>;

    /// Listings for several units in one request. Units without a listing
    /// are simply absent from the result.
    /// Default implementation falls back to sequential single lookups.
    async fn find_listings_by_unit_ids(&self, unit_ids: &[String]) -> Result<Vec<ListingEntity>, PortError> {
        let mut found = Vec::new();
        for unit_id in unit_ids {
            if let Some(listing) = self.find_listing_by_unit_id(unit_id).await? {
                found.push(listing);
            }
        }
        Ok(found)
    }

    async fn list_associations(&self, contact_id: &str, listing_id: &str) -> Result<Vec<AssociationEdge>, PortError>;

    async fn create_association(&self, edge: &AssociationEdge) -> Result<(), PortError>;

    async fn delete_association(&self, edge: &AssociationEdge) -> Result<(), PortError>;
}

/// Optional sink for named run events.
///
/// Every method defaults to doing nothing, so implementors only override
/// what they care about.
pub trait SyncObserver: Send + Sync {
    fn event(&self, name: &str, meta: &Value) {
        let _ = (name, meta);
    }

    fn warn(&self, name: &str, meta: &Value) {
        let _ = (name, meta);
    }

    fn error(&self, err: &(dyn std::error::Error + Send + Sync), meta: &Value) {
        let _ = (err, meta);
    }
}
