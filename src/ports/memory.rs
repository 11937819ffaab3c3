//! In-memory collaborators.
//!
//! Deterministic stand-ins for the source and target APIs. Every call is
//! counted and every write is logged so runs can be asserted on precisely;
//! failures can be switched on per operation.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use super::traits::{LeaseSource, PageRequest, RelationshipStore};
use crate::association::{AssociationEdge, AssociationType, ContactEntity, ListingEntity};
use crate::error::PortError;
use crate::lease::{LeaseRecord, TenantRecord};

fn injected(op: &str) -> PortError {
    PortError::Transport(format!("injected {} failure", op))
}

/// Lease source-of-record backed by a vector.
#[derive(Default)]
pub struct InMemoryLeaseSource {
    leases: RwLock<Vec<LeaseRecord>>,
    tenants: DashMap<String, TenantRecord>,

    page_calls: AtomicUsize,
    unit_calls: AtomicUsize,
    property_calls: AtomicUsize,
    tenant_calls: AtomicUsize,

    fail_fetch: AtomicBool,
    fail_tenants: AtomicBool,
}

impl InMemoryLeaseSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leases(leases: impl IntoIterator<Item = LeaseRecord>) -> Self {
        let source = Self::new();
        for lease in leases {
            source.add_lease(lease);
        }
        source
    }

    /// Insert or replace a lease by id.
    pub fn add_lease(&self, lease: LeaseRecord) {
        let mut leases = self.leases.write();
        if let Some(existing) = leases.iter_mut().find(|l| l.id == lease.id) {
            *existing = lease;
        } else {
            leases.push(lease);
        }
    }

    pub fn add_tenant(&self, tenant: TenantRecord) {
        self.tenants.insert(tenant.id.clone(), tenant);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leases.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leases.read().is_empty()
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_tenants(&self, fail: bool) {
        self.fail_tenants.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn unit_calls(&self) -> usize {
        self.unit_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn property_calls(&self) -> usize {
        self.property_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn tenant_calls(&self) -> usize {
        self.tenant_calls.load(Ordering::SeqCst)
    }

    fn check_fetch(&self) -> Result<(), PortError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(injected("fetch"));
        }
        Ok(())
    }
}

#[async_trait]
impl LeaseSource for InMemoryLeaseSource {
    async fn list_leases_updated_since(&self, since: i64, page: PageRequest) -> Result<Vec<LeaseRecord>, PortError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fetch()?;

        let mut matching: Vec<LeaseRecord> = self
            .leases
            .read()
            .iter()
            .filter(|l| l.last_updated >= since)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.last_updated.cmp(&b.last_updated).then_with(|| a.id.cmp(&b.id)));

        Ok(matching.into_iter().skip(page.offset).take(page.limit).collect())
    }

    async fn list_leases_for_unit(&self, unit_id: &str) -> Result<Vec<LeaseRecord>, PortError> {
        self.unit_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fetch()?;

        Ok(self
            .leases
            .read()
            .iter()
            .filter(|l| l.unit() == Some(unit_id))
            .cloned()
            .collect())
    }

    async fn list_leases_for_units(&self, _property_id: &str, unit_ids: &[String]) -> Result<Vec<LeaseRecord>, PortError> {
        self.property_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fetch()?;

        let wanted: HashSet<&str> = unit_ids.iter().map(String::as_str).collect();
        Ok(self
            .leases
            .read()
            .iter()
            .filter(|l| l.unit().is_some_and(|u| wanted.contains(u)))
            .cloned()
            .collect())
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, PortError> {
        self.tenant_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_tenants.load(Ordering::SeqCst) {
            return Err(injected("tenant"));
        }
        Ok(self.tenants.get(tenant_id).map(|r| r.value().clone()))
    }
}

/// Kind of association write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Delete,
}

/// One association write as it reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeWrite {
    pub op: WriteOp,
    pub edge: AssociationEdge,
}

/// Relationship graph backed by concurrent maps.
#[derive(Default)]
pub struct InMemoryRelationshipStore {
    /// Keyed by lowercased email
    contacts: DashMap<String, ContactEntity>,
    /// Keyed by unit id
    listings: DashMap<String, ListingEntity>,
    edges: DashMap<(String, String), BTreeSet<AssociationType>>,
    writes: Mutex<Vec<EdgeWrite>>,

    contact_lookups: AtomicUsize,
    listing_lookups: AtomicUsize,
    listing_batch_lookups: AtomicUsize,
    association_reads: AtomicUsize,

    fail_reads: AtomicBool,
    /// Contacts whose edge reads fail
    failing_contacts: Mutex<HashSet<String>>,
    fail_creates: AtomicBool,
    fail_deletes: AtomicBool,
    fail_listing_batches: AtomicBool,
}

impl InMemoryRelationshipStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&self, id: &str, email: &str) {
        let email = email.trim().to_ascii_lowercase();
        self.contacts.insert(email.clone(), ContactEntity { id: id.to_string(), email });
    }

    pub fn add_listing(&self, id: &str, unit_id: &str) {
        self.listings.insert(
            unit_id.to_string(),
            ListingEntity { id: id.to_string(), unit_id: unit_id.to_string() },
        );
    }

    /// Seed an edge without logging it as a write.
    pub fn add_edge(&self, contact_id: &str, listing_id: &str, type_id: AssociationType) {
        self.edges
            .entry((contact_id.to_string(), listing_id.to_string()))
            .or_default()
            .insert(type_id);
    }

    /// Current edge types for a pair, sorted.
    #[must_use]
    pub fn edge_types(&self, contact_id: &str, listing_id: &str) -> Vec<AssociationType> {
        self.edges
            .get(&(contact_id.to_string(), listing_id.to_string()))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn writes(&self) -> Vec<EdgeWrite> {
        self.writes.lock().clone()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    #[must_use]
    pub fn contact_lookups(&self) -> usize {
        self.contact_lookups.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn listing_lookups(&self) -> usize {
        self.listing_lookups.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn listing_batch_lookups(&self) -> usize {
        self.listing_batch_lookups.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn association_reads(&self) -> usize {
        self.association_reads.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fail edge reads for one contact only.
    pub fn fail_reads_for(&self, contact_id: &str) {
        self.failing_contacts.lock().insert(contact_id.to_string());
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_listing_batches(&self, fail: bool) {
        self.fail_listing_batches.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RelationshipStore for InMemoryRelationshipStore {
    async fn find_contact_by_email(&self, email: &str) -> Result<Option<ContactEntity>, PortError> {
        self.contact_lookups.fetch_add(1, Ordering::SeqCst);
        let key = email.trim().to_ascii_lowercase();
        Ok(self.contacts.get(&key).map(|r| r.value().clone()))
    }

    async fn find_listing_by_unit_id(&self, unit_id: &str) -> Result<Option<ListingEntity>, PortError> {
        self.listing_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.listings.get(unit_id).map(|r| r.value().clone()))
    }

    async fn find_listings_by_unit_ids(&self, unit_ids: &[String]) -> Result<Vec<ListingEntity>, PortError> {
        self.listing_batch_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing_batches.load(Ordering::SeqCst) {
            return Err(injected("listing batch"));
        }
        Ok(unit_ids
            .iter()
            .filter_map(|u| self.listings.get(u).map(|r| r.value().clone()))
            .collect())
    }

    async fn list_associations(&self, contact_id: &str, listing_id: &str) -> Result<Vec<AssociationEdge>, PortError> {
        self.association_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) || self.failing_contacts.lock().contains(contact_id) {
            return Err(injected("read"));
        }
        Ok(self
            .edge_types(contact_id, listing_id)
            .into_iter()
            .map(|ty| AssociationEdge::new(contact_id, listing_id, ty))
            .collect())
    }

    async fn create_association(&self, edge: &AssociationEdge) -> Result<(), PortError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(injected("create"));
        }
        self.add_edge(&edge.contact_id, &edge.listing_id, edge.type_id);
        self.writes.lock().push(EdgeWrite { op: WriteOp::Create, edge: edge.clone() });
        Ok(())
    }

    async fn delete_association(&self, edge: &AssociationEdge) -> Result<(), PortError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        if let Some(mut set) = self.edges.get_mut(&(edge.contact_id.clone(), edge.listing_id.clone())) {
            set.remove(&edge.type_id);
        }
        self.writes.lock().push(EdgeWrite { op: WriteOp::Delete, edge: edge.clone() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::LeaseStatus;

    fn lease(id: &str, unit: &str, updated: i64) -> LeaseRecord {
        LeaseRecord::new(id, LeaseStatus::Active).with_unit(unit).with_last_updated(updated)
    }

    #[tokio::test]
    async fn test_pages_are_ordered_and_offset() {
        let source = InMemoryLeaseSource::with_leases([
            lease("L-3", "U-1", 30),
            lease("L-1", "U-1", 10),
            lease("L-2", "U-2", 20),
        ]);

        let first = source
            .list_leases_updated_since(0, PageRequest { limit: 2, offset: 0 })
            .await
            .unwrap();
        let ids: Vec<_> = first.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["L-1", "L-2"]);

        let second = source
            .list_leases_updated_since(0, PageRequest { limit: 2, offset: 2 })
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, "L-3");
        assert_eq!(source.page_calls(), 2);
    }

    #[tokio::test]
    async fn test_since_is_inclusive() {
        let source = InMemoryLeaseSource::with_leases([lease("L-1", "U-1", 10), lease("L-2", "U-1", 20)]);
        let page = source
            .list_leases_updated_since(20, PageRequest { limit: 10, offset: 0 })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "L-2");
    }

    #[tokio::test]
    async fn test_add_lease_replaces_by_id() {
        let source = InMemoryLeaseSource::new();
        source.add_lease(lease("L-1", "U-1", 10));
        source.add_lease(lease("L-1", "U-2", 11));
        assert_eq!(source.len(), 1);
        let leases = source.list_leases_for_unit("U-2").await.unwrap();
        assert_eq!(leases.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_fetch() {
        let source = InMemoryLeaseSource::new();
        source.set_fail_fetch(true);
        let result = source.list_leases_updated_since(0, PageRequest { limit: 1, offset: 0 }).await;
        assert!(matches!(result, Err(PortError::Transport(_))));
    }

    #[tokio::test]
    async fn test_contact_lookup_is_case_insensitive() {
        let store = InMemoryRelationshipStore::new();
        store.add_contact("C-1", "Jane@Example.com");
        let contact = store.find_contact_by_email("jane@example.COM").await.unwrap();
        assert_eq!(contact.unwrap().id, "C-1");
        assert_eq!(store.contact_lookups(), 1);
    }

    #[tokio::test]
    async fn test_create_and_delete_are_logged() {
        let store = InMemoryRelationshipStore::new();
        let edge = AssociationEdge::new("C-1", "LST-1", AssociationType::ActiveTenant);

        store.create_association(&edge).await.unwrap();
        assert_eq!(store.edge_types("C-1", "LST-1"), vec![AssociationType::ActiveTenant]);

        store.delete_association(&edge).await.unwrap();
        assert!(store.edge_types("C-1", "LST-1").is_empty());

        let writes = store.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].op, WriteOp::Create);
        assert_eq!(writes[1].op, WriteOp::Delete);
    }

    #[tokio::test]
    async fn test_seeded_edges_are_not_writes() {
        let store = InMemoryRelationshipStore::new();
        store.add_edge("C-1", "LST-1", AssociationType::Owner);
        assert_eq!(store.write_count(), 0);
        let edges = store.list_associations("C-1", "LST-1").await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(store.association_reads(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_can_target_one_contact() {
        let store = InMemoryRelationshipStore::new();
        store.fail_reads_for("C-2");
        assert!(store.list_associations("C-1", "LST-1").await.is_ok());
        assert!(matches!(store.list_associations("C-2", "LST-1").await, Err(PortError::Transport(_))));
    }

    #[tokio::test]
    async fn test_batch_listing_lookup_skips_missing() {
        let store = InMemoryRelationshipStore::new();
        store.add_listing("LST-1", "U-1");
        store.add_listing("LST-3", "U-3");
        let found = store
            .find_listings_by_unit_ids(&["U-1".into(), "U-2".into(), "U-3".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.listing_batch_lookups(), 1);
        assert_eq!(store.listing_lookups(), 0);
    }
}
