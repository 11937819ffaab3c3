// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Natural-key resolution: tenant email → contact, unit id → listing.
//!
//! Listing lookups are memoized per run in a [`ListingCache`] that remembers
//! "looked up, nothing there" separately from "never asked", so a unit with
//! no listing costs one request per run no matter how many leases point at it.
//!
//! Misses (no email, no contact, no listing) come back as
//! [`LeaseError::Resolution`] and skip the lease; transport failures come back
//! as [`LeaseError::Io`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::association::{ContactEntity, ListingEntity};
use crate::error::{LeaseError, PortError, ResolutionMiss, Stage};
use crate::lease::{LeaseRecord, TenantRecord};
use crate::metrics;
use crate::ports::{LeaseSource, RelationshipStore};

/// Cache state for one unit id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingLookup {
    NotLooked,
    Looked(Option<ListingEntity>),
}

/// Per-run memo of listing lookups. Discard after the run.
#[derive(Debug, Default)]
pub struct ListingCache {
    entries: HashMap<String, Option<ListingEntity>>,
    hits: usize,
    misses: usize,
}

impl ListingCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lookup(&self, unit_id: &str) -> ListingLookup {
        match self.entries.get(unit_id) {
            Some(entry) => ListingLookup::Looked(entry.clone()),
            None => ListingLookup::NotLooked,
        }
    }

    pub fn record(&mut self, unit_id: impl Into<String>, listing: Option<ListingEntity>) {
        self.entries.insert(unit_id.into(), listing);
    }

    /// Units looked up so far (present or absent).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits
    }

    #[must_use]
    pub fn misses(&self) -> usize {
        self.misses
    }
}

pub struct EntityResolver {
    source: Arc<dyn LeaseSource>,
    store: Arc<dyn RelationshipStore>,
    listing_batch_size: usize,
}

impl EntityResolver {
    pub fn new(source: Arc<dyn LeaseSource>, store: Arc<dyn RelationshipStore>, listing_batch_size: usize) -> Self {
        Self {
            source,
            store,
            listing_batch_size: listing_batch_size.max(1),
        }
    }

    /// Tenant record for one of the lease's tenant ids.
    ///
    /// Uses the record embedded in the lease payload when present; otherwise
    /// asks the source.
    pub async fn resolve_tenant(&self, lease: &LeaseRecord, tenant_id: &str) -> Result<TenantRecord, LeaseError> {
        if let Some(tenant) = lease.embedded_tenant(tenant_id) {
            return Ok(tenant.clone());
        }
        let tenant = {
            let _timer = crate::time_call!("source", "resolve_tenant");
            self.source
                .get_tenant(tenant_id)
                .await
                .map_err(LeaseError::io(Stage::ResolveTenant))?
        };
        tenant.ok_or_else(|| ResolutionMiss::TenantNotFound { tenant_id: tenant_id.to_string() }.into())
    }

    pub async fn resolve_contact(&self, tenant: &TenantRecord) -> Result<ContactEntity, LeaseError> {
        let email = tenant
            .normalized_email()
            .ok_or_else(|| ResolutionMiss::NoEmail { tenant_id: tenant.id.clone() })?;

        let contact = {
            let _timer = crate::time_call!("target", "resolve_contact");
            self.store
                .find_contact_by_email(&email)
                .await
                .map_err(LeaseError::io(Stage::ResolveContact))?
        };
        debug!(tenant_id = %tenant.id, found = contact.is_some(), "Resolved contact");
        contact.ok_or_else(|| ResolutionMiss::ContactNotFound { email }.into())
    }

    /// Listing for a unit, consulting and filling the run cache.
    pub async fn resolve_listing(&self, unit_id: &str, cache: &mut ListingCache) -> Result<ListingEntity, LeaseError> {
        let listing = match cache.lookup(unit_id) {
            ListingLookup::Looked(listing) => {
                cache.hits += 1;
                metrics::record_listing_cache(true);
                listing
            }
            ListingLookup::NotLooked => {
                cache.misses += 1;
                metrics::record_listing_cache(false);
                let listing = {
                    let _timer = crate::time_call!("target", "resolve_listing");
                    self.store
                        .find_listing_by_unit_id(unit_id)
                        .await
                        .map_err(LeaseError::io(Stage::ResolveListing))?
                };
                cache.record(unit_id, listing.clone());
                listing
            }
        };
        listing.ok_or_else(|| ResolutionMiss::ListingNotFound { unit_id: unit_id.to_string() }.into())
    }

    /// Fill the cache for many units with batched requests.
    ///
    /// Units already in the cache are not requested again. Units missing from
    /// a batch answer are recorded as absent. If a batch request fails, that
    /// chunk falls back to one request per unit, so the set of listings found
    /// is the same as with [`resolve_listing`](Self::resolve_listing).
    ///
    /// Returns the number of units that resolved to a listing.
    pub async fn resolve_listings_by_unit_ids(
        &self,
        unit_ids: &[String],
        cache: &mut ListingCache,
    ) -> Result<usize, PortError> {
        let mut seen = HashSet::new();
        let pending: Vec<String> = unit_ids
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .filter(|u| matches!(cache.lookup(u), ListingLookup::NotLooked))
            .filter(|u| seen.insert(u.to_string()))
            .map(str::to_string)
            .collect();

        let mut found = 0;
        for chunk in pending.chunks(self.listing_batch_size) {
            let batch = {
                let _timer = crate::time_call!("target", "resolve_listings_batch");
                self.store.find_listings_by_unit_ids(chunk).await
            };
            match batch {
                Ok(listings) => {
                    let mut by_unit: HashMap<String, ListingEntity> =
                        listings.into_iter().map(|l| (l.unit_id.clone(), l)).collect();
                    for unit_id in chunk {
                        let listing = by_unit.remove(unit_id);
                        found += usize::from(listing.is_some());
                        cache.record(unit_id.clone(), listing);
                    }
                    debug!(units = chunk.len(), "Prefetched listing chunk");
                }
                Err(err) => {
                    warn!(units = chunk.len(), error = %err, "Batched listing lookup failed, falling back to per-unit lookups");
                    for unit_id in chunk {
                        let listing = {
                            let _timer = crate::time_call!("target", "resolve_listing");
                            self.store.find_listing_by_unit_id(unit_id).await?
                        };
                        found += usize::from(listing.is_some());
                        cache.record(unit_id.clone(), listing);
                    }
                }
            }
        }
        Ok(found)
    }
}
