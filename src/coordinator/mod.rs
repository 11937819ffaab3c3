// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Run controller.
//!
//! The [`LeaseSyncEngine`] ties the components together and drives one run:
//!
//! ```text
//! fetch work set → for each lease:
//!     derive transition → scope guard → resolve listing + contacts
//!     → read edges → reconcile → stats
//! ```
//!
//! Leases are processed strictly one after another. Every lease runs inside
//! its own error boundary: a miss skips it, a scope violation or collaborator
//! failure counts as an error, and the loop moves on. Only a failed initial
//! fetch fails the run.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lease_sync::{LeaseSyncConfig, LeaseSyncEngine, RunOptions};
//! use lease_sync::ports::{InMemoryLeaseSource, InMemoryRelationshipStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), lease_sync::SyncError> {
//! let engine = LeaseSyncEngine::new(
//!     LeaseSyncConfig::default(),
//!     Arc::new(InMemoryLeaseSource::new()),
//!     Arc::new(InMemoryRelationshipStore::new()),
//!     None,
//! )?;
//!
//! let report = engine.sync_since(0, None, &RunOptions::new().dry_run(true)).await?;
//! println!("{}", report.stats);
//! # Ok(())
//! # }
//! ```

mod types;
mod run;
mod api;

pub use types::{LimitPolicy, RunOptions, SyncStats, SyncReport, LeaseOutcome, LeaseDisposition, PairOutcome};

use std::sync::Arc;

use crate::config::LeaseSyncConfig;
use crate::error::SyncError;
use crate::fetch::IncrementalFetcher;
use crate::ports::{LeaseSource, NoopObserver, RelationshipStore, SyncObserver};
use crate::reconcile::Reconciler;
use crate::resolve::EntityResolver;

/// Lease-lifecycle to association reconciliation engine.
pub struct LeaseSyncEngine {
    pub(super) config: LeaseSyncConfig,
    pub(super) observer: Arc<dyn SyncObserver>,
    pub(super) fetcher: IncrementalFetcher,
    pub(super) resolver: EntityResolver,
    pub(super) reconciler: Reconciler,
}

impl LeaseSyncEngine {
    /// Create an engine over the given collaborators.
    ///
    /// Without an observer, events go to a [`NoopObserver`]; `tracing`
    /// output is emitted either way.
    pub fn new(
        config: LeaseSyncConfig,
        source: Arc<dyn LeaseSource>,
        store: Arc<dyn RelationshipStore>,
        observer: Option<Arc<dyn SyncObserver>>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        Ok(Self {
            fetcher: IncrementalFetcher::new(source.clone(), &config),
            resolver: EntityResolver::new(source, store.clone(), config.listing_batch_size),
            reconciler: Reconciler::new(store),
            observer: observer.unwrap_or_else(|| Arc::new(NoopObserver)),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &LeaseSyncConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{InMemoryLeaseSource, InMemoryRelationshipStore};

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = LeaseSyncConfig { page_size: 0, ..Default::default() };
        let result = LeaseSyncEngine::new(
            config,
            Arc::new(InMemoryLeaseSource::new()),
            Arc::new(InMemoryRelationshipStore::new()),
            None,
        );
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_new_with_defaults() {
        let engine = LeaseSyncEngine::new(
            LeaseSyncConfig::default(),
            Arc::new(InMemoryLeaseSource::new()),
            Arc::new(InMemoryRelationshipStore::new()),
            None,
        )
        .unwrap();
        assert_eq!(engine.config().page_size, 500);
    }
}
