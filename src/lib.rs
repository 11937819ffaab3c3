//! # Lease Sync
//!
//! Keeps tenant ↔ listing associations in a relationship graph consistent
//! with the lifecycle status of leases held in a source-of-record.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Incremental Fetcher                       │
//! │  • Offset pagination from a checkpoint, page/record ceilings│
//! │  • Scoped fetch grouped by property                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  work set
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Run Controller (one lease at a time)           │
//! │  status ──► Lifecycle State Machine ──► target + transition │
//! │  lease  ──► Scope Guard                                     │
//! │  unit   ──► Resolver + per-run Listing Cache ──► listing    │
//! │  tenant ──► Resolver ──► contact                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  (contact, listing, target)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Relationship Reconciler                     │
//! │  • Target present → zero writes                             │
//! │  • Remove transition-eligible edges, add target             │
//! │  • Dry-run: same plan, writes suppressed                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use lease_sync::{LeaseRecord, LeaseStatus, LeaseSyncConfig, LeaseSyncEngine, RunOptions, TenantRecord};
//! use lease_sync::ports::{InMemoryLeaseSource, InMemoryRelationshipStore};
//! use lease_sync::AssociationType;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(InMemoryRelationshipStore::new());
//! store.add_contact("C-1", "jane@example.com");
//! store.add_listing("LST-1", "U1");
//! store.add_edge("C-1", "LST-1", AssociationType::FutureTenant);
//!
//! let lease = LeaseRecord::new("L-1", LeaseStatus::Active)
//!     .with_unit("U1")
//!     .with_tenant(TenantRecord::new("T-1", Some("jane@example.com"), "Jane"));
//!
//! let engine = LeaseSyncEngine::new(
//!     LeaseSyncConfig::default(),
//!     Arc::new(InMemoryLeaseSource::new()),
//!     store.clone(),
//!     None,
//! ).unwrap();
//!
//! let report = engine.run_reconciliation(vec![lease], &RunOptions::new()).await;
//! assert_eq!(report.stats.future_to_active, 1);
//! assert_eq!(store.edge_types("C-1", "LST-1"), vec![AssociationType::ActiveTenant]);
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`LeaseSyncEngine`] run controller and [`SyncStats`]
//! - [`fetch`]: Incremental and scoped lease fetching
//! - [`lifecycle`]: Status → association type state machine
//! - [`resolve`]: Contact/listing resolution and the per-run listing cache
//! - [`reconcile`]: Edge diffing and application
//! - [`scope`]: Processing-boundary guard
//! - [`ports`]: Collaborator traits plus in-memory implementations
//! - [`metrics`]: `metrics`-crate instrumentation

pub mod config;
pub mod error;
pub mod lease;
pub mod association;
pub mod lifecycle;
pub mod ports;
pub mod fetch;
pub mod resolve;
pub mod reconcile;
pub mod scope;
pub mod coordinator;
pub mod metrics;

pub use config::LeaseSyncConfig;
pub use error::{PortError, LeaseError, ResolutionMiss, Stage, SyncError};
pub use lease::{LeaseRecord, LeaseStatus, TenantRecord, UnitRef};
pub use association::{AssociationType, AssociationEdge, ContactEntity, ListingEntity};
pub use lifecycle::{derive_transition, Transition, TransitionType};
pub use fetch::{IncrementalFetcher, FetchResult, SafetyLimit};
pub use resolve::{EntityResolver, ListingCache, ListingLookup};
pub use reconcile::{plan_reconciliation, PlannedEdges, Reconciler, ReconcilePlan, ReconcileOutcome};
pub use scope::{assert_in_scope, ProcessingScope, ScopeCheck};
pub use coordinator::{
    LeaseSyncEngine, RunOptions, LimitPolicy, SyncStats, SyncReport, LeaseOutcome, LeaseDisposition, PairOutcome,
};
pub use ports::{LeaseSource, RelationshipStore, SyncObserver, PageRequest};
pub use crate::metrics::LatencyTimer;
