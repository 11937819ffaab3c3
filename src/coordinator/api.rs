//! Fetch-then-run entry points.
//!
//! - `sync_since()` - incremental pull from a checkpoint, then reconcile
//! - `sync_scope()` - every lease on an explicit unit set, reconciled under that scope

use serde_json::json;
use tracing::error;

use crate::error::{PortError, SyncError};
use crate::fetch::FetchResult;
use crate::lease::UnitRef;
use crate::scope::ProcessingScope;

use super::types::{RunOptions, SyncReport};
use super::LeaseSyncEngine;

impl LeaseSyncEngine {
    /// Reconcile every lease changed at or after `since` (epoch millis).
    ///
    /// `max_records` caps the fetch itself. Fails only when the fetch fails;
    /// persist `report.next_checkpoint` to resume from where this run ended.
    #[tracing::instrument(skip(self, options))]
    pub async fn sync_since(
        &self,
        since: i64,
        max_records: Option<usize>,
        options: &RunOptions,
    ) -> Result<SyncReport, SyncError> {
        let fetch = self
            .fetcher
            .fetch_since(since, max_records)
            .await
            .map_err(|e| self.fetch_failed(e, "since"))?;
        Ok(self.run_fetched(fetch, options).await)
    }

    /// Reconcile every lease on the given units.
    ///
    /// Unless the caller already set a bounded scope, the run is bounded to
    /// exactly these units so nothing outside them is ever written.
    #[tracing::instrument(skip(self, units, options), fields(units = units.len()))]
    pub async fn sync_scope(&self, units: &[UnitRef], options: &RunOptions) -> Result<SyncReport, SyncError> {
        let fetch = self
            .fetcher
            .fetch_for_scope(units)
            .await
            .map_err(|e| self.fetch_failed(e, "scope"))?;

        if options.scope.is_bounded() {
            Ok(self.run_fetched(fetch, options).await)
        } else {
            let scoped = options.clone().with_scope(ProcessingScope::from_unit_refs(units));
            Ok(self.run_fetched(fetch, &scoped).await)
        }
    }

    async fn run_fetched(&self, fetch: FetchResult, options: &RunOptions) -> SyncReport {
        if let Some(limit) = fetch.limit {
            self.observer.warn(
                "safety_limit_reached",
                &json!({ "limit": limit, "pages": fetch.pages, "records": fetch.leases.len() }),
            );
        }
        let limit = fetch.limit;
        let mut report = self.run_reconciliation(fetch.leases, options).await;
        report.fetch_limit = limit;
        report
    }

    fn fetch_failed(&self, err: PortError, mode: &str) -> SyncError {
        error!(mode, error = %err, "Initial lease fetch failed, aborting run");
        self.observer.error(&err, &json!({ "stage": "fetch", "mode": mode }));
        SyncError::Fetch(err)
    }
}
