// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Incremental lease fetcher.
//!
//! Two ways to build a work set:
//!
//! - [`IncrementalFetcher::fetch_since`]: offset-paginated pull of every lease
//!   changed since a checkpoint. A page shorter than the page size ends the
//!   pull. Page and record ceilings stop runaway pagination; hitting one is a
//!   warning and the partial result is returned.
//! - [`IncrementalFetcher::fetch_for_scope`]: every lease on an explicit set of
//!   units, grouped by property so one request covers a chunk of units.
//!
//! Transport errors propagate unchanged. No retries happen here.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::LeaseSyncConfig;
use crate::error::PortError;
use crate::lease::{LeaseRecord, UnitRef};
use crate::metrics;
use crate::ports::{LeaseSource, PageRequest};

/// Which pagination ceiling stopped a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLimit {
    MaxPages,
    MaxRecords,
}

impl SafetyLimit {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxPages => "max_pages",
            Self::MaxRecords => "max_records",
        }
    }
}

/// Leases fetched plus how the fetch ended.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub leases: Vec<LeaseRecord>,
    /// Requests issued to the source
    pub pages: usize,
    /// Set when a safety ceiling cut the fetch short
    pub limit: Option<SafetyLimit>,
}

impl FetchResult {
    /// Whether the result is partial because of a safety ceiling.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.limit.is_some()
    }

    /// Largest `last_updated` in the result; the next checkpoint candidate.
    #[must_use]
    pub fn max_last_updated(&self) -> Option<i64> {
        self.leases.iter().map(|l| l.last_updated).max()
    }
}

pub struct IncrementalFetcher {
    source: Arc<dyn LeaseSource>,
    page_size: usize,
    max_pages: usize,
    max_records: usize,
    lease_batch_size: usize,
}

impl IncrementalFetcher {
    pub fn new(source: Arc<dyn LeaseSource>, config: &LeaseSyncConfig) -> Self {
        Self {
            source,
            page_size: config.page_size.max(1),
            max_pages: config.max_pages,
            max_records: config.max_records,
            lease_batch_size: config.lease_batch_size.max(1),
        }
    }

    /// Fetch leases updated at or after `since` (epoch millis).
    ///
    /// `max_records` stops the pull once that many leases are collected,
    /// truncating the final page.
    pub async fn fetch_since(&self, since: i64, max_records: Option<usize>) -> Result<FetchResult, PortError> {
        let mut result = FetchResult::default();
        if max_records == Some(0) {
            debug!(since, "Zero records requested, skipping fetch");
            return Ok(result);
        }

        loop {
            if result.pages >= self.max_pages {
                result.limit = Some(SafetyLimit::MaxPages);
                break;
            }
            if result.leases.len() >= self.max_records {
                result.limit = Some(SafetyLimit::MaxRecords);
                break;
            }

            let request = PageRequest {
                limit: self.page_size,
                offset: result.pages * self.page_size,
            };
            let page = {
                let _timer = crate::time_call!("source", "fetch_page");
                self.source.list_leases_updated_since(since, request).await?
            };
            result.pages += 1;
            metrics::record_fetch_page(page.len());
            debug!(page = result.pages, offset = request.offset, records = page.len(), "Fetched lease page");

            let end_of_data = page.len() < self.page_size;
            result.leases.extend(page);

            if let Some(wanted) = max_records {
                if result.leases.len() >= wanted {
                    result.leases.truncate(wanted);
                    break;
                }
            }
            if result.leases.len() > self.max_records {
                result.leases.truncate(self.max_records);
                result.limit = Some(SafetyLimit::MaxRecords);
                break;
            }
            if end_of_data {
                break;
            }
        }

        if let Some(limit) = result.limit {
            metrics::record_safety_limit(limit.as_str());
            warn!(
                limit = limit.as_str(),
                pages = result.pages,
                records = result.leases.len(),
                "Safety limit reached, returning partial lease set"
            );
        }
        info!(since, pages = result.pages, records = result.leases.len(), "Incremental fetch complete");
        Ok(result)
    }

    /// Fetch every lease on the given units.
    ///
    /// Units that share a property are requested together in chunks of
    /// `lease_batch_size`; units without a property are requested one by one.
    /// Each lease appears once even if several requests return it.
    pub async fn fetch_for_scope(&self, units: &[UnitRef]) -> Result<FetchResult, PortError> {
        let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        let mut ungrouped: Vec<&str> = Vec::new();
        let mut seen_units = HashSet::new();

        for unit in units {
            if !seen_units.insert(unit.unit_id.as_str()) {
                continue;
            }
            match unit.property_id.as_deref() {
                Some(property) => grouped.entry(property).or_default().push(unit.unit_id.clone()),
                None => ungrouped.push(unit.unit_id.as_str()),
            }
        }

        let mut result = FetchResult::default();
        let mut seen_leases = HashSet::new();
        let mut collect = |leases: Vec<LeaseRecord>, result: &mut FetchResult| {
            for lease in leases {
                if seen_leases.insert(lease.id.clone()) {
                    result.leases.push(lease);
                }
            }
        };

        for (property, unit_ids) in &grouped {
            for chunk in unit_ids.chunks(self.lease_batch_size) {
                let leases = {
                    let _timer = crate::time_call!("source", "fetch_units_batch");
                    self.source.list_leases_for_units(property, chunk).await?
                };
                result.pages += 1;
                metrics::record_fetch_page(leases.len());
                debug!(property, units = chunk.len(), records = leases.len(), "Fetched leases for property chunk");
                collect(leases, &mut result);
            }
        }

        for unit_id in ungrouped {
            let leases = {
                let _timer = crate::time_call!("source", "fetch_unit");
                self.source.list_leases_for_unit(unit_id).await?
            };
            result.pages += 1;
            metrics::record_fetch_page(leases.len());
            debug!(unit_id, records = leases.len(), "Fetched leases for unit");
            collect(leases, &mut result);
        }

        info!(units = seen_units.len(), requests = result.pages, records = result.leases.len(), "Scoped fetch complete");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::LeaseStatus;
    use crate::ports::InMemoryLeaseSource;

    fn source_with(count: usize) -> Arc<InMemoryLeaseSource> {
        let source = InMemoryLeaseSource::new();
        for i in 0..count {
            source.add_lease(
                LeaseRecord::new(format!("L-{:05}", i), LeaseStatus::Active)
                    .with_unit(format!("U-{}", i % 7))
                    .with_last_updated(1_000 + i as i64),
            );
        }
        Arc::new(source)
    }

    fn config(page_size: usize) -> LeaseSyncConfig {
        LeaseSyncConfig { page_size, ..Default::default() }
    }

    #[tokio::test]
    async fn test_short_page_ends_pagination() {
        let source = source_with(1137);
        let fetcher = IncrementalFetcher::new(source.clone(), &config(500));

        let result = fetcher.fetch_since(0, None).await.unwrap();
        assert_eq!(result.leases.len(), 1137);
        assert_eq!(result.pages, 3);
        assert_eq!(source.page_calls(), 3);
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_page() {
        let source = source_with(20);
        let fetcher = IncrementalFetcher::new(source.clone(), &config(10));

        let result = fetcher.fetch_since(0, None).await.unwrap();
        assert_eq!(result.leases.len(), 20);
        assert_eq!(source.page_calls(), 3);
    }

    #[tokio::test]
    async fn test_max_records_truncates_and_stops_early() {
        let source = source_with(100);
        let fetcher = IncrementalFetcher::new(source.clone(), &config(10));

        let result = fetcher.fetch_since(0, Some(25)).await.unwrap();
        assert_eq!(result.leases.len(), 25);
        assert_eq!(source.page_calls(), 3);
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn test_zero_max_records_issues_no_request() {
        let source = source_with(10);
        let fetcher = IncrementalFetcher::new(source.clone(), &config(10));

        let result = fetcher.fetch_since(0, Some(0)).await.unwrap();
        assert!(result.leases.is_empty());
        assert_eq!(result.pages, 0);
        assert_eq!(source.page_calls(), 0);
    }

    #[tokio::test]
    async fn test_page_ceiling_returns_partial() {
        let source = source_with(100);
        let cfg = LeaseSyncConfig { page_size: 10, max_pages: 4, ..Default::default() };
        let fetcher = IncrementalFetcher::new(source.clone(), &cfg);

        let result = fetcher.fetch_since(0, None).await.unwrap();
        assert_eq!(result.leases.len(), 40);
        assert_eq!(result.limit, Some(SafetyLimit::MaxPages));
        assert_eq!(source.page_calls(), 4);
    }

    #[tokio::test]
    async fn test_record_ceiling_returns_partial() {
        let source = source_with(100);
        let cfg = LeaseSyncConfig { page_size: 10, max_records: 35, ..Default::default() };
        let fetcher = IncrementalFetcher::new(source.clone(), &cfg);

        let result = fetcher.fetch_since(0, None).await.unwrap();
        assert_eq!(result.leases.len(), 35);
        assert_eq!(result.limit, Some(SafetyLimit::MaxRecords));
    }

    #[tokio::test]
    async fn test_since_filters_and_checkpoint() {
        let source = source_with(50);
        let fetcher = IncrementalFetcher::new(source, &config(500));

        let result = fetcher.fetch_since(1_040, None).await.unwrap();
        assert_eq!(result.leases.len(), 10);
        assert_eq!(result.max_last_updated(), Some(1_049));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let source = source_with(10);
        source.set_fail_fetch(true);
        let fetcher = IncrementalFetcher::new(source, &config(500));

        let err = fetcher.fetch_since(0, None).await.unwrap_err();
        assert!(matches!(err, PortError::Transport(_)));
    }

    #[tokio::test]
    async fn test_scope_groups_by_property() {
        let source = source_with(70);
        let fetcher = IncrementalFetcher::new(source.clone(), &LeaseSyncConfig {
            lease_batch_size: 2,
            ..Default::default()
        });

        let units = vec![
            UnitRef::in_property("U-0", "P-1"),
            UnitRef::in_property("U-1", "P-1"),
            UnitRef::in_property("U-2", "P-1"),
            UnitRef::in_property("U-3", "P-2"),
            UnitRef::new("U-4"),
            UnitRef::new("U-4"),
        ];
        let result = fetcher.fetch_for_scope(&units).await.unwrap();

        // P-1 → 2 chunks, P-2 → 1 chunk, U-4 alone (deduplicated)
        assert_eq!(source.property_calls(), 3);
        assert_eq!(source.unit_calls(), 1);
        assert_eq!(result.pages, 4);
        assert_eq!(result.leases.len(), 50);
    }

    #[tokio::test]
    async fn test_scope_deduplicates_leases() {
        let source = Arc::new(InMemoryLeaseSource::with_leases([
            LeaseRecord::new("L-1", LeaseStatus::Active).with_unit("U-1"),
        ]));
        let fetcher = IncrementalFetcher::new(source.clone(), &LeaseSyncConfig::default());

        let units = vec![UnitRef::in_property("U-1", "P-1"), UnitRef::in_property("U-1", "P-2")];
        let result = fetcher.fetch_for_scope(&units).await.unwrap();
        assert_eq!(result.leases.len(), 1);
    }
}
