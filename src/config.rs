//! Configuration for the lease sync engine.
//!
//! # Example
//!
//! ```
//! use lease_sync::LeaseSyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = LeaseSyncConfig::default();
//! assert_eq!(config.page_size, 500);
//! assert_eq!(config.max_pages, 100);
//!
//! // Tighter ceilings for a smoke run
//! let config = LeaseSyncConfig {
//!     max_pages: 2,
//!     dry_run: true,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::Deserialize;

use crate::error::SyncError;

/// Configuration for the lease sync engine.
///
/// All fields have defaults matching the source API's paging limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseSyncConfig {
    /// Records requested per page from the source system
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Hard ceiling on pages fetched by one incremental pull
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Hard ceiling on records fetched by one incremental pull
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Unit ids per batched listing lookup
    #[serde(default = "default_listing_batch_size")]
    pub listing_batch_size: usize,

    /// Unit ids per batched lease lookup (grouped by property)
    #[serde(default = "default_lease_batch_size")]
    pub lease_batch_size: usize,

    /// Compute decisions without writing associations
    #[serde(default)]
    pub dry_run: bool,
}

fn default_page_size() -> usize { 500 }
fn default_max_pages() -> usize { 100 }
fn default_max_records() -> usize { 50_000 }
fn default_listing_batch_size() -> usize { 100 }
fn default_lease_batch_size() -> usize { 50 }

impl Default for LeaseSyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            max_records: default_max_records(),
            listing_batch_size: default_listing_batch_size(),
            lease_batch_size: default_lease_batch_size(),
            dry_run: false,
        }
    }
}

impl LeaseSyncConfig {
    /// Reject settings that would make pagination or batching loop forever.
    pub fn validate(&self) -> Result<(), SyncError> {
        let zeroes = [
            ("page_size", self.page_size),
            ("max_pages", self.max_pages),
            ("max_records", self.max_records),
            ("listing_batch_size", self.listing_batch_size),
            ("lease_batch_size", self.lease_batch_size),
        ];
        for (name, value) in zeroes {
            if value == 0 {
                return Err(SyncError::Config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }
}
