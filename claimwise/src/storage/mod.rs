//! External collaborators that supply a run's inputs.
//!
//! - [`ContentStore`]: resolves image references to fetchable URLs
//! - [`RecordSource`]: loads the customer record and the raw claim
//!
//! [`LocalStore`] serves both from a directory; [`BoxClient`] from the Box
//! content API.

mod box_api;
mod local;

use std::sync::Arc;

use async_trait::async_trait;

use crate::claim::{CustomerRecord, RawClaim};
use crate::error::Result;

pub use box_api::{BOX_API_URL, BoxClient};
pub use local::LocalStore;

/// Resolves file references to URLs a vision model can fetch.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Return a download URL for `file_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`](crate::Error::Storage) or
    /// [`Error::Http`](crate::Error::Http) if the file cannot be resolved.
    async fn fetch_download_url(&self, file_id: &str) -> Result<String>;
}

/// Loads the records a claim run starts from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Load a customer record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`](crate::Error::Storage) if the record is
    /// missing or does not match the fixed `customer_*` schema.
    async fn load_customer(&self, id: &str) -> Result<CustomerRecord>;

    /// Load a raw claim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`](crate::Error::Storage) if the claim is
    /// missing or not a JSON object with a `claim_number`.
    async fn load_claim(&self, id: &str) -> Result<RawClaim>;
}

/// A content store shared across concurrent runs.
pub type SharedContentStore = Arc<dyn ContentStore>;

/// A record source shared across concurrent runs.
pub type SharedRecordSource = Arc<dyn RecordSource>;
