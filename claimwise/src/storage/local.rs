//! Directory-backed storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::claim::{CustomerRecord, RawClaim};
use crate::error::{Error, Result};

use super::{ContentStore, RecordSource};

/// Serves records and images from a root directory.
///
/// Image references that already are `http(s):` or `data:` URLs pass
/// through; anything else is read relative to the root and inlined as a
/// base64 `data:` URL. Record ids name JSON files; `.json` is appended when
/// the id has no extension.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let relative = Path::new(reference);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if reference.is_empty() || escapes {
            return Err(Error::storage(format!(
                "'{reference}' is not a path inside the store"
            )));
        }
        Ok(self.root.join(relative))
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        let mut path = self.resolve(id)?;
        if path.extension().is_none() {
            path.set_extension("json");
        }
        Ok(path)
    }

    async fn read_json(&self, id: &str) -> Result<serde_json::Value> {
        let path = self.record_path(id)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::storage(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::storage(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    async fn fetch_download_url(&self, file_id: &str) -> Result<String> {
        if ["http://", "https://", "data:"]
            .iter()
            .any(|scheme| file_id.starts_with(scheme))
        {
            return Ok(file_id.to_owned());
        }
        let path = self.resolve(file_id)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::storage(format!("{}: {e}", path.display())))?;
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        debug!(path = %path.display(), %mime, bytes = bytes.len(), "Inlined image");
        Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
    }
}

#[async_trait]
impl RecordSource for LocalStore {
    async fn load_customer(&self, id: &str) -> Result<CustomerRecord> {
        let value = self.read_json(id).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::storage(format!("customer record '{id}' is malformed: {e}")))
    }

    async fn load_claim(&self, id: &str) -> Result<RawClaim> {
        let value = self.read_json(id).await?;
        RawClaim::from_value(value)
            .map_err(|e| Error::storage(format!("claim '{id}' is malformed: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    const CUSTOMER: &str = r#"{
        "customer_name": "Jane Doe",
        "customer_address": "123 Main St, Springfield, IL 62704",
        "customer_policy_number": "POL-1",
        "customer_vehicle_year": "2023",
        "customer_vehicle_make": "Honda",
        "customer_vehicle_model": "Civic"
    }"#;

    mod content {
        use super::*;

        #[tokio::test]
        async fn urls_pass_through() {
            let store = LocalStore::new("/nonexistent");
            let url = store
                .fetch_download_url("https://img.example/a.jpg")
                .await
                .unwrap();
            assert_eq!(url, "https://img.example/a.jpg");
        }

        #[tokio::test]
        async fn files_become_data_urls() {
            let dir = TempDir::new().unwrap();
            dir.child("photos/front.png").write_binary(&[1, 2, 3]).unwrap();
            let store = LocalStore::new(dir.path());
            let url = store.fetch_download_url("photos/front.png").await.unwrap();
            assert_eq!(url, "data:image/png;base64,AQID");
        }

        #[tokio::test]
        async fn parent_components_are_rejected() {
            let dir = TempDir::new().unwrap();
            let store = LocalStore::new(dir.path());
            let err = store.fetch_download_url("../etc/passwd").await.unwrap_err();
            assert!(matches!(err, Error::Storage(_)));
        }

        #[tokio::test]
        async fn missing_file_is_a_storage_error() {
            let dir = TempDir::new().unwrap();
            let store = LocalStore::new(dir.path());
            assert!(matches!(
                store.fetch_download_url("nope.jpg").await,
                Err(Error::Storage(_))
            ));
        }
    }

    mod records {
        use super::*;

        #[tokio::test]
        async fn loads_customer_with_implied_extension() {
            let dir = TempDir::new().unwrap();
            dir.child("customers/jane.json").write_str(CUSTOMER).unwrap();
            let store = LocalStore::new(dir.path());
            let customer = store.load_customer("customers/jane").await.unwrap();
            assert_eq!(customer.customer_vehicle_year, 2023);
            assert_eq!(customer.vehicle_identity(), "2023 Honda Civic");
        }

        #[tokio::test]
        async fn customer_with_unknown_field_is_rejected() {
            let dir = TempDir::new().unwrap();
            dir.child("bad.json")
                .write_str(r#"{"customer_name": "x", "favorite_color": "red"}"#)
                .unwrap();
            let store = LocalStore::new(dir.path());
            assert!(matches!(store.load_customer("bad").await, Err(Error::Storage(_))));
        }

        #[tokio::test]
        async fn loads_claim() {
            let dir = TempDir::new().unwrap();
            dir.child("claim.json")
                .write_str(r#"{"claim_number": "CLM-5", "adjuster_name": "Sam"}"#)
                .unwrap();
            let store = LocalStore::new(dir.path());
            let claim = store.load_claim("claim.json").await.unwrap();
            assert_eq!(claim.claim_number(), "CLM-5");
        }

        #[tokio::test]
        async fn claim_without_number_is_rejected() {
            let dir = TempDir::new().unwrap();
            dir.child("claim.json").write_str(r#"{"adjuster_name": "Sam"}"#).unwrap();
            let store = LocalStore::new(dir.path());
            assert!(matches!(store.load_claim("claim").await, Err(Error::Storage(_))));
        }
    }
}
