//! Box content API client.
//!
//! Covers the three calls a claim run needs: resolve a file to its download
//! URL, download a JSON record, and submit a Doc Gen batch. The bearer token
//! is configuration; obtaining and refreshing it happens elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header, redirect};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crate::claim::{CustomerRecord, RawClaim};
use crate::docgen::{BatchHandle, DocGenRequest, DocumentGenerator};
use crate::error::{Error, Result};

use super::{ContentStore, RecordSource};

/// Default Box API base URL.
pub const BOX_API_URL: &str = "https://api.box.com/2.0/";

/// Client for the Box content and Doc Gen APIs.
#[derive(Clone)]
pub struct BoxClient {
    token: String,
    base_url: Url,
    /// Never follows redirects, so the `302` location can be read.
    api: Client,
    download: Client,
}

#[derive(Debug, Deserialize)]
struct BoxErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    id: String,
}

impl BoxClient {
    /// Create a client with a developer or access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP clients cannot be built.
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        let download = Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(BOX_API_URL)
            .map_err(|e| Error::storage(format!("invalid Box API URL: {e}")))?;
        Ok(Self {
            token: token.into(),
            base_url,
            api,
            download,
        })
    }

    /// Use another API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if `base_url` is not a valid URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_owned()
        } else {
            format!("{base_url}/")
        };
        self.base_url = Url::parse(&normalized)
            .map_err(|e| Error::storage(format!("invalid Box API URL '{base_url}': {e}")))?;
        Ok(self)
    }

    /// The API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::storage(format!("invalid Box path '{path}': {e}")))
    }

    async fn api_error(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<BoxErrorBody>(&body).map_or_else(
            |_| format!("HTTP {}: {body}", status.as_u16()),
            |err| format!("HTTP {} {}: {}", status.as_u16(), err.code, err.message),
        )
    }

    async fn download_json(&self, file_id: &str) -> Result<Value> {
        let url = self.fetch_download_url(file_id).await?;
        let response = self.download.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::storage(format!(
                "download of file {file_id} failed: {}",
                Self::api_error(response).await
            )));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::storage(format!("file {file_id} is not JSON: {e}")))
    }
}

impl std::fmt::Debug for BoxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ContentStore for BoxClient {
    async fn fetch_download_url(&self, file_id: &str) -> Result<String> {
        let url = self.endpoint(&format!("files/{file_id}/content"))?;
        let response = self.api.get(url).bearer_auth(&self.token).send().await?;

        match response.status() {
            StatusCode::FOUND | StatusCode::TEMPORARY_REDIRECT | StatusCode::SEE_OTHER => response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .ok_or_else(|| {
                    Error::storage(format!("redirect for file {file_id} has no location"))
                }),
            StatusCode::ACCEPTED => Err(Error::storage(format!(
                "file {file_id} is not ready for download yet"
            ))),
            _ => Err(Error::storage(format!(
                "cannot resolve file {file_id}: {}",
                Self::api_error(response).await
            ))),
        }
    }
}

#[async_trait]
impl RecordSource for BoxClient {
    async fn load_customer(&self, id: &str) -> Result<CustomerRecord> {
        let value = self.download_json(id).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::storage(format!("customer record {id} is malformed: {e}")))
    }

    async fn load_claim(&self, id: &str) -> Result<RawClaim> {
        let value = self.download_json(id).await?;
        RawClaim::from_value(value).map_err(|e| Error::storage(format!("claim {id} is malformed: {e}")))
    }
}

#[async_trait]
impl DocumentGenerator for BoxClient {
    async fn submit(&self, request: &DocGenRequest) -> Result<BatchHandle> {
        let url = self.endpoint("docgen_batches")?;
        let body = batch_body(request);
        debug!(template = %request.template_id, file = %request.file_name, "Submitting Doc Gen batch");

        let response = self
            .api
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::docgen(Self::api_error(response).await));
        }
        let batch: BatchResponse = response.json().await?;
        info!(batch_id = %batch.id, "Doc Gen batch submitted");
        Ok(BatchHandle { id: batch.id })
    }
}

fn batch_body(request: &DocGenRequest) -> Value {
    json!({
        "file": {"id": request.template_id, "type": "file"},
        "input_source": "api",
        "destination_folder": {"id": request.destination_folder_id, "type": "folder"},
        "output_type": request.output_format.as_str(),
        "document_generation_data": [{
            "generated_file_name": request.file_name,
            "user_input": request.payload,
        }],
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::docgen::{DocGenPayload, OutputFormat};

    fn client() -> BoxClient {
        BoxClient::new("token", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoints_join_under_the_api_root() {
        let client = client();
        assert_eq!(
            client.endpoint("files/123/content").unwrap().as_str(),
            "https://api.box.com/2.0/files/123/content"
        );
        let custom = client.with_base_url("http://localhost:8080/2.0").unwrap();
        assert_eq!(
            custom.endpoint("docgen_batches").unwrap().as_str(),
            "http://localhost:8080/2.0/docgen_batches"
        );
    }

    #[test]
    fn debug_hides_the_token() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("token\""));
        assert!(debug.contains("api.box.com"));
    }

    #[test]
    fn batch_body_shape() {
        let report = crate::claim::InsuranceReport {
            claim_number: "CLM-1".into(),
            claim: crate::claim::ClaimFields::default(),
            customer: serde_json::from_value(json!({
                "customer_name": "Jane Doe",
                "customer_address": "123 Main St",
                "customer_policy_number": "POL-1",
                "customer_vehicle_year": 2023,
                "customer_vehicle_make": "Honda",
                "customer_vehicle_model": "Civic"
            }))
            .unwrap(),
            repair_shops: crate::claim::RepairShopSet::default(),
        };
        let request = DocGenRequest {
            template_id: "tpl".into(),
            destination_folder_id: "fld".into(),
            output_format: OutputFormat::Pdf,
            file_name: "claim-CLM-1".into(),
            payload: DocGenPayload::from_report(&report).unwrap(),
        };
        let body = batch_body(&request);
        assert_eq!(body["file"]["id"], "tpl");
        assert_eq!(body["destination_folder"]["type"], "folder");
        assert_eq!(body["output_type"], "pdf");
        assert_eq!(
            body["document_generation_data"][0]["user_input"]["claim_number"],
            "CLM-1"
        );
    }
}
