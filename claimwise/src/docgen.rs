//! Hand-off of the finished report to document generation.
//!
//! Rendering is done by an external service from a template; this module
//! only shapes the report into the template's input and submits the job.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::claim::InsuranceReport;
use crate::error::{Error, Result};

/// Delimiter used when flattening list fields for templates.
pub const LIST_DELIMITER: &str = ", ";

/// Rendered document format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PDF.
    #[default]
    Pdf,
    /// Word document.
    Docx,
}

impl OutputFormat {
    /// Returns the API identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The report as template input.
///
/// Same shape as the serialized [`InsuranceReport`], with
/// `claim.affected_parts` flattened into one delimited string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DocGenPayload(Map<String, Value>);

impl DocGenPayload {
    /// Build the payload from a report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the report cannot be serialized.
    pub fn from_report(report: &InsuranceReport) -> Result<Self> {
        let Value::Object(mut map) = serde_json::to_value(report)? else {
            return Err(Error::docgen("report did not serialize to an object"));
        };
        if let Some(Value::Object(claim)) = map.get_mut("claim") {
            claim.insert(
                "affected_parts".to_owned(),
                Value::String(report.claim.affected_parts.join(LIST_DELIMITER)),
            );
        }
        Ok(Self(map))
    }

    /// The payload as a JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Where and how to render reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocGenTarget {
    /// Template file identifier.
    pub template_id: String,
    /// Destination folder identifier.
    pub folder_id: String,
    /// Output format.
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// One document generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocGenRequest {
    /// Template file identifier.
    pub template_id: String,
    /// Destination folder identifier.
    pub destination_folder_id: String,
    /// Output format.
    pub output_format: OutputFormat,
    /// Name of the generated file, without extension.
    pub file_name: String,
    /// Template input.
    pub payload: DocGenPayload,
}

impl DocGenRequest {
    /// Build the job for one report.
    ///
    /// # Errors
    ///
    /// See [`DocGenPayload::from_report`].
    pub fn for_report(target: &DocGenTarget, report: &InsuranceReport) -> Result<Self> {
        Ok(Self {
            template_id: target.template_id.clone(),
            destination_folder_id: target.folder_id.clone(),
            output_format: target.output_format,
            file_name: format!("claim-{}", report.claim_number),
            payload: DocGenPayload::from_report(report)?,
        })
    }
}

/// Handle of a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchHandle {
    /// Batch identifier returned by the service.
    pub id: String,
}

/// A document generation service.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Submit a job and return its batch handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocGen`] or [`Error::Http`] if the service rejects or
    /// cannot receive the job.
    async fn submit(&self, request: &DocGenRequest) -> Result<BatchHandle>;
}
