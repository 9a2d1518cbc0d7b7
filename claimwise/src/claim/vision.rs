//! Vehicle damage assessment over a vision-capable model.
//!
//! [`VisionDamageTool`] is the tool the image analyst calls. It sends the
//! claim photos as image content parts together with the vehicle identity,
//! constrains the answer to the strict [`DamageAssessment`] schema and
//! rejects anything that does not conform.
//!
//! The model never sees photo URLs. It names photos by the labels of the
//! claim task (`photo_1`, ...), and the tool bound to that task with
//! [`VisionDamageTool::bind`] resolves them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::agent::OutputSchema;
use crate::chat::{ChatRequest, SharedChatProvider};
use crate::error::{Error, Result, ToolError};
use crate::message::{ContentPart, ImageDetail, Message};
use crate::tool::Tool;

use super::schemas::{DamageAssessment, StructuredOutput};
use super::task::Photo;

/// System prompt of the vision call.
pub const VISION_INSTRUCTIONS: &str = "\
You are an experienced auto-body damage appraiser. You are given photos of a \
damaged vehicle and its year, make and model.

Describe the damage and list every part that needs repair or replacement. \
Do not stop at what is visible: based on the impact areas, also list damage \
that is likely but hidden, such as components inside the bumpers (crash \
absorbers, reinforcement bars, parking sensors, brackets), the radiator, \
condenser and cooling fans, headlamp and sensor mounts, airbag modules and \
crash sensors, suspension and steering geometry, the frame or unibody, and \
on electrified vehicles the battery pack, its enclosure and high-voltage \
wiring.

Answer with the JSON object only: a `description` of the damage and the \
`damaged_parts_list`. No explanation, no markdown.";

/// Input of [`VisionDamageTool::assess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionArgs {
    /// Photo URLs (`https:` or `data:`).
    pub image_urls: Vec<String>,
    /// Vehicle model year.
    pub vehicle_year: u16,
    /// Vehicle make.
    pub vehicle_make: String,
    /// Vehicle model.
    pub vehicle_model: String,
}

/// What the model passes when it calls the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessDamageArgs {
    /// Photo labels (`photo_1`, ...) or references from the claim task.
    pub photos: Vec<String>,
    /// Vehicle model year.
    pub vehicle_year: u16,
    /// Vehicle make.
    pub vehicle_make: String,
    /// Vehicle model.
    pub vehicle_model: String,
}

/// Turns claim photos plus vehicle metadata into a [`DamageAssessment`].
#[derive(Clone)]
pub struct VisionDamageTool {
    provider: SharedChatProvider,
    model: String,
    detail: ImageDetail,
    photos: Arc<[Photo]>,
}

impl VisionDamageTool {
    /// Create a tool calling `model` through `provider`.
    #[must_use]
    pub fn new(provider: SharedChatProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            detail: ImageDetail::High,
            photos: Arc::from([]),
        }
    }

    /// A copy of this tool that resolves the photos of one claim task.
    #[must_use]
    pub fn bind(&self, photos: &[Photo]) -> Self {
        Self {
            photos: photos.into(),
            ..self.clone()
        }
    }

    /// Map photo labels or references to URLs, in the order given.
    fn resolve(&self, names: &[String]) -> std::result::Result<Vec<String>, ToolError> {
        names
            .iter()
            .map(|name| {
                let name = name.trim();
                self.photos
                    .iter()
                    .enumerate()
                    .find(|(index, photo)| Photo::label(*index) == name || photo.reference == name)
                    .map(|(_, photo)| photo.url.clone())
                    .ok_or_else(|| {
                        ToolError::invalid_args(format!(
                            "unknown photo `{name}`; use the labels photo_1 to photo_{}",
                            self.photos.len()
                        ))
                    })
            })
            .collect()
    }

    /// Set the image detail level sent with each photo.
    #[must_use]
    pub const fn with_detail(mut self, detail: ImageDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Returns the vision model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one assessment.
    ///
    /// # Errors
    ///
    /// - [`Error::Llm`] if the vision call fails
    /// - [`Error::SchemaViolation`] if the answer is empty, not JSON, has
    ///   missing or extra fields, or fails [`DamageAssessment::validate`]
    pub async fn assess(&self, args: &VisionArgs) -> Result<DamageAssessment> {
        let schema = OutputSchema::from_type::<DamageAssessment>();
        let mut parts = vec![ContentPart::text(format!(
            "Vehicle: {} {} {}. Assess the damage in the {} photo(s) below.",
            args.vehicle_year,
            args.vehicle_make,
            args.vehicle_model,
            args.image_urls.len()
        ))];
        parts.extend(
            args.image_urls
                .iter()
                .map(|url| ContentPart::image_url(url.as_str(), self.detail)),
        );

        let request = ChatRequest::new(self.model.as_str())
            .system(VISION_INSTRUCTIONS)
            .message(Message::user_parts(parts))
            .response_format(schema.to_response_format());

        if !self.provider.supports_vision() {
            warn!(provider = self.provider.provider_name(), "Provider does not advertise image input");
        }
        debug!(model = %self.model, images = args.image_urls.len(), "Requesting damage assessment");
        let response = self.provider.chat(&request).await?;
        if response.stop_reason.is_truncated() {
            return Err(Error::schema_violation(
                DamageAssessment::SCHEMA,
                format!("answer cut short ({:?})", response.stop_reason),
            ));
        }

        let text = response.text().unwrap_or_default();
        if text.trim().is_empty() {
            return Err(Error::schema_violation(
                DamageAssessment::SCHEMA,
                "vision model returned no content",
            ));
        }
        let assessment: DamageAssessment = serde_json::from_str(&text)
            .map_err(|e| Error::schema_violation(DamageAssessment::SCHEMA, e.to_string()))?;
        assessment.validate()?;
        Ok(assessment)
    }
}

impl std::fmt::Debug for VisionDamageTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionDamageTool")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.model)
            .field("detail", &self.detail)
            .field("photos", &self.photos.len())
            .finish()
    }
}

#[async_trait]
impl Tool for VisionDamageTool {
    const NAME: &'static str = "assess_vehicle_damage";
    type Args = AssessDamageArgs;
    type Output = DamageAssessment;
    type Error = ToolError;

    fn description(&self) -> String {
        "Assess the damage to a vehicle from claim photos. Returns a description of \
         the damage and the list of damaged parts, including likely hidden damage."
            .to_owned()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "photos": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Labels of every damage photo, e.g. photo_1"
                },
                "vehicle_year": {
                    "type": "integer",
                    "description": "Vehicle model year"
                },
                "vehicle_make": {
                    "type": "string",
                    "description": "Vehicle make, e.g. Honda"
                },
                "vehicle_model": {
                    "type": "string",
                    "description": "Vehicle model, e.g. Civic"
                }
            },
            "required": ["photos", "vehicle_year", "vehicle_make", "vehicle_model"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: Self::Args) -> std::result::Result<Self::Output, Self::Error> {
        if args.photos.is_empty() {
            return Err(ToolError::invalid_args("photos must not be empty"));
        }
        let request = VisionArgs {
            image_urls: self.resolve(&args.photos)?,
            vehicle_year: args.vehicle_year,
            vehicle_make: args.vehicle_make,
            vehicle_model: args.vehicle_model,
        };
        self.assess(&request).await.map_err(ToolError::from)
    }
}
