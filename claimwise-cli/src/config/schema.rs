//! Configuration schema definitions.

use std::path::PathBuf;

use claimwise::docgen::OutputFormat;
use claimwise::message::ImageDetail;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimwiseConfig {
    /// OpenAI-compatible endpoint.
    #[serde(default)]
    pub openai: OpenAiSection,

    /// Model per role.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Where claim inputs come from.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Report rendering.
    #[serde(default)]
    pub docgen: DocGenConfig,
}

/// OpenAI endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiSection {
    /// API key. Falls back to `OPENAI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override for compatible servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

const fn default_model_timeout() -> u64 {
    120
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: default_model_timeout(),
        }
    }
}

/// Which model serves which role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    /// Domain classifier.
    #[serde(default = "default_guardrail_model")]
    pub guardrail: String,
    /// The three specialists.
    #[serde(default = "default_specialist_model")]
    pub specialist: String,
    /// Model behind the damage assessment tool.
    #[serde(default = "default_vision_model")]
    pub vision: String,
    /// Image detail requested from the vision model.
    #[serde(default = "default_image_detail")]
    pub image_detail: ImageDetail,
}

fn default_guardrail_model() -> String {
    "gpt-4o-mini".to_owned()
}

fn default_specialist_model() -> String {
    "gpt-4o".to_owned()
}

fn default_vision_model() -> String {
    "gpt-4o".to_owned()
}

const fn default_image_detail() -> ImageDetail {
    ImageDetail::High
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            guardrail: default_guardrail_model(),
            specialist: default_specialist_model(),
            vision: default_vision_model(),
            image_detail: default_image_detail(),
        }
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Step budget of each specialist.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Claims processed at once by `process-batch`.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Search results returned to the shop finder per query.
    #[serde(default = "default_shop_results")]
    pub shop_results: usize,
    /// Web search timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
}

const fn default_max_steps() -> usize {
    10
}

const fn default_concurrency() -> usize {
    claimwise::pipeline::DEFAULT_CONCURRENCY
}

const fn default_shop_results() -> usize {
    claimwise::claim::search::DEFAULT_MAX_RESULTS
}

const fn default_search_timeout() -> u64 {
    30
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            concurrency: default_concurrency(),
            shop_results: default_shop_results(),
            search_timeout_secs: default_search_timeout(),
        }
    }
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Records and photos in a local directory.
    #[default]
    Local,
    /// Records and photos in Box.
    Box,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend in use.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory of the local backend.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Box settings.
    #[serde(default, rename = "box")]
    pub box_api: BoxSection,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_root(),
            box_api: BoxSection::default(),
        }
    }
}

/// Box API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoxSection {
    /// Developer or access token. Falls back to `BOX_DEVELOPER_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// API base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_box_timeout")]
    pub timeout_secs: u64,
}

const fn default_box_timeout() -> u64 {
    60
}

impl Default for BoxSection {
    fn default() -> Self {
        Self {
            token: None,
            base_url: None,
            timeout_secs: default_box_timeout(),
        }
    }
}

/// Document generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocGenConfig {
    /// Submit a document job for every finished report.
    #[serde(default)]
    pub enabled: bool,
    /// Template file id.
    #[serde(default)]
    pub template_id: String,
    /// Destination folder id.
    #[serde(default)]
    pub folder_id: String,
    /// Output format.
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl ClaimwiseConfig {
    /// Validate the configuration and return any issues found.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.openai.api_key.as_deref().is_none_or(str::is_empty) {
            issues.push(ConfigIssue::warning(
                "openai.api_key",
                "No API key is set. Set OPENAI_API_KEY env var.",
            ));
        }

        for (path, model) in [
            ("models.guardrail", &self.models.guardrail),
            ("models.specialist", &self.models.specialist),
            ("models.vision", &self.models.vision),
        ] {
            if model.trim().is_empty() {
                issues.push(ConfigIssue::error(path, "Model name must not be empty"));
            }
        }

        if self.pipeline.max_steps == 0 {
            issues.push(ConfigIssue::error(
                "pipeline.max_steps",
                "Max steps must be at least 1",
            ));
        }

        if self.pipeline.concurrency == 0 {
            issues.push(ConfigIssue::warning(
                "pipeline.concurrency",
                "Concurrency is 0, batches will run one claim at a time",
            ));
        }

        if self.pipeline.shop_results == 0 {
            issues.push(ConfigIssue::error(
                "pipeline.shop_results",
                "The shop finder needs at least one search result",
            ));
        }

        let box_token_missing = self.storage.box_api.token.as_deref().is_none_or(str::is_empty);
        if self.storage.backend == StorageBackend::Box && box_token_missing {
            issues.push(ConfigIssue::warning(
                "storage.box.token",
                "Box storage is selected but no token is set. Set BOX_DEVELOPER_TOKEN env var.",
            ));
        }

        if self.docgen.enabled {
            if self.storage.backend != StorageBackend::Box {
                issues.push(ConfigIssue::error(
                    "docgen.enabled",
                    "Document generation requires the box storage backend",
                ));
            }
            if self.docgen.template_id.is_empty() {
                issues.push(ConfigIssue::error(
                    "docgen.template_id",
                    "Document generation is enabled but no template is set",
                ));
            }
            if self.docgen.folder_id.is_empty() {
                issues.push(ConfigIssue::error(
                    "docgen.folder_id",
                    "Document generation is enabled but no destination folder is set",
                ));
            }
        }

        issues
    }

    /// Check if the configuration is valid (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|issue| issue.level != IssueLevel::Error)
    }

    /// Merge environment variables into the configuration.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if self.openai.api_key.is_none()
            && let Ok(key) = std::env::var("OPENAI_API_KEY")
        {
            self.openai.api_key = Some(key);
        }

        if self.openai.base_url.is_none()
            && let Ok(url) = std::env::var("OPENAI_BASE_URL")
        {
            self.openai.base_url = Some(url);
        }

        if self.storage.box_api.token.is_none()
            && let Ok(token) = std::env::var("BOX_DEVELOPER_TOKEN")
        {
            self.storage.box_api.token = Some(token);
        }

        self
    }
}

/// Configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    /// Issue severity level.
    pub level: IssueLevel,
    /// Configuration path (e.g., "docgen.template_id").
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl ConfigIssue {
    /// Create an error-level issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a warning-level issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            IssueLevel::Error => "ERROR",
            IssueLevel::Warning => "WARN",
        };
        write!(f, "[{}] {}: {}", prefix, self.path, self.message)
    }
}

/// Severity level for configuration issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// Prevents claims from being processed.
    Error,
    /// Likely to fail at run time.
    Warning,
}
