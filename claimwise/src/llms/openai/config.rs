//! Connection settings for the OpenAI client.

use std::time::Duration;

use crate::error::{LlmError, Result};

/// Where and how to reach an OpenAI-compatible Chat Completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Bearer token.
    pub api_key: String,
    /// API root, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model used when a request names none.
    pub model: String,
    /// Sent as `OpenAI-Organization` when set.
    pub organization: Option<String>,
    /// Deadline for one HTTP call. Nothing else bounds a model call.
    pub timeout: Duration,
}

impl OpenAIConfig {
    /// Public OpenAI endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    /// Vision-capable default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";
    /// Per-call deadline.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Defaults plus `api_key`.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read `OPENAI_API_KEY` (required) and the optional `OPENAI_BASE_URL`,
    /// `OPENAI_MODEL` and `OPENAI_ORGANIZATION`.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if `OPENAI_API_KEY` is unset.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::auth("openai", "OPENAI_API_KEY environment variable not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }
        config.organization = std::env::var("OPENAI_ORGANIZATION").ok();
        Ok(config)
    }

    /// Point at another compatible server.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Change the default model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bill calls to an organization.
    #[must_use]
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Change the per-call deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            model: Self::DEFAULT_MODEL.to_owned(),
            organization: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}
