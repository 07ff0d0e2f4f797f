use std::sync::Arc;

use tracing::debug;

use crate::asr::RecognitionProvider;
use crate::asr::azure::AzureSpeechProvider;
use crate::asr::openai_compatible::OpenAiCompatibleProvider;
use crate::config::{ApiCredentials, TranscriptionConfig};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Unsupported provider: {0}")]
    UnknownProvider(String),
    #[error("Missing credentials for {provider}: {detail}")]
    MissingCredentials { provider: String, detail: String },
}

/// Builds recognition providers from configuration.
///
/// The registry holds no global selection: `current()` reads the configured
/// pair, request-scoped overrides go through `create`.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    config: TranscriptionConfig,
    retry_override: Option<RetryPolicy>,
}

impl ProviderRegistry {
    pub const SUPPORTED: [&'static str; 3] = [
        AzureSpeechProvider::NAME,
        OpenAiCompatibleProvider::GROQ,
        OpenAiCompatibleProvider::OPENAI,
    ];

    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            config,
            retry_override: None,
        }
    }

    /// Replaces every vendor's default retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry_override = Some(retry);
        self
    }

    pub fn supported() -> &'static [&'static str] {
        &Self::SUPPORTED
    }

    pub fn default_model(name: &str) -> Option<&'static str> {
        match name.to_ascii_lowercase().as_str() {
            AzureSpeechProvider::NAME => Some(AzureSpeechProvider::DEFAULT_MODEL),
            OpenAiCompatibleProvider::GROQ => Some(OpenAiCompatibleProvider::GROQ_DEFAULT_MODEL),
            OpenAiCompatibleProvider::OPENAI => {
                Some(OpenAiCompatibleProvider::OPENAI_DEFAULT_MODEL)
            }
            _ => None,
        }
    }

    /// Name of the configured vendor, lowercased.
    pub fn current_name(&self) -> String {
        self.config.provider.to_ascii_lowercase()
    }

    /// Model the configured vendor would use.
    pub fn current_model(&self) -> Option<String> {
        self.config
            .model
            .clone()
            .or_else(|| Self::default_model(&self.config.provider).map(str::to_string))
    }

    /// Whether `create` for the configured vendor would find credentials.
    pub fn is_configured(&self, name: &str) -> bool {
        match name.to_ascii_lowercase().as_str() {
            AzureSpeechProvider::NAME => {
                has_value(&self.config.azure.key)
                    && (has_value(&self.config.azure.region)
                        || has_value(&self.config.azure.endpoint))
            }
            OpenAiCompatibleProvider::GROQ => has_value(&self.config.groq.api_key),
            OpenAiCompatibleProvider::OPENAI => has_value(&self.config.openai.api_key),
            _ => false,
        }
    }

    /// The provider named by configuration.
    pub fn current(&self) -> Result<Arc<dyn RecognitionProvider>, ConfigurationError> {
        self.create(&self.config.provider, self.config.model.as_deref())
    }

    /// Builds a provider by vendor name. `model` falls back to the vendor default.
    pub fn create(
        &self,
        name: &str,
        model: Option<&str>,
    ) -> Result<Arc<dyn RecognitionProvider>, ConfigurationError> {
        let name = name.trim().to_ascii_lowercase();
        let default_model = Self::default_model(&name)
            .ok_or_else(|| ConfigurationError::UnknownProvider(name.clone()))?;
        let model = model.filter(|m| !m.is_empty()).unwrap_or(default_model);
        debug!(provider = %name, model, "Creating recognition provider");

        let provider: Arc<dyn RecognitionProvider> = match name.as_str() {
            AzureSpeechProvider::NAME => {
                let key = required(&self.config.azure.key, &name, "azure.key")?;
                let provider = match (&self.config.azure.endpoint, &self.config.azure.region) {
                    (Some(endpoint), _) if !endpoint.is_empty() => {
                        AzureSpeechProvider::with_base_url(key, endpoint, model)
                    }
                    (_, region) => {
                        let region = required(region, &name, "azure.region")?;
                        AzureSpeechProvider::new(key, region, model)
                    }
                };
                match self.retry_override {
                    Some(retry) => Arc::new(provider.with_retry_policy(retry)),
                    None => Arc::new(provider),
                }
            }
            OpenAiCompatibleProvider::GROQ => {
                let key = api_key(&self.config.groq, &name, "groq.api_key")?;
                let provider = OpenAiCompatibleProvider::groq(
                    key,
                    &self.config.groq.base_url,
                    model,
                    &self.config.language,
                );
                Arc::new(self.apply_retry(provider))
            }
            _ => {
                let key = api_key(&self.config.openai, &name, "openai.api_key")?;
                let provider = OpenAiCompatibleProvider::openai(
                    key,
                    &self.config.openai.base_url,
                    model,
                    &self.config.language,
                );
                Arc::new(self.apply_retry(provider))
            }
        };
        Ok(provider)
    }

    fn apply_retry(&self, provider: OpenAiCompatibleProvider) -> OpenAiCompatibleProvider {
        match self.retry_override {
            Some(retry) => provider.with_retry_policy(retry),
            None => provider,
        }
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn required<'a>(
    value: &'a Option<String>,
    provider: &str,
    field: &str,
) -> Result<&'a str, ConfigurationError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigurationError::MissingCredentials {
            provider: provider.to_string(),
            detail: format!("{field} is not set"),
        })
}

fn api_key<'a>(
    credentials: &'a ApiCredentials,
    provider: &str,
    field: &str,
) -> Result<&'a str, ConfigurationError> {
    required(&credentials.api_key, provider, field)
}
