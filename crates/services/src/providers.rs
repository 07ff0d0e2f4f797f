use std::collections::HashMap;
use std::sync::Arc;

use koe_config::AsrSettings;
use koe_transcription::config::{ApiCredentials, AzureCredentials};
use koe_transcription::{
    ConfigurationError, ProviderRegistry, RecognitionProvider, TranscriptionConfig,
};
use tracing::{info, warn};

/// Where the pipeline gets recognition providers from.
pub trait ProviderSource: Send + Sync {
    /// The configured provider, resolved once at construction.
    fn current(&self) -> Result<Arc<dyn RecognitionProvider>, ConfigurationError>;

    /// A request-scoped provider by vendor name.
    fn select(
        &self,
        name: &str,
        model: Option<&str>,
    ) -> Result<Arc<dyn RecognitionProvider>, ConfigurationError>;

    /// Vendor name and model of the configured provider, for reporting.
    fn describe_current(&self) -> (String, Option<String>);
}

pub fn transcription_config(settings: &AsrSettings) -> TranscriptionConfig {
    TranscriptionConfig {
        provider: settings.provider.clone(),
        model: settings.model.clone().filter(|m| !m.is_empty()),
        language: settings.language.clone(),
        azure: AzureCredentials {
            key: settings.azure.key.clone(),
            region: settings.azure.region.clone(),
            endpoint: settings.azure.endpoint.clone(),
        },
        groq: ApiCredentials {
            api_key: settings.groq.api_key.clone(),
            base_url: settings.groq.base_url.clone(),
        },
        openai: ApiCredentials {
            api_key: settings.openai.api_key.clone(),
            base_url: settings.openai.base_url.clone(),
        },
    }
}

/// Providers built by a [`ProviderRegistry`].
pub struct RegistryProviders {
    registry: ProviderRegistry,
    current: Result<Arc<dyn RecognitionProvider>, ConfigurationError>,
}

impl RegistryProviders {
    pub fn new(registry: ProviderRegistry) -> Self {
        let current = registry.current();
        match &current {
            Ok(provider) => info!(model = %provider.model_name(), "Recognition provider ready"),
            Err(e) => warn!(error = %e, "Configured recognition provider unavailable"),
        }
        Self { registry, current }
    }
}

impl ProviderSource for RegistryProviders {
    fn current(&self) -> Result<Arc<dyn RecognitionProvider>, ConfigurationError> {
        self.current.clone()
    }

    fn select(
        &self,
        name: &str,
        model: Option<&str>,
    ) -> Result<Arc<dyn RecognitionProvider>, ConfigurationError> {
        self.registry.create(name, model)
    }

    fn describe_current(&self) -> (String, Option<String>) {
        (self.registry.current_name(), self.registry.current_model())
    }
}

/// A fixed set of providers keyed by vendor name.
pub struct StaticProviders {
    current: String,
    providers: HashMap<String, Arc<dyn RecognitionProvider>>,
}

impl StaticProviders {
    pub fn new(current: Arc<dyn RecognitionProvider>) -> Self {
        let name = current.provider_name().to_ascii_lowercase();
        Self {
            current: name.clone(),
            providers: HashMap::from([(name, current)]),
        }
    }

    pub fn with(mut self, provider: Arc<dyn RecognitionProvider>) -> Self {
        self.providers
            .insert(provider.provider_name().to_ascii_lowercase(), provider);
        self
    }
}

impl ProviderSource for StaticProviders {
    fn current(&self) -> Result<Arc<dyn RecognitionProvider>, ConfigurationError> {
        self.select(&self.current, None)
    }

    fn select(
        &self,
        name: &str,
        _model: Option<&str>,
    ) -> Result<Arc<dyn RecognitionProvider>, ConfigurationError> {
        let name = name.trim().to_ascii_lowercase();
        self.providers
            .get(&name)
            .cloned()
            .ok_or(ConfigurationError::UnknownProvider(name))
    }

    fn describe_current(&self) -> (String, Option<String>) {
        let model = self
            .providers
            .get(&self.current)
            .map(|p| p.model_name());
        (self.current.clone(), model)
    }
}
