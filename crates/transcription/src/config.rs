use serde::{Deserialize, Serialize};

/// Provider selection and vendor credentials.
///
/// Built once from process configuration and handed to the
/// [`ProviderRegistry`](crate::ProviderRegistry); nothing here is re-read per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Active vendor: "azure", "groq" or "openai".
    pub provider: String,
    /// Model for the active vendor. None = vendor default.
    pub model: Option<String>,
    /// Language hint (ISO 639-1) for Whisper-style vendors.
    pub language: String,
    pub azure: AzureCredentials,
    pub groq: ApiCredentials,
    pub openai: ApiCredentials,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureCredentials {
    pub key: Option<String>,
    pub region: Option<String>,
    /// Replaces `https://{region}.stt.speech.microsoft.com` when set.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiCredentials {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: None,
            language: "ja".to_string(),
            azure: AzureCredentials::default(),
            groq: ApiCredentials {
                api_key: None,
                base_url: "https://api.groq.com".to_string(),
            },
            openai: ApiCredentials {
                api_key: None,
                base_url: "https://api.openai.com".to_string(),
            },
        }
    }
}
