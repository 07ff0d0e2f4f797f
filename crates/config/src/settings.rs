use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub asr: AsrSettings,
    pub pipeline: PipelineSettings,
    pub quota: QuotaSettings,
    #[serde(default)]
    pub scheduling: SchedulingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

/// Where audio artifacts are fetched from.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// "s3" (any S3-compatible endpoint) or "local".
    pub backend: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    /// Root directory for the "local" backend.
    pub local_root: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AsrSettings {
    /// Active vendor: "azure", "groq" or "openai".
    pub provider: String,
    /// Model for the active vendor. None = vendor default.
    pub model: Option<String>,
    /// Recognition language hint passed to vendors that accept one.
    pub language: String,
    pub azure: AzureSettings,
    pub groq: OpenAiCompatibleSettings,
    pub openai: OpenAiCompatibleSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AzureSettings {
    pub key: Option<String>,
    pub region: Option<String>,
    /// Overrides the regional endpoint (tests, sovereign clouds).
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiCompatibleSettings {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineSettings {
    /// Work items processed in parallel within one batch. 1 = sequential.
    pub concurrency: usize,
    pub persist_attempts: u32,
    /// Linear backoff unit between persistence attempts.
    pub persist_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuotaSettings {
    /// Offset of the service's local timezone from UTC.
    pub utc_offset_hours: i32,
    /// Local hour at which the vendor's daily quota resets.
    pub reset_hour: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SchedulingSettings {
    #[serde(default)]
    pub blackouts: Vec<BlackoutSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlackoutSettings {
    pub device_id: String,
    pub start_hour: u32,
    pub end_hour: u32,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("KOE"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8013)?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "koe")?
            .set_default("storage.backend", "s3")?
            .set_default("storage.endpoint", "http://localhost:9000")?
            .set_default("storage.access_key", "minioadmin")?
            .set_default("storage.secret_key", "minioadmin")?
            .set_default("storage.bucket", "audio")?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.local_root", None::<String>)?
            .set_default("asr.provider", "groq")?
            .set_default("asr.model", None::<String>)?
            .set_default("asr.language", "ja")?
            .set_default("asr.azure.key", None::<String>)?
            .set_default("asr.azure.region", None::<String>)?
            .set_default("asr.azure.endpoint", None::<String>)?
            .set_default("asr.groq.api_key", None::<String>)?
            .set_default("asr.groq.base_url", "https://api.groq.com")?
            .set_default("asr.openai.api_key", None::<String>)?
            .set_default("asr.openai.base_url", "https://api.openai.com")?
            .set_default("pipeline.concurrency", 1)?
            .set_default("pipeline.persist_attempts", 3)?
            .set_default("pipeline.persist_backoff_ms", 1000)?
            .set_default("quota.utc_offset_hours", 9)?
            .set_default("quota.reset_hour", 9)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
