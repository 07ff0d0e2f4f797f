pub mod asr;
pub mod config;
pub mod confidence;
pub mod registry;
pub mod retry;

pub use asr::{
    ProviderResult, RecognitionDetail, RecognitionError, RecognitionErrorKind,
    RecognitionOptions, RecognitionProvider, RecognitionWarning,
};
pub use config::TranscriptionConfig;
pub use registry::{ConfigurationError, ProviderRegistry};
pub use retry::RetryPolicy;
