pub mod dao;
pub mod memory;
pub mod pipeline;
pub mod providers;
pub mod storage;
pub mod store;

pub use dao::*;
pub use pipeline::{BatchError, BatchRequest, BatchResult, Orchestrator};
pub use providers::{ProviderSource, RegistryProviders, StaticProviders};
pub use storage::{ObjectStore, StorageError};
pub use store::{ArtifactRegistry, TranscriptStore};
