use std::sync::Arc;

use koe_config::Settings;
use koe_services::{
    ArtifactRegistry, ObjectStore, Orchestrator, ProviderSource, RegistryProviders,
    TranscriptStore,
    dao::{AudioFileDao, TranscriptDao},
    providers::transcription_config,
    storage::{self, StorageError},
};
use koe_transcription::ProviderRegistry;
use mongodb::Database;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub providers: Arc<dyn ProviderSource>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Result<Self, StorageError> {
        let registry: Arc<dyn ArtifactRegistry> = Arc::new(AudioFileDao::new(&db));
        let transcripts: Arc<dyn TranscriptStore> = Arc::new(TranscriptDao::new(&db));
        let objects = storage::from_settings(&settings.storage)?;
        let providers: Arc<dyn ProviderSource> = Arc::new(RegistryProviders::new(
            ProviderRegistry::new(transcription_config(&settings.asr)),
        ));

        Ok(Self::from_components(
            settings,
            registry,
            transcripts,
            objects,
            providers,
        ))
    }

    /// Wires the pipeline over caller-supplied stores and providers.
    pub fn from_components(
        settings: Settings,
        registry: Arc<dyn ArtifactRegistry>,
        transcripts: Arc<dyn TranscriptStore>,
        objects: Arc<dyn ObjectStore>,
        providers: Arc<dyn ProviderSource>,
    ) -> Self {
        let orchestrator = Arc::new(
            Orchestrator::new(registry, transcripts, objects, providers.clone())
                .configured(&settings),
        );

        Self {
            settings,
            providers,
            orchestrator,
        }
    }
}
