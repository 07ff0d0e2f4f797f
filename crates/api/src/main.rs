use koe_api::{build_router, state::AppState};
use koe_config::Settings;
use koe_db::{connect, indexes::ensure_indexes};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "koe_api=debug,koe_services=debug,koe_db=debug,koe_transcription=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting koe API on {}:{}", settings.app.host, settings.app.port);
    info!(
        provider = %settings.asr.provider,
        model = ?settings.asr.model,
        storage = %settings.storage.backend,
        concurrency = settings.pipeline.concurrency,
        blackouts = settings.scheduling.blackouts.len(),
        "Pipeline config"
    );

    let db = connect(&settings).await?;
    ensure_indexes(&db).await?;

    let app_state = AppState::new(db, settings.clone())?;
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
