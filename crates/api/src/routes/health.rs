use axum::{Json, extract::State};

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (provider, model) = state.providers.describe_current();
    Json(serde_json::json!({
        "status": "ok",
        "service": "koe",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": provider,
        "model": model,
        "provider_configured": state.providers.current().is_ok(),
    }))
}
