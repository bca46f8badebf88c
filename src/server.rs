use axum::{
    body::Bytes,
    extract::State,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    config::ServerConfig,
    encoder::RawInput,
    error::{PredictError, ValidationError},
    model::ModelState,
    types::PredictionOut,
};

const INDEX_HTML: &str = include_str!("../templates/index.html");

// ---------- Server state ----------

pub struct AppState {
    pub model: ModelState,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(model: ModelState, config: ServerConfig) -> Arc<Self> {
        Arc::new(Self { model, config })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .route("/health", get(health))
        .with_state(state)
}

// ---------- Handlers ----------

async fn home() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// The body is parsed by hand so that malformed JSON still gets the
// `{"error": "Prediction error: ..."}` shape and a 400.
async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictionOut>, PredictError> {
    if !state.model.is_ready() {
        tracing::warn!("predict called while model is unavailable");
        return Err(PredictError::ModelUnavailable);
    }

    let result = parse_body(&body)
        .map_err(PredictError::from)
        .and_then(|raw| state.model.predict(&raw, state.config.log_predictions));

    match result {
        Ok(out) => Ok(Json(out)),
        Err(e) => {
            tracing::warn!(error = %e, "prediction error");
            Err(e)
        }
    }
}

fn parse_body(body: &[u8]) -> Result<RawInput, ValidationError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ValidationError::InvalidBody(format!("got {}", type_name(&other)))),
        Err(e) => Err(ValidationError::InvalidBody(e.to_string())),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let ready = state.model.is_ready();
    Json(json!({
        "status": if ready { "ok" } else { "degraded" },
        "model_loaded": ready,
        "n_features": state.model.n_features(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_must_be_object() {
        assert!(parse_body(br#"{"Hours": 1}"#).is_ok());
        assert_eq!(
            parse_body(b"[1, 2]").unwrap_err(),
            ValidationError::InvalidBody("got an array".into())
        );
        assert!(matches!(
            parse_body(b"Speed_limit=30").unwrap_err(),
            ValidationError::InvalidBody(_)
        ));
    }
}
