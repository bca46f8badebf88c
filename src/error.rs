use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub const MODEL_UNAVAILABLE_MSG: &str = "Model is not loaded properly. Check server logs.";

/// Client input that cannot be turned into a feature vector.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("request body is not a JSON object: {0}")]
    InvalidBody(String),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' must be numeric, got {got}")]
    NotNumeric { field: &'static str, got: String },
    #[error("field '{field}' must be an integer, got {got}")]
    NotInteger { field: &'static str, got: String },
    #[error("field '{field}' must be a string, got {got}")]
    NotText { field: &'static str, got: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("feature schema is empty")]
    EmptySchema,
    #[error("feature length mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
    #[error("classifier failed: {0}")]
    Classifier(String),
}

/// Everything that can go wrong on the `/predict` path.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("{}", MODEL_UNAVAILABLE_MSG)]
    ModelUnavailable,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PredictError {
    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::ModelUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            PredictError::Validation(_) | PredictError::Inference(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            PredictError::ModelUnavailable => MODEL_UNAVAILABLE_MSG.to_string(),
            other => format!("Prediction error: {}", other),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            PredictError::ModelUnavailable.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PredictError::from(ValidationError::MissingField("Speed_limit")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PredictError::from(InferenceError::EmptySchema).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn validation_message_names_the_field() {
        let e = PredictError::from(ValidationError::MissingField("Speed_limit"));
        assert_eq!(e.to_string(), "missing required field 'Speed_limit'");
    }
}
