use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Anything that goes wrong while turning a request into a prediction.
/// Every variant is terminal for the request and is reported as a client
/// error carrying `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unrecognized {field}: {value}")]
    UnknownCategory { field: &'static str, value: String },

    #[error("inference failed: {0}")]
    Inference(String),
}

impl PredictError {
    pub fn inference(err: anyhow::Error) -> Self {
        Self::Inference(format!("{:#}", err))
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl From<JsonRejection> for PredictError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::warn!("request failed: {}", self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
