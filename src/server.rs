use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::PredictError,
    predict::{round4, Dispatcher},
    types::{EmissionOut, HarshDrivingOut, TelemetryRecord},
};

pub type AppState = Dispatcher;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/predict-harsh-driving", post(predict_harsh_driving))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------- Handlers ----------

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<TelemetryRecord>, JsonRejection>,
) -> Result<Json<EmissionOut>, PredictError> {
    let Json(rec) = payload?;
    let emission = state.predict_emission(&rec)?;
    Ok(Json(EmissionOut {
        predicted_emission: round4(emission),
    }))
}

async fn predict_harsh_driving(
    State(state): State<AppState>,
    payload: Result<Json<TelemetryRecord>, JsonRejection>,
) -> Result<Json<HarshDrivingOut>, PredictError> {
    let Json(rec) = payload?;
    let assessment = state.assess_driving(&rec)?;
    Ok(Json(assessment.into()))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "emission_features": state.emission_features().len(),
        "harsh_features": state.harsh_features().len(),
    }))
}
