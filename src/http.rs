//! HTTP adapter for the prediction service
//!
//! Thin axum handlers translating JSON bodies into `PredictionService` calls
//! and `AppError` values into status codes.

use crate::error::{AppError, AppResult};
use crate::models::{Competitor, PredictionRecord, TimeKeyInput};
use crate::repositories::RecordStore;
use crate::services::ForecastRequest;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, warn};

/// JSON body extractor whose rejections use the `AppError` response shape
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidValue(rejection.body_text())
    }
}

/// Body of `POST /forecast_prices/`
#[derive(Debug, Deserialize)]
pub struct ForecastPricesBody {
    pub sku: String,
    #[serde(alias = "date")]
    pub time_key: TimeKeyInput,
}

/// Body of `POST /update_actual/:observation_id`
#[derive(Debug, Deserialize)]
pub struct UpdateActualBody {
    pub actual_price: f64,
}

/// Body of `POST /actual_prices/`
#[derive(Debug, Deserialize)]
pub struct ActualPricesBody {
    pub sku: String,
    #[serde(alias = "date")]
    pub time_key: TimeKeyInput,
    #[serde(rename = "pvp_is_competitorA_actual", default)]
    pub competitor_a_actual: Option<f64>,
    #[serde(rename = "pvp_is_competitorB_actual", default)]
    pub competitor_b_actual: Option<f64>,
}

impl ActualPricesBody {
    /// Supplied actual prices, in competitor order
    fn actuals(&self) -> Vec<(Competitor, f64)> {
        [
            (Competitor::A, self.competitor_a_actual),
            (Competitor::B, self.competitor_b_actual),
        ]
        .into_iter()
        .filter_map(|(competitor, actual)| actual.map(|a| (competitor, a)))
        .collect()
    }
}

/// Build the application router
pub fn router<S: RecordStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health::<S>))
        .route("/predict", post(predict::<S>))
        .route("/forecast_prices/", post(forecast_prices::<S>))
        .route("/update_actual/:observation_id", post(update_actual::<S>))
        .route("/actual_prices/", post(actual_prices::<S>))
        .route("/records/", get(list_records::<S>))
        .route("/predictions", get(list_records::<S>))
        .route("/records/:observation_id", get(get_record::<S>))
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({ "message": "Forecast price API is live." }))
}

async fn health<S: RecordStore>(State(state): State<Arc<AppState<S>>>) -> AppResult<Json<Value>> {
    state.predictions.health().await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn predict<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    AppJson(body): AppJson<ForecastRequest>,
) -> AppResult<(StatusCode, Json<PredictionRecord>)> {
    let record = state.predictions.forecast(body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn forecast_prices<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    AppJson(body): AppJson<ForecastPricesBody>,
) -> AppResult<Json<Value>> {
    let records = state.predictions.forecast_all(&body.sku, &body.time_key).await?;

    let mut response = Map::new();
    let mut observation_ids = Map::new();
    if let Some(first) = records.first() {
        response.insert("sku".into(), json!(first.sku));
        response.insert("time_key".into(), json!(first.time_key));
    }
    for record in &records {
        response.insert(record.competitor.price_field(), json!(record.predicted_price));
        observation_ids.insert(record.competitor.as_str().into(), json!(record.observation_id));
    }
    response.insert("observation_ids".into(), Value::Object(observation_ids));

    Ok(Json(Value::Object(response)))
}

async fn update_actual<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(observation_id): Path<String>,
    AppJson(body): AppJson<UpdateActualBody>,
) -> AppResult<Json<PredictionRecord>> {
    let record = state
        .predictions
        .update_actual(&observation_id, body.actual_price)
        .await?;
    Ok(Json(record))
}

async fn actual_prices<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    AppJson(body): AppJson<ActualPricesBody>,
) -> AppResult<Json<Value>> {
    let records = state
        .predictions
        .update_actuals_by_key(&body.sku, &body.time_key, &body.actuals())
        .await?;

    let mut response = Map::new();
    for record in &records {
        response.insert("sku".into(), json!(record.sku));
        response.insert("time_key".into(), json!(record.time_key));
        response.insert(record.competitor.price_field(), json!(record.predicted_price));
        response.insert(record.competitor.actual_price_field(), json!(record.actual_price));
    }

    Ok(Json(Value::Object(response)))
}

async fn list_records<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
) -> AppResult<Json<Vec<PredictionRecord>>> {
    Ok(Json(state.predictions.list_records().await?))
}

async fn get_record<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(observation_id): Path<String>,
) -> AppResult<Json<PredictionRecord>> {
    Ok(Json(state.predictions.get_record(&observation_id).await?))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self);
        }

        let body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}
