use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::JsonBody;
use crate::logic::{validate_dataset, validate_result, ValidationError};
use crate::model::{
    is_zero_time, parse_key_time, Dataset, DetectionResult, GroundTruthPatch, InsertOutcome,
    Name, Recommendation, RecommendationTores, RenameOutcome, RenameResultRequest,
    ResponseMessage, ResultKey,
};
use crate::stats::KappaSource;
use crate::store::traits::Store;

/// Everything a request handler needs: the store and the kappa collaborator.
pub struct ServiceState<S> {
    pub store: S,
    pub kappa: Arc<dyn KappaSource>,
}

pub type AppState<S> = Arc<ServiceState<S>>;

impl<S: Store> ServiceState<S> {
    pub fn new(store: S, kappa: Arc<dyn KappaSource>) -> AppState<S> {
        Arc::new(Self { store, kappa })
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub(crate) fn stored(entity: &str, name: &str, outcome: InsertOutcome) -> Json<ResponseMessage> {
    let verb = match outcome {
        InsertOutcome::Inserted => "stored",
        InsertOutcome::Replaced => "replaced",
    };
    log::info!("{entity} {name} {verb}");
    Json(ResponseMessage::ok(format!("{entity} {name} {verb}")))
}

pub(crate) fn deleted(entity: &str, key: &str, removed: u64) -> Json<ResponseMessage> {
    log::info!("{entity} {key}: {removed} document(s) deleted");
    Json(ResponseMessage::ok(format!("{entity} successfully deleted")))
}

/// Parses the ISO-8601 date used as a key in delete and update paths.
pub(crate) fn path_date(raw: &str) -> ApiResult<chrono::DateTime<chrono::Utc>> {
    parse_key_time(raw).ok_or_else(|| ApiError::BadRequest(format!("Could not parse date '{raw}'")))
}

// Datasets

pub async fn post_dataset<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(dataset): JsonBody<Dataset>,
) -> ApiResult<Json<ResponseMessage>> {
    log::info!("post dataset {}", dataset.name);
    validate_dataset(&dataset)?;

    let name = dataset.name.clone();
    let outcome = state.store.upsert_dataset(dataset).await?;
    Ok(stored("Dataset", &name, outcome))
}

pub async fn post_ground_truth<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(patch): JsonBody<GroundTruthPatch>,
) -> ApiResult<Json<ResponseMessage>> {
    log::info!("post ground truth for dataset {}", patch.name);
    if patch.name.is_empty() {
        return Err(ApiError::NotFound("Dataset name is empty".to_string()));
    }

    let updated = state
        .store
        .update_ground_truth(&patch.name, patch.ground_truth)
        .await?;
    if !updated {
        return Err(ApiError::NotFound(format!(
            "Dataset {} does not exist",
            patch.name
        )));
    }
    Ok(Json(ResponseMessage::ok(format!(
        "Ground truth of dataset {} updated",
        patch.name
    ))))
}

/// Unknown names answer an empty dataset rather than 404.
pub async fn get_dataset<S: Store>(
    State(state): State<AppState<S>>,
    Path(name): Path<Name>,
) -> ApiResult<Json<Dataset>> {
    log::info!("get dataset {name}");
    let dataset = state.store.get_dataset(&name).await?;
    Ok(Json(dataset.unwrap_or_else(Dataset::not_found)))
}

pub async fn get_all_datasets<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Vec<Name>>> {
    Ok(Json(state.store.list_dataset_names().await?))
}

pub async fn delete_dataset<S: Store>(
    State(state): State<AppState<S>>,
    Path(name): Path<Name>,
) -> ApiResult<Json<ResponseMessage>> {
    let removed = state.store.delete_dataset(&name).await?;
    Ok(deleted("Dataset", &name, removed))
}

// Detection results

pub async fn post_result<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(result): JsonBody<DetectionResult>,
) -> ApiResult<Json<ResponseMessage>> {
    log::info!(
        "post result {} started at {}",
        result.method,
        result.started_at.to_rfc3339()
    );
    validate_result(&result)?;

    let key = format!("{}@{}", result.method, result.started_at.to_rfc3339());
    let outcome = state.store.upsert_result(result).await?;
    Ok(stored("Result", &key, outcome))
}

pub async fn post_result_name<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(request): JsonBody<RenameResultRequest>,
) -> ApiResult<Json<ResponseMessage>> {
    log::info!(
        "rename result {} started at {} to '{}'",
        request.method,
        request.started_at.to_rfc3339(),
        request.name
    );
    if request.method.is_empty() {
        return Err(ValidationError::MissingField {
            entity: "result",
            field: "method",
        }
        .into());
    }
    if is_zero_time(&request.started_at) {
        return Err(ValidationError::MissingField {
            entity: "result",
            field: "started_at",
        }
        .into());
    }

    let key = ResultKey::new(request.method, request.started_at);
    match state.store.rename_result(&key, &request.name).await? {
        RenameOutcome::Renamed => Ok(Json(ResponseMessage::ok(format!(
            "Result renamed to '{}'",
            request.name
        )))),
        RenameOutcome::NotFound => Err(ApiError::NotFound(format!(
            "No {} result started at {}",
            key.method,
            key.started_at.to_rfc3339()
        ))),
        RenameOutcome::Conflict { status } => Err(ApiError::StateConflict(format!(
            "Can not change name for result with status '{status}'"
        ))),
    }
}

pub async fn get_all_results<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<Json<Vec<DetectionResult>>> {
    Ok(Json(state.store.list_results().await?))
}

/// Deletes every result started at the given instant.
pub async fn delete_result<S: Store>(
    State(state): State<AppState<S>>,
    Path(raw): Path<String>,
) -> ApiResult<Json<ResponseMessage>> {
    let started_at = path_date(&raw)?;
    let removed = state.store.delete_results_started_at(started_at).await?;
    Ok(deleted("Result", &raw, removed))
}

// Recommendations

pub async fn post_recommendations<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(recommendations): JsonBody<Vec<Recommendation>>,
) -> ApiResult<Json<ResponseMessage>> {
    log::info!("replace recommendations with {} rows", recommendations.len());
    let count = state.store.replace_recommendations(recommendations).await?;
    Ok(Json(ResponseMessage::ok(format!(
        "{count} recommendations stored"
    ))))
}

pub async fn get_recommendation_tores<S: Store>(
    State(state): State<AppState<S>>,
    Path(codename): Path<String>,
) -> ApiResult<Json<RecommendationTores>> {
    log::info!("get recommendation tores for {codename}");
    let recommendation = state.store.get_recommendation(&codename).await?;
    Ok(Json(RecommendationTores::from(recommendation)))
}
