//! Handlers shared by both crawler job kinds. Routes pick the job type.

use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::JsonBody;
use crate::api::handlers::{deleted, path_date, stored, AppState};
use crate::model::{ResponseMessage, ScheduledJob};
use crate::store::traits::JobStore;

pub async fn get_jobs<S, J>(State(state): State<AppState<S>>) -> ApiResult<Json<Vec<J>>>
where
    S: JobStore<J>,
    J: ScheduledJob,
{
    Ok(Json(<S as JobStore<J>>::list_jobs(&state.store).await?))
}

pub async fn post_job<S, J>(
    State(state): State<AppState<S>>,
    JsonBody(job): JsonBody<J>,
) -> ApiResult<Json<ResponseMessage>>
where
    S: JobStore<J>,
    J: ScheduledJob,
{
    let date = job.date().to_rfc3339();
    log::info!("post {} {date}", J::KIND);
    let outcome = <S as JobStore<J>>::upsert_job(&state.store, job).await?;
    Ok(stored(J::KIND, &date, outcome))
}

pub async fn delete_job<S, J>(
    State(state): State<AppState<S>>,
    Path(raw): Path<String>,
) -> ApiResult<Json<ResponseMessage>>
where
    S: JobStore<J>,
    J: ScheduledJob,
{
    let date = path_date(&raw)?;
    let removed = <S as JobStore<J>>::delete_job(&state.store, date).await?;
    Ok(deleted(J::KIND, &raw, removed))
}

/// Resets the occurrence counter of the job registered at the given date.
pub async fn reset_job_occurrence<S, J>(
    State(state): State<AppState<S>>,
    Path(raw): Path<String>,
) -> ApiResult<Json<ResponseMessage>>
where
    S: JobStore<J>,
    J: ScheduledJob,
{
    let date = path_date(&raw)?;
    log::info!("reset occurrence of {} {raw}", J::KIND);
    if !<S as JobStore<J>>::reset_job_occurrence(&state.store, date).await? {
        return Err(ApiError::NotFound(format!("No {} at {raw}", J::KIND)));
    }
    Ok(Json(ResponseMessage::ok(format!(
        "Occurrence of {} reset",
        J::KIND
    ))))
}
