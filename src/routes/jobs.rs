use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{queries, StoreError};
use crate::models::job::{CollectRequest, CollectionJob, JobStatus};
use crate::models::product::CollectedProduct;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_response(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(json!({ "detail": detail.into() })))
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound => error_response(StatusCode::NOT_FOUND, "job not found"),
        StoreError::Unavailable(_) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    fn clamped(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(50).clamp(1, 200);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub coalesced: bool,
    pub status_url: String,
    pub result_url: String,
}

#[derive(Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: CollectionJob,
    pub status_url: String,
    pub result_url: String,
}

impl From<CollectionJob> for JobView {
    fn from(job: CollectionJob) -> Self {
        let id = job.id;
        Self {
            job,
            status_url: format!("/v1/jobs/{id}"),
            result_url: format!("/v1/jobs/{id}/result"),
        }
    }
}

/// POST /v1/jobs — submit a collection job.
///
/// Returns before any collection work happens; poll the status URL for
/// progress.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<CollectRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    request
        .validate()
        .map_err(|e| error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let submission = state.runner.submit(request).await.map_err(store_error)?;
    let job_id = submission.job.id;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: submission.job.status,
            coalesced: submission.coalesced,
            status_url: format!("/v1/jobs/{job_id}"),
            result_url: format!("/v1/jobs/{job_id}/result"),
        }),
    ))
}

/// GET /v1/jobs — list jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (limit, offset) = pagination.clamped();
    let jobs = queries::list_jobs(&state.db, limit, offset)
        .await
        .map_err(store_error)?;

    let views: Vec<JobView> = jobs.into_iter().map(JobView::from).collect();
    Ok(Json(json!({ "jobs": views })))
}

/// GET /v1/jobs/{job_id} — job status and metadata.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, ApiError> {
    let job = queries::get_job(&state.db, job_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "job not found"))?;

    Ok(Json(JobView::from(job)))
}

#[derive(Serialize)]
pub struct ResultResponse {
    pub job_id: Uuid,
    pub count: usize,
    pub products: Vec<CollectedProduct>,
}

/// GET /v1/jobs/{job_id}/result — collected products of a finished job.
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ResultResponse>, ApiError> {
    let job = queries::get_job(&state.db, job_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "job not found"))?;

    match job.status {
        JobStatus::Failed => {
            let detail = job.error.unwrap_or_else(|| "job failed".to_string());
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, detail))
        }
        JobStatus::Pending | JobStatus::Running => {
            Err(error_response(StatusCode::CONFLICT, "job not completed"))
        }
        JobStatus::Succeeded => {
            let result_ref = job.result_ref.ok_or_else(|| {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "result pointer missing")
            })?;
            let result = queries::get_result(&state.db, result_ref)
                .await
                .map_err(store_error)?
                .ok_or_else(|| {
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, "result payload missing")
                })?;

            Ok(Json(ResultResponse {
                job_id,
                count: result.products.len(),
                products: result.products,
            }))
        }
    }
}
