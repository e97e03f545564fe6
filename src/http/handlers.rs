use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::DownloadCheckResponse;
use crate::dashboard::{Dashboard, DashboardSnapshot, JobView, ObservabilityLinks, ServiceStatus};
use crate::downloads::{ErrorEntry, FileIdInput, JobId, ProbeOutcome};
use crate::health::HealthView;
use crate::http::response::AppError;

#[derive(Debug, Deserialize)]
pub struct FileIdRequest {
    #[serde(default)]
    pub file_id: FileIdInput,
}

pub async fn get_dashboard(State(dashboard): State<Arc<Dashboard>>) -> Json<DashboardSnapshot> {
    Json(dashboard.snapshot())
}

pub async fn get_health(State(dashboard): State<Arc<Dashboard>>) -> Json<HealthView> {
    Json(dashboard.health())
}

pub async fn get_jobs(State(dashboard): State<Arc<Dashboard>>) -> Json<Vec<JobView>> {
    Json(dashboard.jobs())
}

pub async fn get_job(
    State(dashboard): State<Arc<Dashboard>>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, AppError> {
    let job = JobId::parse(&id)
        .and_then(|id| dashboard.board().job(id))
        .ok_or_else(|| AppError::NotFound(format!("job {id}")))?;
    Ok(Json(dashboard.job_view(job)))
}

pub async fn create_job(
    State(dashboard): State<Arc<Dashboard>>,
    Json(request): Json<FileIdRequest>,
) -> Result<(StatusCode, Json<JobView>), AppError> {
    let job = dashboard
        .board()
        .start_download(&request.file_id.as_raw())
        .await?;
    Ok((StatusCode::CREATED, Json(dashboard.job_view(job))))
}

pub async fn get_errors(State(dashboard): State<Arc<Dashboard>>) -> Json<Vec<ErrorEntry>> {
    Json(dashboard.board().errors())
}

pub async fn check_download(
    State(dashboard): State<Arc<Dashboard>>,
    Json(request): Json<FileIdRequest>,
) -> Result<Json<DownloadCheckResponse>, AppError> {
    let response = dashboard
        .board()
        .check_download(&request.file_id.as_raw())
        .await?;
    Ok(Json(response))
}

pub async fn test_error_tracking(State(dashboard): State<Arc<Dashboard>>) -> Json<ProbeOutcome> {
    Json(dashboard.board().test_error_tracking().await)
}

pub async fn get_links(State(dashboard): State<Arc<Dashboard>>) -> Json<ObservabilityLinks> {
    Json(dashboard.links().clone())
}

pub async fn get_status(State(dashboard): State<Arc<Dashboard>>) -> Json<ServiceStatus> {
    Json(dashboard.status())
}
