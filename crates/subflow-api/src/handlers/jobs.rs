//! Job lifecycle handlers: create, poll, download, cancel.

use std::path::{Path as FsPath, PathBuf};

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::info;
use uuid::Uuid;

use subflow_models::{Job, JobId, JobKind, JobStatus};
use subflow_worker::sync::{SYNC_SUBTITLE_NAME, SYNC_VIDEO_PREFIX};
use subflow_worker::{spawn_job, TranslateParams};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
}

/// Upload fields collected from the multipart form.
#[derive(Default)]
struct UploadForm {
    kind: Option<String>,
    source_lang: Option<String>,
    target_lang: Option<String>,
    file: Option<(String, Vec<u8>)>,
    subtitles: Option<Vec<u8>>,
}

/// `POST /jobs` — create a job from a multipart upload and start its worker.
///
/// Fields: `kind` (convert|remux|sync|translate), `file` (the media or
/// subtitle input), `subtitles` (sync jobs only), `source_lang` and
/// `target_lang` (translate jobs, optional).
pub async fn create_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "kind" => form.kind = Some(read_text(field).await?),
            "source_lang" => form.source_lang = Some(read_text(field).await?),
            "target_lang" => form.target_lang = Some(read_text(field).await?),
            "file" => {
                let filename = field.file_name().unwrap_or("input").to_string();
                let bytes = read_bytes(field).await?;
                form.file = Some((filename, bytes));
            }
            "subtitles" => form.subtitles = Some(read_bytes(field).await?),
            _ => {}
        }
    }

    let kind_str = form
        .kind
        .ok_or_else(|| ApiError::bad_request("missing 'kind' field"))?;
    let kind = JobKind::parse(&kind_str)
        .ok_or_else(|| ApiError::bad_request(format!("unknown job kind '{}'", kind_str)))?;
    let (filename, file) = form
        .file
        .ok_or_else(|| ApiError::bad_request("missing 'file' field"))?;

    let input_ref = stage_input(&state, kind, &filename, file, form.subtitles).await?;
    let job = state.manager.create_job(kind.as_str(), &input_ref).await?;

    let params = TranslateParams {
        source_lang: form.source_lang.unwrap_or_else(|| "auto".to_string()),
        target_lang: form.target_lang.unwrap_or_else(|| "English".to_string()),
    };
    spawn_job(state.worker_ctx.clone(), job.clone(), params);

    info!(job_id = %job.id, kind = %kind, "Job accepted");
    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse { job_id: job.id }),
    ))
}

/// `GET /jobs/:job_id` — poll job status. Idempotent.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.manager.get_job(&JobId::from_string(job_id)).await?;
    Ok(Json(job))
}

/// `GET /jobs/:job_id/download` — stream the output artifact of a
/// completed job.
pub async fn download_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job = state.manager.get_job(&JobId::from_string(job_id)).await?;

    if job.status != JobStatus::Completed {
        return Err(ApiError::conflict(format!(
            "job is {}, not completed",
            job.status
        )));
    }
    let output_ref = job
        .output_ref
        .ok_or_else(|| ApiError::internal("completed job has no output reference"))?;

    let path = PathBuf::from(&output_ref);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::Gone(format!("artifact for job {} no longer exists", job.id)))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&path).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// `POST /jobs/:job_id/cancel` — request cooperative cancellation.
/// Rejected with 409 if the job is already terminal.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.manager.cancel_job(&JobId::from_string(job_id)).await?;
    Ok(Json(job))
}

/// Write the upload into a staging directory and return the worker's
/// `input_ref`: a file path for most kinds, a directory for sync jobs.
async fn stage_input(
    state: &AppState,
    kind: JobKind,
    filename: &str,
    file: Vec<u8>,
    subtitles: Option<Vec<u8>>,
) -> ApiResult<String> {
    let staging = state
        .worker_ctx
        .config
        .work_dir
        .join("uploads")
        .join(Uuid::new_v4().to_string());
    tokio::fs::create_dir_all(&staging)
        .await
        .map_err(|e| ApiError::internal(format!("cannot create staging dir: {}", e)))?;

    let ext = FsPath::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(match kind {
            JobKind::Translate => "srt",
            _ => "mkv",
        });

    let input_ref = match kind {
        JobKind::Sync => {
            let subtitles = subtitles
                .ok_or_else(|| ApiError::bad_request("sync jobs require a 'subtitles' field"))?;
            write_file(
                &staging.join(format!("{}.{}", SYNC_VIDEO_PREFIX, ext)),
                &file,
            )
            .await?;
            write_file(&staging.join(SYNC_SUBTITLE_NAME), &subtitles).await?;
            staging
        }
        _ => {
            let path = staging.join(format!("input.{}", ext));
            write_file(&path, &file).await?;
            path
        }
    };

    Ok(input_ref.to_string_lossy().to_string())
}

async fn write_file(path: &FsPath, bytes: &[u8]) -> ApiResult<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ApiError::internal(format!("cannot store upload: {}", e)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("unreadable field: {}", e)))
}

async fn read_bytes(field: axum::extract::multipart::Field<'_>) -> ApiResult<Vec<u8>> {
    Ok(field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("unreadable upload: {}", e)))?
        .to_vec())
}

fn content_type_for(path: &FsPath) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("srt") => "application/x-subrip",
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
