//! `/preview/` handlers, grounded on `preview/__init__.py`'s
//! `handle_get`/`handle_post` routing and response-form selection.

use std::path::PathBuf;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path as AxumPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use pvs_core::coordinator::{response_form, PreviewOutcome, ResponseForm};
use pvs_core::request::{OutputFormat, PageRange, StoreFlag};
use pvs_core::source::FileSource;
use pvs_core::{MediaError, PathRef, PreviewRequest};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct PreviewQuery {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub pages: Option<String>,
    pub store: Option<String>,
    pub url: Option<String>,
}

/// `GET /preview/{*path}` -- the input is a reference to a file already
/// visible under the configured files root.
pub async fn get_preview(
    State(state): State<AppState>,
    AxumPath(relative): AxumPath<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, AppError> {
    let src = FileSource::from_server_path(&state.config.files_root, &relative).await?;
    let origin_path = src.path().to_path_buf();
    let req = build_request(&state, &relative, &query, src, Some(relative.clone()))?;
    respond(state, req, Some(origin_path)).await
}

/// `POST /preview` -- the input is either a multipart file upload or a
/// `url` field naming a remote origin to download.
pub async fn post_preview(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut query = PreviewQuery::default();
    let mut upload: Option<(String, PathRef)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::Media(pvs_core::MediaError::bad_input(format!("bad multipart body: {e}")))
    })? {
        match field.name().unwrap_or_default() {
            "width" => query.width = field_value(field).await?.and_then(|v| v.parse().ok()),
            "height" => query.height = field_value(field).await?.and_then(|v| v.parse().ok()),
            "format" => query.format = field_value(field).await?,
            "pages" => query.pages = field_value(field).await?,
            "store" => query.store = field_value(field).await?,
            "url" => query.url = field_value(field).await?,
            "file" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let src = ingest_upload_field(field, &name, state.config.max_file_size).await?;
                upload = Some((name, src));
            }
            _ => {}
        }
    }

    let (name, src) = if let Some((name, src)) = upload {
        (name, src)
    } else if let Some(url) = &query.url {
        let src = FileSource::from_url(&state.http_client, url, state.config.max_file_size).await?;
        let name = url.rsplit('/').next().unwrap_or("download").to_string();
        (name, src)
    } else {
        return Err(AppError::MissingInput);
    };

    let origin = query.url.clone();
    let req = build_request(&state, &name, &query, src, origin)?;
    respond(state, req, None).await
}

/// Streams a multipart file field to a temp file chunk by chunk,
/// failing as soon as `max_file_size` is exceeded rather than buffering
/// the whole upload in memory first, mirroring how [`FileSource::from_url`]
/// enforces the same cap against its byte stream.
async fn ingest_upload_field(mut field: Field<'_>, name_hint: &str, max_file_size: u64) -> Result<PathRef, AppError> {
    let ext = std::path::Path::new(name_hint)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let dest = std::env::temp_dir().join(format!("pvs-{}.{ext}", uuid::Uuid::new_v4()));
    let mut file = tokio::fs::File::create(&dest)
        .await
        .map_err(|e| AppError::Media(MediaError::internal(format!("failed to create upload temp file: {e}"))))?;

    let mut received: u64 = 0;
    loop {
        let chunk = field
            .chunk()
            .await
            .map_err(|e| AppError::Media(MediaError::bad_input(format!("bad upload: {e}"))))?;
        let Some(chunk) = chunk else { break };

        received += chunk.len() as u64;
        if max_file_size > 0 && received > max_file_size {
            drop(file);
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(AppError::Media(MediaError::bad_input("upload exceeds max file size")));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Media(MediaError::internal(format!("failed to write upload chunk: {e}"))))?;
    }
    file.flush().await.map_err(|e| AppError::Media(MediaError::internal(format!("failed to flush upload: {e}"))))?;
    drop(file);

    PathRef::new_temp(dest).await.map_err(AppError::Media)
}

async fn field_value(field: axum::extract::multipart::Field<'_>) -> Result<Option<String>, AppError> {
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::Media(pvs_core::MediaError::bad_input(format!("bad form field: {e}"))))?;
    Ok(Some(String::from_utf8_lossy(&bytes).trim().to_string()).filter(|s| !s.is_empty()))
}

fn build_request(
    state: &AppState,
    name: &str,
    query: &PreviewQuery,
    src: pvs_core::PathRef,
    origin: Option<String>,
) -> Result<PreviewRequest, AppError> {
    let format = OutputFormat::parse(query.format.as_deref().unwrap_or(&state.config.default_format))
        .map_err(AppError::Media)?;
    let width = query.width.unwrap_or(state.config.default_width);
    let height = query.height.unwrap_or(state.config.default_height);
    if width == 0 || height == 0 {
        return Err(AppError::Media(pvs_core::MediaError::bad_input("width and height must be positive")));
    }
    let pages = PageRange::parse(query.pages.as_deref(), state.config.max_pages).map_err(AppError::Media)?;
    let store = StoreFlag::parse(query.store.as_deref());

    Ok(PreviewRequest::new(name.to_string(), format, width, height, pages, store, origin, src))
}

async fn respond(state: AppState, req: PreviewRequest, origin_path: Option<PathBuf>) -> Result<Response, AppError> {
    let outcome = state.coordinator.handle(req, origin_path.as_deref()).await.map_err(AppError::Media)?;

    if let ResponseForm::AccelRedirect(target) = response_form(&state.config.x_accel_redirect, &outcome) {
        return Ok(accel_redirect_response(&target));
    }

    serve_outcome(&state, outcome).await
}

fn accel_redirect_response(target: &str) -> Response {
    let mut resp = StatusCode::OK.into_response();
    resp.headers_mut().insert("X-Accel-Redirect", target.parse().unwrap());
    resp
}

async fn serve_outcome(state: &AppState, outcome: PreviewOutcome) -> Result<Response, AppError> {
    let content_type = guess_content_type(outcome.path());
    // An icon fallback is never a genuine 200 for the requested preview;
    // it must not be cached by the caller as if it were one.
    let is_icon = matches!(outcome, PreviewOutcome::Icon(_));

    let bytes = tokio::fs::read(outcome.path())
        .await
        .map_err(|e| AppError::Media(pvs_core::MediaError::internal(format!("failed to read output: {e}"))))?;

    if let PreviewOutcome::Generated(path_ref) = outcome {
        path_ref.cleanup().await;
    }

    let mut response = bytes.into_response();
    response.headers_mut().insert(header::CONTENT_TYPE, content_type.parse().unwrap());
    if !is_icon {
        if let Some(cache_control) = state.config.cache_control {
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, format!("public, max-age={}", cache_control.as_secs()).parse().unwrap());
        }
    }
    Ok(response)
}

fn guess_content_type(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
