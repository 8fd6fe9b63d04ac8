use crate::dtos::{PresignedUrlResponse, RenameRequest, ResourceResponse};
use crate::middleware::CallerContext;
use crate::models::ResourceType;
use crate::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub async fn upload_file(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(dir_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
        })?
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file uploaded")))?;

    let name = field.file_name().unwrap_or("unnamed").to_string();
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    if name.is_empty() || name.chars().count() > 255 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "File name must be between 1 and 255 characters"
        )));
    }

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e)))?
        .to_vec();

    if data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "File too large (max 20MB)"
        )));
    }

    tracing::info!(
        parent_id = %dir_id,
        filename = %name,
        size = data.len(),
        "File upload started"
    );

    let file = state
        .service
        .create_file(&caller, &dir_id, &name, &mime_type, data)
        .await?;

    Ok((StatusCode::CREATED, Json(ResourceResponse::from(file))))
}

pub async fn get_file(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let file = state
        .service
        .get_meta(&caller, &file_id, ResourceType::File)
        .await?;
    Ok(Json(ResourceResponse::from(file)))
}

pub async fn rename_file(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(file_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let file = state
        .service
        .rename(&caller, &file_id, ResourceType::File, &req.name)
        .await?;
    Ok(Json(ResourceResponse::from(file)))
}

pub async fn delete_file(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .service
        .delete(&caller, &file_id, ResourceType::File)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_file(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (file, data) = state.service.download(&caller, &file_id).await?;

    let mime_type = file
        .file
        .as_ref()
        .map(|info| info.mime_type.clone())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file.name.replace('"', "")
    );

    Ok((
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}

pub async fn presign_file_url(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let presigned = state.service.presign_download(&caller, &file_id).await?;

    Ok(Json(PresignedUrlResponse {
        url: presigned.url,
        expires_in: presigned.expires_in,
    }))
}
