use crate::dtos::{ChildrenResponse, CreateDirectoryRequest, RenameRequest, ResourceResponse};
use crate::middleware::CallerContext;
use crate::models::ResourceType;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_directory(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<CreateDirectoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let dir = state
        .service
        .create_directory(&caller, req.parent_id.as_deref(), &req.name)
        .await?;

    Ok((StatusCode::CREATED, Json(ResourceResponse::from(dir))))
}

pub async fn get_directory(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(dir_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let dir = state
        .service
        .get_meta(&caller, &dir_id, ResourceType::Dir)
        .await?;
    Ok(Json(ResourceResponse::from(dir)))
}

pub async fn rename_directory(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(dir_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let dir = state
        .service
        .rename(&caller, &dir_id, ResourceType::Dir, &req.name)
        .await?;
    Ok(Json(ResourceResponse::from(dir)))
}

pub async fn delete_directory(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(dir_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .service
        .delete(&caller, &dir_id, ResourceType::Dir)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_children(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(dir_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let children = state.service.list_children(&caller, &dir_id).await?;

    Ok(Json(ChildrenResponse {
        dir_id,
        children: children.into_iter().map(ResourceResponse::from).collect(),
    }))
}
