use crate::dtos::{
    AccessParams, AccessResponse, AuthorizedGroupsResponse, GrantResponse, PermissionRequest,
};
use crate::middleware::CallerContext;
use crate::models::ActionType;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn grant_permission(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(resource_id): Path<String>,
    Json(req): Json<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let actions = ActionType::parse_set(req.actions.as_slice())?;

    let grant = state
        .service
        .grant(&caller, &resource_id, &req.group_id, &actions)
        .await?;

    Ok(Json(GrantResponse::from_grant(grant)))
}

pub async fn revoke_permission(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(resource_id): Path<String>,
    Json(req): Json<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let actions = ActionType::parse_set(req.actions.as_slice())?;

    let remaining = state
        .service
        .revoke(&caller, &resource_id, &req.group_id, &actions)
        .await?;

    let response = match remaining {
        Some(grant) => GrantResponse::from_grant(grant),
        None => GrantResponse::removed(&resource_id, &req.group_id),
    };
    Ok(Json(response))
}

pub async fn list_authorized_groups(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(resource_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let groups = state
        .service
        .authorized_groups(&caller, &resource_id)
        .await?;

    Ok(Json(AuthorizedGroupsResponse {
        resource_id,
        groups: groups.into_iter().collect(),
    }))
}

pub async fn check_access(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(resource_id): Path<String>,
    Query(params): Query<AccessParams>,
) -> Result<impl IntoResponse, AppError> {
    let action: ActionType = params.action.parse()?;

    let allowed = state
        .service
        .check_access(&caller, &resource_id, action)
        .await?;

    Ok(Json(AccessResponse {
        resource_id,
        action,
        allowed,
    }))
}
