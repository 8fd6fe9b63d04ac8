use crate::dtos::BlobParams;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use service_core::error::AppError;

/// Serve a blob through a presigned URL. The signature is the only credential.
pub async fn get_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<BlobParams>,
) -> Result<impl IntoResponse, AppError> {
    state
        .blobs
        .verify_presigned(&key, params.expires, &params.signature)
        .map_err(|e| {
            tracing::warn!(key = %key, "Rejected presigned blob request: {}", e);
            e
        })?;

    let data = state.blobs.get(&key).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    ))
}
