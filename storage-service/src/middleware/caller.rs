//! Caller identity extracted from headers set by the trusted front end.
//!
//! `X-User-ID` is required. `X-Group-IDs` is a comma separated list of the
//! caller's group memberships; missing means no groups. Group membership is
//! resolved upstream and never looked up by this service.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use std::collections::HashSet;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const GROUP_IDS_HEADER: &str = "X-Group-IDs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: String,
    pub group_ids: HashSet<String>,
}

impl CallerContext {
    pub fn new<I, S>(user_id: impl Into<String>, group_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            group_ids: group_ids.into_iter().map(Into::into).collect(),
        }
    }

    fn parse_groups(raw: &str) -> HashSet<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing X-User-ID header (required from front end)"
                ))
            })?;

        let group_ids = match parts.headers.get(GROUP_IDS_HEADER) {
            None => HashSet::new(),
            Some(value) => {
                let raw = value.to_str().map_err(|_| {
                    AppError::BadRequest(anyhow::anyhow!("X-Group-IDs header is not valid text"))
                })?;
                Self::parse_groups(raw)
            }
        };

        tracing::Span::current().record("user_id", user_id);

        Ok(CallerContext {
            user_id: user_id.to_string(),
            group_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<CallerContext, AppError> {
        let (mut parts, _) = req.into_parts();
        CallerContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn parses_user_and_groups() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "bob")
            .header(GROUP_IDS_HEADER, "team, ops,,team")
            .body(())
            .unwrap();

        let caller = extract(req).await.unwrap();
        assert_eq!(caller, CallerContext::new("bob", ["team", "ops"]));
    }

    #[tokio::test]
    async fn groups_are_optional() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "bob")
            .body(())
            .unwrap();

        assert!(extract(req).await.unwrap().group_ids.is_empty());
    }

    #[tokio::test]
    async fn missing_user_is_rejected() {
        let req = Request::builder()
            .header(GROUP_IDS_HEADER, "team")
            .body(())
            .unwrap();

        assert!(matches!(extract(req).await, Err(AppError::AuthError(_))));
    }
}
