//! Test helper module for storage-service integration tests.
//!
//! Builds the real router over in-memory stores and a temporary blob
//! directory, then drives it in process with `oneshot`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use storage_service::authz::{AuthzEngine, DEFAULT_MAX_DEPTH};
use storage_service::services::{
    InMemoryEventPublisher, InMemoryPermissionIndex, InMemoryResourceStore, LocalBlobStore,
    ResourceService,
};
use storage_service::{build_router, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "storage-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub resources: Arc<InMemoryResourceStore>,
    pub grants: Arc<InMemoryPermissionIndex>,
    pub events: Arc<InMemoryEventPublisher>,
    _blob_dir: TempDir,
}

/// Caller headers: user id plus group memberships.
pub struct Caller<'a> {
    pub user_id: &'a str,
    pub groups: &'a [&'a str],
}

pub const ALICE: Caller<'static> = Caller {
    user_id: "alice",
    groups: &[],
};

pub const BOB: Caller<'static> = Caller {
    user_id: "bob",
    groups: &["team"],
};

pub const CAROL: Caller<'static> = Caller {
    user_id: "carol",
    groups: &["outsiders"],
};

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let blob_dir = tempfile::tempdir().expect("Failed to create blob dir");

        let resources = Arc::new(InMemoryResourceStore::new());
        let grants = Arc::new(InMemoryPermissionIndex::new());
        let events = Arc::new(InMemoryEventPublisher::new());
        let blobs = Arc::new(
            LocalBlobStore::new(blob_dir.path(), "http://localhost:8080", "test-signing-secret")
                .await
                .expect("Failed to create blob store"),
        );

        let authz = AuthzEngine::new(resources.clone(), grants.clone(), DEFAULT_MAX_DEPTH);
        let service = ResourceService::new(
            resources.clone(),
            authz,
            blobs.clone(),
            events.clone(),
            300,
        );

        let router = build_router(AppState {
            service,
            resources: resources.clone(),
            blobs,
            events: events.clone(),
        });

        Self {
            router,
            resources,
            grants,
            events,
            _blob_dir: blob_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn builder(method: &str, uri: &str, caller: &Caller<'_>) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("X-User-ID", caller.user_id)
            .header("X-Group-IDs", caller.groups.join(","))
    }

    pub async fn get(&self, uri: &str, caller: &Caller<'_>) -> TestResponse {
        self.send(Self::builder("GET", uri, caller).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, caller: &Caller<'_>) -> TestResponse {
        self.send(
            Self::builder("DELETE", uri, caller)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        caller: &Caller<'_>,
        body: Value,
    ) -> TestResponse {
        self.send(
            Self::builder(method, uri, caller)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Create a directory and return its id.
    pub async fn create_dir(&self, caller: &Caller<'_>, parent: Option<&str>, name: &str) -> String {
        let response = self
            .json(
                "POST",
                "/v1/dirs",
                caller,
                serde_json::json!({ "parent_id": parent, "name": name }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json());
        response.json()["id"]
            .as_str()
            .expect("id in response")
            .to_string()
    }

    pub async fn upload(
        &self,
        caller: &Caller<'_>,
        dir_id: &str,
        filename: &str,
        content: &[u8],
    ) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/plain\r\n\r\n",
                b = BOUNDARY,
                f = filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        self.send(
            Self::builder("POST", &format!("/v1/dirs/{}/files", dir_id), caller)
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn grant(
        &self,
        caller: &Caller<'_>,
        resource_id: &str,
        group_id: &str,
        actions: &[&str],
    ) -> TestResponse {
        self.json(
            "POST",
            &format!("/v1/resources/{}/permissions", resource_id),
            caller,
            serde_json::json!({ "group_id": group_id, "actions": actions }),
        )
        .await
    }

    pub async fn revoke(
        &self,
        caller: &Caller<'_>,
        resource_id: &str,
        group_id: &str,
        actions: &[&str],
    ) -> TestResponse {
        self.json(
            "DELETE",
            &format!("/v1/resources/{}/permissions", resource_id),
            caller,
            serde_json::json!({ "group_id": group_id, "actions": actions }),
        )
        .await
    }

    pub async fn allowed(&self, caller: &Caller<'_>, resource_id: &str, action: &str) -> bool {
        let response = self
            .get(
                &format!("/v1/resources/{}/access?action={}", resource_id, action),
                caller,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.json());
        response.json()["allowed"].as_bool().expect("allowed flag")
    }
}
