use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{AppState, auth::Auth};
use crate::error::ConnectionError;
use crate::models::{Connection, ConnectionActionInput, ConnectionList, SendRequestInput};

#[derive(Debug, Deserialize)]
pub struct SendRequestBody {
    pub recipient_id: Uuid,
}

fn action(connection_id: Uuid, acting_user_id: Uuid) -> ConnectionActionInput {
    ConnectionActionInput { connection_id, acting_user_id }
}

pub async fn send_request(
    State(state): State<AppState>,
    Auth(user_id): Auth,
    Json(body): Json<SendRequestBody>,
) -> Result<(StatusCode, Json<Connection>), ConnectionError> {
    let connection = state
        .manager
        .send_request(SendRequestInput {
            requester_id: user_id,
            recipient_id: body.recipient_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(connection)))
}

pub async fn accept(
    State(state): State<AppState>,
    Auth(user_id): Auth,
    Path(connection_id): Path<Uuid>,
) -> Result<Json<Connection>, ConnectionError> {
    let connection = state.manager.accept(action(connection_id, user_id)).await?;
    Ok(Json(connection))
}

pub async fn decline(
    State(state): State<AppState>,
    Auth(user_id): Auth,
    Path(connection_id): Path<Uuid>,
) -> Result<StatusCode, ConnectionError> {
    state.manager.decline(action(connection_id, user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel(
    State(state): State<AppState>,
    Auth(user_id): Auth,
    Path(connection_id): Path<Uuid>,
) -> Result<StatusCode, ConnectionError> {
    state.manager.cancel(action(connection_id, user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove(
    State(state): State<AppState>,
    Auth(user_id): Auth,
    Path(connection_id): Path<Uuid>,
) -> Result<StatusCode, ConnectionError> {
    state.manager.remove(action(connection_id, user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list(
    State(state): State<AppState>,
    Auth(user_id): Auth,
) -> Result<Json<ConnectionList>, ConnectionError> {
    let list = state.manager.list(user_id).await?;
    Ok(Json(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{InMemoryConnectionStore, InMemoryProfileDirectory, RecordingNotificationSink};
    use crate::handlers::router;
    use crate::services::{ConnectionManager, RetryPolicy};
    use axum::{body::Body, http::Request, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<InMemoryConnectionStore>) {
        let store = Arc::new(InMemoryConnectionStore::new());
        let manager = ConnectionManager::new(
            store.clone(),
            Arc::new(RecordingNotificationSink::new()),
            Arc::new(InMemoryProfileDirectory::new()),
        )
        .with_retry_policy(RetryPolicy { max_attempts: 3, backoff: Duration::ZERO });

        (router(AppState::new(manager)), store)
    }

    fn request(method: &str, uri: &str, user_id: Uuid, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-User-Id", user_id.to_string());
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_request_accept_and_list_over_http() {
        let (app, _) = app();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let response = app
            .clone()
            .oneshot(request("POST", "/api/connections", alice, Some(json!({ "recipient_id": bob }))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["status"], "pending");
        let id = created["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request("POST", &format!("/api/connections/{}/accept", id), bob, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "accepted");

        let response = app
            .clone()
            .oneshot(request("GET", "/api/connections", alice, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let list = json_body(response).await;
        assert_eq!(list["accepted"].as_array().unwrap().len(), 1);
        assert_eq!(list["accepted"][0]["is_outgoing"], true);
        assert!(list["pending"].as_array().unwrap().is_empty());

        let response = app
            .oneshot(request("DELETE", &format!("/api/connections/{}", id), bob, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_errors_carry_kind() {
        let (app, _) = app();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let response = app
            .clone()
            .oneshot(request("POST", "/api/connections", alice, Some(json!({ "recipient_id": bob }))))
            .await
            .unwrap();
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request("POST", "/api/connections", bob, Some(json!({ "recipient_id": alice }))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["kind"], "duplicate_request");

        let response = app
            .clone()
            .oneshot(request("POST", &format!("/api/connections/{}/accept", id), alice, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request("POST", &format!("/api/connections/{}/accept", Uuid::new_v4()), bob, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_failed_delete_verification_is_reported() {
        let (app, store) = app();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let response = app
            .clone()
            .oneshot(request("POST", "/api/connections", alice, Some(json!({ "recipient_id": bob }))))
            .await
            .unwrap();
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        store.lag_next_deletes(3);
        let response = app
            .oneshot(request("POST", &format!("/api/connections/{}/cancel", id), alice, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["kind"], "deletion_failed");
    }

    #[tokio::test]
    async fn test_decline_returns_no_content() {
        let (app, store) = app();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let response = app
            .clone()
            .oneshot(request("POST", "/api/connections", alice, Some(json!({ "recipient_id": bob }))))
            .await
            .unwrap();
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(request("POST", &format!("/api/connections/{}/decline", id), bob, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.is_empty().await);
    }
}
