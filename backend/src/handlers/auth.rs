//! Acting-user extraction.
//!
//! The upstream auth layer verifies the session and forwards the user id in
//! `X-User-Id`. Handlers never take the acting user from the request body.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::Json,
};
use uuid::Uuid;

use crate::constants::USER_ID_HEADER;
use crate::error::ErrorBody;

#[derive(Debug, Clone, Copy)]
pub struct Auth(pub Uuid);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorBody>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Auth)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorBody {
                        error: "Missing or invalid user id".to_string(),
                        kind: "unauthorized",
                    }),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    async fn whoami(Auth(user_id): Auth) -> String {
        user_id.to_string()
    }

    #[tokio::test]
    async fn test_auth_extractor_with_header() {
        let app = Router::new().route("/", get(whoami));
        let user_id = Uuid::new_v4();

        let request = Request::builder()
            .uri("/")
            .header("X-User-Id", user_id.to_string())
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], user_id.to_string().as_bytes());
    }

    #[tokio::test]
    async fn test_auth_extractor_rejects_missing_and_malformed() {
        let app = Router::new().route("/", get(whoami));

        let missing = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(missing).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let malformed = Request::builder()
            .uri("/")
            .header("X-User-Id", "not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(malformed).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
