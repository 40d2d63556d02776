//! Axum router configuration with middleware.
//!
//! All routes are under `/api/`.
//! Middleware: CORS, tracing, and a raised body limit on the upload route.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and the text fields around the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let api_routes = Router::new()
        // Session lifecycle
        .route(
            "/sessions",
            post(handlers::session::create_session).get(handlers::session::list_sessions),
        )
        .route("/sessions/{user_id}", delete(handlers::session::delete_session))
        .route("/sessions/{user_id}/qr", get(handlers::session::get_qr))
        .route("/sessions/{user_id}/status", get(handlers::session::get_status))
        // Messaging
        .route(
            "/sessions/{user_id}/messages",
            post(handlers::message::send_text),
        )
        .route(
            "/sessions/{user_id}/messages/media",
            post(handlers::message::send_media).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/sessions/{user_id}/history", get(handlers::session::get_history))
        .route("/sessions/{user_id}/pending", get(handlers::session::get_pending))
        .route("/health", get(handlers::health::health));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use sessiongate_infra::loopback::LoopbackFactory;
    use sessiongate_types::config::GatewayConfig;
    use tower::ServiceExt;

    fn router(dir: &Path, auto_pair: Duration) -> Router {
        let config = GatewayConfig {
            max_upload_bytes: 1024,
            upload_cleanup_delay_secs: 0,
            ..GatewayConfig::default()
        };
        let state = AppState::new(
            dir.to_path_buf(),
            config,
            Arc::new(LoopbackFactory::new(auto_pair)),
        );
        build_router(state)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        send(router, request.unwrap()).await
    }

    async fn upload(router: &Router, uri: &str, parts: &[(&str, Option<(&str, &str)>, &str)]) -> (StatusCode, Value) {
        let mut body = String::new();
        for (name, file, value) in parts {
            body.push_str("--XBOUNDARY\r\n");
            match file {
                Some((file_name, mime)) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str("--XBOUNDARY--\r\n");

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();
        send(router, request).await
    }

    async fn wait_connected(router: &Router, user: &str) {
        for _ in 0..200 {
            let (_, json) = call(router, "GET", &format!("/api/sessions/{user}/status"), None).await;
            if json["data"]["connected"] == true {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {user} never connected");
    }

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir.join("uploads"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::ZERO);
        call(&router, "POST", "/api/sessions", Some(json!({"userId": "alice"}))).await;

        let (status, json) = call(&router, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["active_sessions"], 1);
        assert_eq!(json["pending_messages"], 0);
    }

    #[tokio::test]
    async fn duplicate_session_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::ZERO);

        let (status, json) = call(&router, "POST", "/api/sessions", Some(json!({"user_id": "alice"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["user_id"], "alice");
        assert_eq!(json["_links"]["qr"], "/api/sessions/alice/qr");

        let (status, json) = call(&router, "POST", "/api/sessions", Some(json!({"userId": "alice"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["errors"][0]["code"], "SESSION_EXISTS");

        let (_, json) = call(&router, "GET", "/api/sessions", None).await;
        assert_eq!(json["data"]["total"], 1);
    }

    #[tokio::test]
    async fn blank_user_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::ZERO);
        let (status, json) = call(&router, "POST", "/api/sessions", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"][0]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::ZERO);
        for uri in [
            "/api/sessions/ghost/qr",
            "/api/sessions/ghost/status",
            "/api/sessions/ghost/history",
            "/api/sessions/ghost/pending",
        ] {
            let (status, _) = call(&router, "GET", uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }
        let (status, _) = call(&router, "DELETE", "/api/sessions/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unpaired_session_shows_challenge_and_refuses_sends() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::ZERO);
        call(&router, "POST", "/api/sessions", Some(json!({"userId": "alice"}))).await;

        let mut qr = Value::Null;
        for _ in 0..200 {
            let (_, json) = call(&router, "GET", "/api/sessions/alice/qr", None).await;
            if json["data"]["status"] == "challenge" {
                qr = json["data"]["qr"].clone();
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(qr.as_str().unwrap().starts_with("sgate-loopback:alice:"));

        let (status, json) = call(
            &router,
            "POST",
            "/api/sessions/alice/messages",
            Some(json!({"number": "15551234567", "message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"][0]["code"], "SESSION_NOT_CONNECTED");

        let (_, json) = call(&router, "GET", "/api/sessions/alice/pending", None).await;
        assert_eq!(json["data"]["total"], 0);
    }

    #[tokio::test]
    async fn text_send_is_acknowledged_then_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::from_millis(10));
        call(&router, "POST", "/api/sessions", Some(json!({"userId": "alice"}))).await;
        wait_connected(&router, "alice").await;

        let (status, json) = call(
            &router,
            "POST",
            "/api/sessions/alice/messages",
            Some(json!({"number": "+1 555 123 4567", "message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["sending"], true);
        assert_eq!(json["data"]["to"], "15551234567@c.us");
        assert_eq!(json["data"]["has_media"], false);

        let mut sent = false;
        for _ in 0..200 {
            let (_, json) = call(&router, "GET", "/api/sessions/alice/pending", None).await;
            if json["data"]["messages"][0]["status"] == "sent" {
                sent = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sent);

        let (_, json) = call(&router, "GET", "/api/sessions/alice/history?limit=5", None).await;
        assert_eq!(json["data"]["total"], 1);
        assert_eq!(json["data"]["entries"][0]["status"], "sent");
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::from_millis(10));
        call(&router, "POST", "/api/sessions", Some(json!({"userId": "alice"}))).await;
        wait_connected(&router, "alice").await;

        let (status, json) = call(
            &router,
            "POST",
            "/api/sessions/alice/messages",
            Some(json!({"number": "call me", "message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"][0]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected_and_not_kept() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::from_millis(10));
        call(&router, "POST", "/api/sessions", Some(json!({"userId": "alice"}))).await;
        wait_connected(&router, "alice").await;

        let (status, json) = upload(
            &router,
            "/api/sessions/alice/messages/media",
            &[
                ("number", None, "15551234567"),
                ("file", Some(("tool.exe", "application/x-msdownload")), "MZ"),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"][0]["code"], "UNSUPPORTED_FILE_TYPE");
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn media_upload_is_sent_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::from_millis(10));
        call(&router, "POST", "/api/sessions", Some(json!({"userId": "alice"}))).await;
        wait_connected(&router, "alice").await;

        let (status, json) = upload(
            &router,
            "/api/sessions/alice/messages/media",
            &[
                ("number", None, "15551234567"),
                ("message", None, "notes"),
                ("file", Some(("notes.txt", "text/plain")), "hello file"),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["has_media"], true);
        assert_eq!(json["data"]["content"], "notes");

        for _ in 0..200 {
            if staged_files(dir.path()) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(staged_files(dir.path()), 0);

        let (_, json) = call(&router, "GET", "/api/sessions/alice/history", None).await;
        assert_eq!(json["data"]["entries"][0]["has_media"], true);
        assert_eq!(json["data"]["entries"][0]["media"]["file_name"], "notes.txt");
    }

    #[tokio::test]
    async fn media_route_without_file_sends_text() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::from_millis(10));
        call(&router, "POST", "/api/sessions", Some(json!({"userId": "alice"}))).await;
        wait_connected(&router, "alice").await;

        let (status, json) = upload(
            &router,
            "/api/sessions/alice/messages/media",
            &[("number", None, "15551234567"), ("message", None, "just text")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["has_media"], false);
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), Duration::ZERO);
        call(&router, "POST", "/api/sessions", Some(json!({"userId": "alice"}))).await;

        let (status, json) = call(&router, "DELETE", "/api/sessions/alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["destroyed"], true);

        let (status, _) = call(&router, "GET", "/api/sessions/alice/status", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
