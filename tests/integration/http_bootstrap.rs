// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]

//! HTTP collaborators against an in-process axum server: session identity,
//! profile, channel listing and websocket endpoint derivation.

use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chatsync::api::{ApiClient, ApiError};
use chatsync::endpoint;
use chatsync_proto::channel::Visibility;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

// =============================================================================
// Mock server
// =============================================================================

async fn serve(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

async fn perfil(Path(id): Path<String>) -> Response {
    if id == "u1" {
        Json(json!({"nombre": "Ana", "apellido": "Ruiz", "email": "ana@example.com"}))
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Usuario no encontrado"})),
        )
            .into_response()
    }
}

async fn canales(Path(id): Path<String>) -> Json<Value> {
    Json(json!([
        {"_id": "c1", "nombre": "general", "publico": true, "admins": [], "miembros": [id]},
        {"_id": "c2", "nombre": "equipo", "publico": false, "admins": [id], "miembros": [id],
         "ultimo": {"usuario": "Luis", "contenido": "listo"}},
    ]))
}

/// A server with a logged-in user and a TLS websocket on port 7000.
async fn logged_in_server() -> Url {
    let app = Router::new()
        .route(
            "/config/ws",
            get(|| async { Json(json!({"ssl_enabled": true, "ws_port": "7000"})) }),
        )
        .route(
            "/session_user",
            get(|| async {
                Json(json!({
                    "logged": true,
                    "user": {"_id": "u1", "google_id": "g-1", "nombre": "Ana", "email": "ana@example.com"},
                }))
            }),
        )
        .route("/perfil/{id}", get(perfil))
        .route("/canales/{id}", get(canales));
    serve(app).await
}

/// A server with nobody logged in and no websocket configuration.
async fn logged_out_server() -> Url {
    let app = Router::new().route(
        "/session_user",
        get(|| async { Json(json!({"logged": false})) }),
    );
    serve(app).await
}

fn client(base: Url) -> ApiClient {
    ApiClient::new(base, Duration::from_secs(5)).unwrap()
}

// =============================================================================
// Identity and profile
// =============================================================================

#[tokio::test]
async fn resolves_logged_in_identity() {
    let api = client(logged_in_server().await);
    let identity = api.resolve_identity().await.unwrap();
    assert_eq!(identity.id, "u1");
    assert_eq!(identity.federated_id.as_deref(), Some("g-1"));
}

#[tokio::test]
async fn logged_out_session_is_access_denied() {
    let api = client(logged_out_server().await);
    assert!(matches!(
        api.resolve_identity().await,
        Err(ApiError::AccessDenied)
    ));
}

#[tokio::test]
async fn profile_and_error_body() {
    let api = client(logged_in_server().await);

    let profile = api.profile("u1").await.unwrap();
    assert_eq!(profile.display_name, "Ana");
    assert_eq!(profile.email.as_deref(), Some("ana@example.com"));

    match api.profile("nobody").await {
        Err(ApiError::Status {
            status, message, ..
        }) => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(message, "Usuario no encontrado");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn lists_channels_for_roster_seed() {
    let api = client(logged_in_server().await);
    let channels = api.channels("u1").await.unwrap();

    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].name, "general");
    assert_eq!(channels[1].visibility, Visibility::Private);
    assert!(channels[1].is_admin("u1"));
    assert_eq!(channels[1].last_message.as_ref().map(|p| p.body.as_str()), Some("listo"));
}

#[tokio::test]
async fn unreachable_server_is_a_request_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let api = client(Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap());
    assert!(matches!(
        api.resolve_identity().await,
        Err(ApiError::Request { .. })
    ));
}

// =============================================================================
// Websocket endpoint derivation
// =============================================================================

#[tokio::test]
async fn endpoint_follows_published_config() {
    let base = logged_in_server().await;
    let api = client(base.clone());
    let url = endpoint::resolve(&api, &base).await.unwrap();
    assert_eq!(url.as_str(), "wss://127.0.0.1:7000/");
}

#[tokio::test]
async fn endpoint_falls_back_when_config_is_missing() {
    let base = logged_out_server().await;
    let api = client(base.clone());
    let url = endpoint::resolve(&api, &base).await.unwrap();
    assert_eq!(url.as_str(), "ws://127.0.0.1:5001/");
}
