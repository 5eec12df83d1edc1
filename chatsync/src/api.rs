//! HTTP collaborators of the chat server.
//!
//! Typed `reqwest` client for the four endpoints the engine depends on:
//! websocket configuration, session identity, profile and channel listing.

use std::time::Duration;

use chatsync_proto::channel::Channel;
use chatsync_proto::identity::Identity;
use serde::{Deserialize, Deserializer};
use url::Url;

/// Errors from the HTTP collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or the body could not be read.
    #[error("request to {path} failed: {source}")]
    Request {
        /// Endpoint path.
        path: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{path} returned {status}: {message}")]
    Status {
        /// Endpoint path.
        path: String,
        /// HTTP status.
        status: reqwest::StatusCode,
        /// Server-provided `error` text, or the raw body prefix.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {path}: {reason}")]
    Decode {
        /// Endpoint path.
        path: String,
        /// What was wrong.
        reason: String,
    },

    /// The endpoint path could not be joined onto the base URL.
    #[error("invalid endpoint path {0:?}")]
    Path(String),

    /// The session endpoint reported no logged-in user.
    #[error("access denied: no user is logged in")]
    AccessDenied,
}

/// Websocket settings published by `GET /config/ws`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WsConfig {
    /// Whether the websocket is served over TLS.
    #[serde(default)]
    pub ssl_enabled: bool,
    /// Websocket port; the server sends it as a string.
    #[serde(deserialize_with = "port_from_string_or_number")]
    pub ws_port: u16,
}

/// Profile returned by `GET /perfil/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    /// Display name.
    #[serde(rename = "nombre")]
    pub display_name: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    logged: bool,
    #[serde(default)]
    user: Option<Identity>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn port_from_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }
    match Port::deserialize(d)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Source of the websocket configuration.
///
/// Implemented by [`ApiClient`]; tests substitute a canned lookup.
pub trait ConfigLookup: Send + Sync + 'static {
    /// Fetch the websocket configuration.
    fn ws_config(&self) -> impl std::future::Future<Output = Result<WsConfig, ApiError>> + Send;
}

/// Client for the chat server's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    /// Create a client rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] if the HTTP client cannot be built.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Request {
                path: String::new(),
                source,
            })?;
        Ok(Self { http, base })
    }

    /// The base URL requests are joined onto.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self
            .base
            .join(path)
            .map_err(|_| ApiError::Path(path.to_string()))?;

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ApiError::Request {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| ApiError::Request {
            path: path.to_string(),
            source,
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map_or_else(|_| body.chars().take(200).collect(), |e| e.error);
            tracing::warn!(path, %status, %message, "endpoint returned an error");
            return Err(ApiError::Status {
                path: path.to_string(),
                status,
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// `GET /session_user`: the logged-in user's identity.
    ///
    /// # Errors
    ///
    /// [`ApiError::AccessDenied`] when `logged` is false or no user is
    /// attached; other variants for transport or decoding failures.
    pub async fn resolve_identity(&self) -> Result<Identity, ApiError> {
        let session: SessionUser = self.get("session_user").await?;
        match session.user {
            Some(identity) if session.logged && !identity.id.is_empty() => {
                tracing::info!(user_id = %identity.id, "session identity resolved");
                Ok(identity)
            }
            _ => Err(ApiError::AccessDenied),
        }
    }

    /// `GET /perfil/{id}`: display name and contact details.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the request.
    pub async fn profile(&self, user_id: &str) -> Result<Profile, ApiError> {
        self.get(&format!("perfil/{user_id}")).await
    }

    /// `GET /canales/{id}`: channels visible to the user, used to seed the
    /// roster before the first push.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the request.
    pub async fn channels(&self, user_id: &str) -> Result<Vec<Channel>, ApiError> {
        self.get(&format!("canales/{user_id}")).await
    }
}

impl ConfigLookup for ApiClient {
    async fn ws_config(&self) -> Result<WsConfig, ApiError> {
        self.get("config/ws").await
    }
}
