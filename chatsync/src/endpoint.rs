//! Websocket endpoint derivation.
//!
//! The websocket lives on the same host as the HTTP origin but on its own
//! port. `GET /config/ws` says which port and whether TLS is on; when that
//! lookup fails the client falls back to port [`FALLBACK_WS_PORT`], choosing
//! `wss` only if the HTTP origin itself is `https`.

use url::Url;

use crate::api::{ConfigLookup, WsConfig};

/// Port used when the configuration lookup is unavailable.
pub const FALLBACK_WS_PORT: u16 = 5001;

/// Errors deriving a websocket URL.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The HTTP origin has no host component.
    #[error("origin {0} has no host")]
    NoHost(String),

    /// The derived URL did not parse.
    #[error("derived websocket url is invalid: {0}")]
    Invalid(#[from] url::ParseError),
}

/// Websocket URL announced by the configuration lookup.
///
/// # Errors
///
/// [`EndpointError::NoHost`] if `origin` has no host.
pub fn from_config(origin: &Url, config: &WsConfig) -> Result<Url, EndpointError> {
    let scheme = if config.ssl_enabled { "wss" } else { "ws" };
    build(scheme, origin, config.ws_port)
}

/// Websocket URL used when the lookup fails.
///
/// # Errors
///
/// [`EndpointError::NoHost`] if `origin` has no host.
pub fn fallback(origin: &Url) -> Result<Url, EndpointError> {
    let scheme = if origin.scheme() == "https" { "wss" } else { "ws" };
    build(scheme, origin, FALLBACK_WS_PORT)
}

/// Ask `lookup` for the websocket settings, falling back on failure.
///
/// # Errors
///
/// [`EndpointError`] only if `origin` itself is unusable; lookup failures are
/// logged and answered with [`fallback`].
pub async fn resolve<L: ConfigLookup>(lookup: &L, origin: &Url) -> Result<Url, EndpointError> {
    match lookup.ws_config().await {
        Ok(config) => {
            let url = from_config(origin, &config)?;
            tracing::info!(%url, ssl = config.ssl_enabled, "websocket endpoint from config lookup");
            Ok(url)
        }
        Err(e) => {
            let url = fallback(origin)?;
            tracing::warn!(err = %e, %url, "config lookup failed, using fallback endpoint");
            Ok(url)
        }
    }
}

fn build(scheme: &str, origin: &Url, port: u16) -> Result<Url, EndpointError> {
    let host = origin
        .host_str()
        .ok_or_else(|| EndpointError::NoHost(origin.to_string()))?;
    Ok(Url::parse(&format!("{scheme}://{host}:{port}"))?)
}
