//! Session identity carried by every outbound envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The local user's identity for the life of a session.
///
/// Created by the login handoff (outside this crate) and never mutated.
/// `federated_id` is only present for accounts that signed in through an
/// external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user id assigned by the server.
    #[serde(rename = "_id")]
    pub id: String,
    /// Opaque id from the federated identity provider, if any.
    #[serde(rename = "google_id", default)]
    pub federated_id: Option<String>,
}

impl Identity {
    /// Create an identity without a federated id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            federated_id: None,
        }
    }

    /// Attach a federated id.
    #[must_use]
    pub fn with_federated_id(mut self, federated_id: impl Into<String>) -> Self {
        self.federated_id = Some(federated_id.into());
        self
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
