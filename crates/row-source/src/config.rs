use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration of a source connection. Options other than the account,
/// username, and authentication are passed through to the driver untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Account or location of the source. For SQLite, the database path.
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub authentication: Authentication,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ConnectionConfig {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            username: None,
            authentication: Authentication::None,
            options: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Authentication {
    #[default]
    None,
    Password {
        password: String,
    },
    #[serde(rename_all = "camelCase")]
    KeyPair {
        private_key_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase: Option<String>,
    },
}

// Secrets are never written to logs.
impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Password { .. } => f.debug_struct("Password").finish_non_exhaustive(),
            Self::KeyPair {
                private_key_path, ..
            } => f
                .debug_struct("KeyPair")
                .field("private_key_path", private_key_path)
                .finish_non_exhaustive(),
        }
    }
}
