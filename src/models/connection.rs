//! Service connection model (OAuth link to an external provider).

use serde::{Deserialize, Serialize};

/// A user's link to an external provider account.
///
/// Keyed by `{provider}_{provider_account_id}`, which enforces at most one
/// connection per provider account. The sync core only consumes this through
/// the token capability in `StravaService`; creation belongs to the
/// connections subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConnection {
    pub user_id: String,
    /// Provider name ("strava")
    pub provider: String,
    /// Account ID on the provider side
    pub provider_account_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
}

impl ServiceConnection {
    /// Firestore document ID for this connection.
    pub fn doc_id(&self) -> String {
        connection_doc_id(&self.provider, &self.provider_account_id)
    }
}

/// Document ID for a (provider, account) pair.
pub fn connection_doc_id(provider: &str, provider_account_id: &str) -> String {
    format!("{}_{}", provider, provider_account_id)
}
