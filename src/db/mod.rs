//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// OAuth connections, keyed by `{provider}_{provider_account_id}`
    pub const CONNECTIONS: &str = "connections";
    /// Processed activities, keyed by `{source}_{source_id}`
    pub const ACTIVITIES: &str = "activities";
    /// Dated FTP values per user
    pub const FTP_HISTORY: &str = "ftp_history";
    /// Daily training metrics, keyed by `{user_id}_{YYYY-MM-DD}`
    pub const FITNESS: &str = "fitness";
}
