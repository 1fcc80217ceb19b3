//! FTP history model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One dated FTP value for a user.
///
/// Entries form a step function over time: the value effective for a date is
/// the entry with the latest `effective_from` that is not after the date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpEntry {
    pub user_id: String,
    /// Functional threshold power in watts
    pub ftp: u32,
    /// First instant this value applies
    pub effective_from: DateTime<Utc>,
}
