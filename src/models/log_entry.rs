use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the two rolling log collections subject to retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDataset {
    /// Hits recorded when a redirect matched
    RedirectLogs,
    /// Requests that ended in a 404
    NotFoundLogs,
}

impl LogDataset {
    /// Both datasets, in flush order.
    pub const ALL: [LogDataset; 2] = [LogDataset::RedirectLogs, LogDataset::NotFoundLogs];

    /// Table holding this dataset's rows.
    ///
    /// Table names come from this closed set only, so callers may splice them
    /// into SQL text.
    pub fn table_name(&self) -> &'static str {
        match self {
            LogDataset::RedirectLogs => "redirect_logs",
            LogDataset::NotFoundLogs => "not_found_logs",
        }
    }
}

impl std::fmt::Display for LogDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

impl std::str::FromStr for LogDataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redirect_logs" => Ok(LogDataset::RedirectLogs),
            "not_found_logs" => Ok(LogDataset::NotFoundLogs),
            _ => Err(format!("Invalid log dataset: {}", s)),
        }
    }
}

/// A single logged request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    /// When the request was logged
    pub created_at: DateTime<Utc>,
    /// Requested URL
    pub url: String,
    /// Target the request was sent to (redirect logs only)
    pub sent_to: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    /// HTTP status returned
    pub http_code: Option<i32>,
}

/// Input for creating a new log entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateLogEntry {
    pub url: String,
    pub sent_to: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub http_code: Option<i32>,
    /// Override the creation time. Defaults to now; used when importing
    /// or backfilling older entries.
    pub created_at: Option<DateTime<Utc>>,
}
