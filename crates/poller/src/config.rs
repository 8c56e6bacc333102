use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of an interval-polled table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PollConfig {
    /// Query whose rows are delivered. Pages are read by suffixing
    /// the query with a LIMIT and OFFSET.
    pub query: String,
    /// Table which is counted at the start of each cycle.
    pub table: String,
    /// Number of rows in each emitted page.
    #[serde(default = "PollConfig::default_limit")]
    pub limit: u64,
    /// Period between the starts of successive cycles.
    #[serde(default = "PollConfig::default_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Delay between the pages of a cycle, bounding load upon the source.
    #[serde(
        default = "PollConfig::default_batch_interval",
        with = "humantime_serde"
    )]
    pub batch_interval: Duration,
}

impl PollConfig {
    pub fn default_limit() -> u64 {
        1000
    }
    pub fn default_interval() -> Duration {
        Duration::from_secs(60 * 60)
    }
    pub fn default_batch_interval() -> Duration {
        Duration::from_secs(60)
    }

    pub fn validate(&self) -> Result<(), super::Error> {
        if self.limit == 0 {
            return Err(super::Error::Config("limit must be positive".to_string()));
        }
        if self.interval.is_zero() {
            return Err(super::Error::Config("interval must be positive".to_string()));
        }
        Ok(())
    }

    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) AS count FROM {}", self.table)
    }

    pub fn page_sql(&self, offset: u64) -> String {
        let query = self.query.trim().trim_end_matches(';').trim_end();
        format!("{query} LIMIT {} OFFSET {offset}", self.limit)
    }
}

/// Configuration of a streamed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StreamConfig {
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<serde_json::Value>,
}
