use anyhow::Context;
use paginator::LoopConfig;
use poller::{PollConfig, StreamConfig};
use row_source::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// RunFile is the YAML document which configures loopctl.
///
/// ```yaml
/// connection:
///   account: ./orders.db
/// loop:
///   query: select * from orders order by id
///   strategy:
///     mode: prefetch
///     batchSize: 500
/// program: |
///   select json_extract(value, '$.id') as id from json_each($input);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunFile {
    pub connection: ConnectionConfig,
    /// Query paginated by `loopctl run`.
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_: Option<LoopConfig>,
    /// Table polled by `loopctl poll`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollConfig>,
    /// Query streamed by `loopctl stream`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamConfig>,
    /// Program through which `loopctl run` passes each delivered batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Provenance attached to each item of a run.
    #[serde(default)]
    pub source: serde_json::Value,
}

impl RunFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read run file {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse run file {}", path.display()))
    }
}
