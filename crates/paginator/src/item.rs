use super::Lineage;
use row_source::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OutputItem is a single item exchanged with the host: a row payload,
/// its lineage, and an optional per-row error marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputItem {
    pub json: Row,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<Lineage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutputItem {
    pub fn from_row(json: Row) -> Self {
        Self {
            json,
            ..Default::default()
        }
    }

    /// Map a document produced by a program into an item.
    /// Documents shaped like an item (having a "json" object) are taken as
    /// one, so that programs may set their own lineage. Other objects become
    /// the item payload, and non-object values are wrapped as `{"value": ..}`.
    pub fn from_document(doc: Value) -> Self {
        match doc {
            Value::Object(map) if matches!(map.get("json"), Some(Value::Object(_))) => {
                match serde_json::from_value(Value::Object(map.clone())) {
                    Ok(item) => item,
                    Err(_) => Self::from_row(map),
                }
            }
            Value::Object(map) => Self::from_row(map),
            value => Self::from_row([("value".to_string(), value)].into_iter().collect()),
        }
    }
}

/// Invocation is the host's input to a single produce-next call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    /// Provenance of the triggering input, as provided by the host.
    #[serde(default)]
    pub source: Value,
    /// Items of the triggering input.
    #[serde(default)]
    pub items: Vec<OutputItem>,
}

/// Outputs of a single produce-next call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outputs {
    pub primary: Vec<OutputItem>,
    /// Completion channel of dual-channel strategies.
    pub completion: Vec<OutputItem>,
    /// Is the run complete? No further invocation will produce items.
    pub done: bool,
}

impl Outputs {
    pub fn finished() -> Self {
        Self {
            done: true,
            ..Default::default()
        }
    }
}
