//! Lineage ("paired items") relates each output item to the input item and
//! upstream provenance record it descends from.
//!
//! Items of a run are produced across many invocations which share no call
//! stack, so the provenance of the run is captured once, as a
//! [`SourceSnapshot`], when the run starts. Every item emitted by the run
//! then references that same snapshot.

use super::OutputItem;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// SourceSnapshot is an immutable deep copy of the host-provided provenance
/// of a run. Clones share the captured document.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSnapshot(Arc<serde_json::Value>);

impl SourceSnapshot {
    pub fn capture(source: &serde_json::Value) -> Self {
        Self(Arc::new(source.clone()))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Do `self` and `other` share the same captured document?
    pub fn same_capture(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Serialize for SourceSnapshot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SourceSnapshot {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(|value| Self(Arc::new(value)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedItem {
    /// Index of the originating item.
    pub item: usize,
    /// Index of the input through which the originating item arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_overwrite: Option<SourceSnapshot>,
}

/// Lineage of an item, which may be a bare item index,
/// a single paired item, or several of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Lineage {
    Index(usize),
    One(PairedItem),
    Many(Vec<PairedItem>),
}

/// Attach `snapshot` to `lineage`. Existing lineage is preserved with its
/// source overwritten by the snapshot. Absent lineage becomes item 0 of the
/// snapshot.
pub fn attach(lineage: Option<Lineage>, snapshot: &SourceSnapshot) -> Lineage {
    let overwrite = |paired: PairedItem| PairedItem {
        source_overwrite: Some(snapshot.clone()),
        ..paired
    };

    match lineage {
        None => Lineage::One(overwrite(PairedItem {
            item: 0,
            input: None,
            source_overwrite: None,
        })),
        Some(Lineage::Index(item)) => Lineage::One(overwrite(PairedItem {
            item,
            input: None,
            source_overwrite: None,
        })),
        Some(Lineage::One(paired)) => Lineage::One(overwrite(paired)),
        Some(Lineage::Many(many)) => Lineage::Many(many.into_iter().map(overwrite).collect()),
    }
}

/// Pair every item of `items` with `snapshot`.
pub fn pair_all(items: Vec<OutputItem>, snapshot: &SourceSnapshot) -> Vec<OutputItem> {
    items
        .into_iter()
        .map(|item| OutputItem {
            paired_item: Some(attach(item.paired_item, snapshot)),
            ..item
        })
        .collect()
}
