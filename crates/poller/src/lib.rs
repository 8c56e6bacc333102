//! poller delivers query results to a host by pushing them, rather than
//! having the host pull them.
//!
//! An [`IntervalTrigger`] re-runs a full count-then-paginate cycle on a fixed
//! period, and a [`RowTrigger`] streams a query's rows as they're read.
//! Both push batches through an [`Emitter`].

mod config;
mod emit;
mod interval;
mod lifecycle;
mod rows;

#[cfg(test)]
mod fake;

pub use config::{PollConfig, StreamConfig};
pub use emit::{channel, ChannelEmitter, DeferredAck, DoneReason, Emission, Emitter, Event};
pub use interval::IntervalTrigger;
pub use rows::RowTrigger;

/// Map a pushed row into an item. Pushed rows have no upstream input item,
/// so each is paired with item 0.
pub fn pushed_item(json: row_source::Row) -> paginator::OutputItem {
    paginator::OutputItem {
        json,
        paired_item: Some(paginator::Lineage::One(paginator::PairedItem {
            item: 0,
            input: None,
            source_overwrite: None,
        })),
        error: None,
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] row_source::Error),
    #[error("invalid poll configuration: {0}")]
    Config(String),
}
