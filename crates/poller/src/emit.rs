use paginator::OutputItem;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// Reason for which an emitter is told a trigger is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// A cycle delivered all of its rows.
    Completed,
    /// A cycle found no rows to deliver.
    Empty,
    /// A cycle failed before delivering all of its rows.
    Failed,
    /// The trigger was closed.
    Closed,
}

/// Emitter is the push channel through which triggers deliver batches to the host.
pub trait Emitter: Send + Sync + 'static {
    /// Emit a batch. The returned DeferredAck resolves when the host
    /// acknowledges the batch. Triggers are not required to await it.
    fn emit(&self, items: Vec<OutputItem>) -> DeferredAck;

    /// Signal that a cycle of the trigger, or the trigger itself, is done.
    fn done(&self, _reason: DoneReason) {}
}

/// DeferredAck resolves to `true` once its batch is acknowledged,
/// or to `false` if the batch was dropped without acknowledgement.
#[derive(Debug)]
pub struct DeferredAck(oneshot::Receiver<()>);

impl DeferredAck {
    pub fn new() -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self(rx))
    }
}

impl Future for DeferredAck {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map(|result| result.is_ok())
    }
}

/// Emission is a batch delivered through a [`ChannelEmitter`].
#[derive(Debug)]
pub struct Emission {
    pub items: Vec<OutputItem>,
    ack: oneshot::Sender<()>,
}

impl Emission {
    /// Acknowledge the batch, resolving its DeferredAck.
    pub fn ack(self) -> Vec<OutputItem> {
        let _ = self.ack.send(());
        self.items
    }
}

#[derive(Debug)]
pub enum Event {
    Batch(Emission),
    Done(DoneReason),
}

/// ChannelEmitter forwards emissions to the receiver returned by [`channel`].
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<Event>,
}

pub fn channel() -> (ChannelEmitter, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelEmitter { tx }, rx)
}

impl Emitter for ChannelEmitter {
    fn emit(&self, items: Vec<OutputItem>) -> DeferredAck {
        let (ack, deferred) = DeferredAck::new();

        if self.tx.send(Event::Batch(Emission { items, ack })).is_err() {
            tracing::debug!("emitter receiver is gone; dropping batch");
        }
        deferred
    }

    fn done(&self, reason: DoneReason) {
        let _ = self.tx.send(Event::Done(reason));
    }
}
