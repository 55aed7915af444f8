//! Background task that owns a [`Dispatcher`].
//!
//! Messages for every stream pass through one unbounded channel and are
//! handled serially in arrival order, so no two operations on the same stream
//! ever run concurrently.

use crate::dispatcher::Dispatcher;
use crate::message::{InboundMessage, OutboundMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Sending side of a running worker.
///
/// Clones share the same worker. The worker stops after the last handle is
/// dropped and the queued messages are handled, or as soon as the outbound
/// receiver is dropped.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    inbound: mpsc::UnboundedSender<InboundMessage>,
}

impl WorkerHandle {
    /// Queue a message. Returns `false` if the worker has stopped.
    pub fn send(&self, msg: InboundMessage) -> bool {
        self.inbound.send(msg).is_ok()
    }

    /// Whether the worker has stopped accepting messages.
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}

/// Spawns dispatchers onto the tokio runtime.
#[derive(Debug)]
pub struct Worker;

impl Worker {
    /// Move `dispatcher` into a new task.
    ///
    /// Returns the handle to feed it and the receiver its replies arrive on.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn(
        dispatcher: Dispatcher,
    ) -> (WorkerHandle, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (handle, outbound, _task) = Self::spawn_with_task(dispatcher);
        (handle, outbound)
    }

    /// Like [`Worker::spawn`], also returning the task, which yields the
    /// dispatcher back once the worker stops.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn_with_task(
        mut dispatcher: Dispatcher,
    ) -> (
        WorkerHandle,
        mpsc::UnboundedReceiver<OutboundMessage>,
        JoinHandle<Dispatcher>,
    ) {
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<InboundMessage>();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            debug!("codec worker started");
            'messages: while let Some(msg) = inbound_rx.recv().await {
                for reply in dispatcher.handle(msg) {
                    if outbound_tx.send(reply).is_err() {
                        debug!("outbound receiver dropped, stopping codec worker");
                        break 'messages;
                    }
                }
            }
            debug!(open_streams = dispatcher.registry().len(), "codec worker stopped");
            dispatcher
        });

        (
            WorkerHandle {
                inbound: inbound_tx,
            },
            outbound_rx,
            task,
        )
    }
}
