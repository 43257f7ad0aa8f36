//! # Sinks and delivery queues.
//!
//! A [`Sink`] is the publisher-side half of a subscription's delivery queue; the
//! [`Queue`] is the half read by the subscription's dispatch loop.
//!
//! ```text
//!   Broadcaster::write ──► Sink::deliver ──► [queue] ──► Queue::recv ──► dispatch loop
//! ```
//!
//! ## Rules
//! - One queue per subscription; no cross-subscription locking.
//! - FIFO per queue.
//! - Once [`Queue::close`] runs, every `deliver` fails with [`Rejected::Closed`],
//!   including one already waiting for room in a full `Block` queue.
//! - Once a [`Broadcaster`](crate::Broadcaster) has removed a sink, every `deliver`
//!   on it (or any clone) fails with [`Rejected::Removed`]. The flag is checked and
//!   the record sent under one lock, so no send can slip past a finished `remove`.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio::sync::mpsc;

use crate::config::QueuePolicy;
use crate::events::EventMessage;

/// Global sequence for sink identities.
static SINK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

impl SinkId {
    fn next() -> Self {
        Self(SINK_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw numeric id.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// Why a sink did not accept a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// The queue was closed by its subscription.
    Closed,
    /// The bounded queue was full (drop-newest policy).
    Full,
    /// The sink was removed from its broadcaster.
    Removed,
}

#[derive(Debug, Clone)]
enum SinkTx {
    Unbounded(mpsc::UnboundedSender<Arc<EventMessage>>),
    Block(mpsc::Sender<Arc<EventMessage>>),
    DropNewest(mpsc::Sender<Arc<EventMessage>>),
}

/// Publisher-side handle to one subscription's queue.
///
/// Cheap to clone; clones share the same identity and queue.
#[derive(Debug, Clone)]
pub struct Sink {
    id: SinkId,
    tx: SinkTx,
    removed: Arc<Mutex<bool>>,
}

impl Sink {
    /// Creates a new sink and its queue according to `policy`.
    pub fn channel(policy: &QueuePolicy) -> (Sink, Queue) {
        let id = SinkId::next();
        let (tx, rx) = match (*policy, policy.capacity()) {
            (QueuePolicy::Block { .. }, Some(cap)) => {
                let (tx, rx) = mpsc::channel(cap);
                (SinkTx::Block(tx), QueueRx::Bounded(rx))
            }
            (QueuePolicy::DropNewest { .. }, Some(cap)) => {
                let (tx, rx) = mpsc::channel(cap);
                (SinkTx::DropNewest(tx), QueueRx::Bounded(rx))
            }
            _ => {
                let (tx, rx) = mpsc::unbounded_channel();
                (SinkTx::Unbounded(tx), QueueRx::Unbounded(rx))
            }
        };
        (
            Sink {
                id,
                tx,
                removed: Arc::new(Mutex::new(false)),
            },
            Queue { rx },
        )
    }

    /// Identity of this sink.
    #[inline]
    pub fn id(&self) -> SinkId {
        self.id
    }

    /// Hands one record to the queue.
    ///
    /// - `Unbounded` / `DropNewest`: never waits.
    /// - `Block`: waits for room; fails with `Closed` if the queue closes meanwhile.
    /// - Fails with `Removed` once the sink has been removed from its broadcaster.
    pub async fn deliver(&self, ev: &Arc<EventMessage>) -> Result<(), Rejected> {
        match &self.tx {
            SinkTx::Unbounded(tx) => {
                self.if_registered(|| tx.send(Arc::clone(ev)).map_err(|_| Rejected::Closed))
            }
            SinkTx::Block(tx) => {
                let permit = tx.reserve().await.map_err(|_| Rejected::Closed)?;
                self.if_registered(|| {
                    permit.send(Arc::clone(ev));
                    Ok(())
                })
            }
            SinkTx::DropNewest(tx) => self.if_registered(|| match tx.try_send(Arc::clone(ev)) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => Err(Rejected::Full),
                Err(mpsc::error::TrySendError::Closed(_)) => Err(Rejected::Closed),
            }),
        }
    }

    /// Runs `send` unless the sink was removed; holds the flag lock throughout.
    fn if_registered(
        &self,
        send: impl FnOnce() -> Result<(), Rejected>,
    ) -> Result<(), Rejected> {
        let removed = self.removed.lock().unwrap_or_else(PoisonError::into_inner);
        if *removed {
            return Err(Rejected::Removed);
        }
        send()
    }

    /// Marks the sink (and all its clones) as removed or registered.
    ///
    /// Returns once no `deliver` is mid-send.
    pub(crate) fn set_removed(&self, removed: bool) {
        *self.removed.lock().unwrap_or_else(PoisonError::into_inner) = removed;
    }

    /// True if the queue has been closed or dropped.
    pub fn is_closed(&self) -> bool {
        match &self.tx {
            SinkTx::Unbounded(tx) => tx.is_closed(),
            SinkTx::Block(tx) | SinkTx::DropNewest(tx) => tx.is_closed(),
        }
    }
}

#[derive(Debug)]
enum QueueRx {
    Unbounded(mpsc::UnboundedReceiver<Arc<EventMessage>>),
    Bounded(mpsc::Receiver<Arc<EventMessage>>),
}

/// Consumer-side half of a sink's queue.
#[derive(Debug)]
pub struct Queue {
    rx: QueueRx,
}

impl Queue {
    /// Waits for the next record.
    ///
    /// Returns `None` once the queue is closed and drained, or every [`Sink`]
    /// clone has been dropped.
    pub async fn recv(&mut self) -> Option<Arc<EventMessage>> {
        match &mut self.rx {
            QueueRx::Unbounded(rx) => rx.recv().await,
            QueueRx::Bounded(rx) => rx.recv().await,
        }
    }

    /// Closes the queue and drops everything still buffered.
    ///
    /// Idempotent.
    pub fn close(&mut self) {
        match &mut self.rx {
            QueueRx::Unbounded(rx) => {
                rx.close();
                while rx.try_recv().is_ok() {}
            }
            QueueRx::Bounded(rx) => {
                rx.close();
                while rx.try_recv().is_ok() {}
            }
        }
    }
}
