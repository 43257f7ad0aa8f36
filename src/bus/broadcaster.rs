//! # Broadcaster: sink registry + sequential fan-out.
//!
//! [`Broadcaster`] owns the set of registered [`Sink`]s and hands every written
//! record to each of them in turn.
//!
//! ## Rules
//! - **One pass at a time**: concurrent `write` calls are serialized, so every
//!   sink observes the same total order of records.
//! - **Snapshot-and-release**: a pass copies the registry under a read lock and
//!   releases it before delivering, so `add`/`remove` never wait on a slow sink.
//! - **Removal is final**: once `remove` returns, no in-flight pass delivers to that
//!   sink (the sink's removed flag is checked under the same lock as the send).
//! - **No all-or-nothing**: every sink is attempted even if an earlier one failed;
//!   the first failure is returned.
//! - **Closed sinks are pruned**: a sink whose queue was closed belongs to a
//!   subscription that is tearing down. It is removed silently, not reported.
//! - **Fan-out order**: sinks are visited in registration order.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex;

use crate::error::BusError;
use crate::events::EventMessage;

use super::sink::{Rejected, Sink, SinkId};

/// Thread-safe registry of sinks with a sequential dispatcher.
#[derive(Debug, Default)]
pub struct Broadcaster {
    sinks: RwLock<BTreeMap<SinkId, Sink>>,
    /// Held for the whole of one `write` pass.
    pass: Mutex<()>,
}

impl Broadcaster {
    /// Creates an empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink. Re-adding a removed sink makes it deliverable again.
    pub fn add(&self, sink: Sink) {
        sink.set_removed(false);
        self.write_guard().insert(sink.id(), sink);
    }

    /// Unregisters a sink.
    ///
    /// After this returns, no `write` (including one already in flight) hands a
    /// record to the sink. Returns `false` if the sink was unknown or already
    /// removed (no-op).
    pub fn remove(&self, id: SinkId) -> bool {
        let removed = self.write_guard().remove(&id);
        match removed {
            Some(sink) => {
                sink.set_removed(true);
                true
            }
            None => false,
        }
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    /// True if no sink is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    /// Delivers `ev` to every registered sink.
    ///
    /// Waits for any earlier pass to finish, then only at a sink's handoff
    /// (bounded `Block` queues), never for a subscriber to consume. Returns the
    /// first [`BusError::SinkFull`], after all sinks have been attempted.
    pub async fn write(&self, ev: Arc<EventMessage>) -> Result<(), BusError> {
        let _pass = self.pass.lock().await;
        let snapshot: Vec<Sink> = self.read_guard().values().cloned().collect();

        let mut first_err = None;
        let mut closed = Vec::new();

        for sink in &snapshot {
            match sink.deliver(&ev).await {
                Ok(()) => {}
                Err(Rejected::Closed) => closed.push(sink.id()),
                Err(Rejected::Removed) => {}
                Err(Rejected::Full) => {
                    first_err.get_or_insert(BusError::SinkFull { sink: sink.id() });
                }
            }
        }

        if !closed.is_empty() {
            let mut sinks = self.write_guard();
            for id in closed {
                if sinks.remove(&id).is_some() {
                    tracing::trace!(sink = %id, "pruned closed sink");
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, BTreeMap<SinkId, Sink>> {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, BTreeMap<SinkId, Sink>> {
        self.sinks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueuePolicy;
    use crate::events::EventType;

    fn ev(action: &str) -> Arc<EventMessage> {
        Arc::new(EventMessage::new(action, EventType::Image, None))
    }

    #[tokio::test]
    async fn test_write_reaches_every_sink_in_order() {
        let b = Broadcaster::new();
        let (s1, mut q1) = Sink::channel(&QueuePolicy::Unbounded);
        let (s2, mut q2) = Sink::channel(&QueuePolicy::Unbounded);
        b.add(s1);
        b.add(s2);
        assert_eq!(b.len(), 2);

        for a in ["pull", "tag", "delete"] {
            b.write(ev(a)).await.unwrap();
        }
        for q in [&mut q1, &mut q2] {
            for a in ["pull", "tag", "delete"] {
                assert_eq!(q.recv().await.unwrap().action(), a);
            }
        }
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let b = Broadcaster::new();
        let (s, _q) = Sink::channel(&QueuePolicy::Unbounded);
        let id = s.id();
        assert!(!b.remove(id));
        b.add(s);
        assert!(b.remove(id));
        assert!(!b.remove(id));
        assert!(b.is_empty());
    }

    #[tokio::test]
    async fn test_removed_sink_gets_nothing() {
        let b = Broadcaster::new();
        let (s, mut q) = Sink::channel(&QueuePolicy::Unbounded);
        let id = s.id();
        b.add(s);
        b.write(ev("before")).await.unwrap();
        b.remove(id);
        b.write(ev("after")).await.unwrap();

        assert_eq!(q.recv().await.unwrap().action(), "before");
        assert!(q.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_remove_excludes_in_flight_write() {
        let b = Arc::new(Broadcaster::new());
        let (blocking, mut qx) = Sink::channel(&QueuePolicy::Block { capacity: 1 });
        let (removed, mut qr) = Sink::channel(&QueuePolicy::Unbounded);
        let removed_id = removed.id();
        b.add(blocking);
        b.add(removed);

        b.write(ev("fill")).await.unwrap();
        assert_eq!(qr.recv().await.unwrap().action(), "fill");

        let pending = {
            let b = Arc::clone(&b);
            tokio::spawn(async move { b.write(ev("late")).await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        assert!(b.remove(removed_id));
        assert_eq!(qx.recv().await.unwrap().action(), "fill");
        assert_eq!(pending.await.unwrap(), Ok(()));

        assert_eq!(qx.recv().await.unwrap().action(), "late");
        assert!(qr.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_give_every_sink_the_same_order() {
        const PER_WRITER: usize = 2000;

        let b = Arc::new(Broadcaster::new());
        let mut queues = Vec::new();
        for _ in 0..3 {
            let (s, q) = Sink::channel(&QueuePolicy::Unbounded);
            b.add(s);
            queues.push(q);
        }

        let writers: Vec<_> = (0..2)
            .map(|w| {
                let b = Arc::clone(&b);
                tokio::spawn(async move {
                    for i in 0..PER_WRITER {
                        b.write(ev(&format!("w{w}-{i}"))).await.unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.await.unwrap();
        }

        let mut seen = Vec::new();
        for q in &mut queues {
            let mut order = Vec::with_capacity(2 * PER_WRITER);
            for _ in 0..2 * PER_WRITER {
                order.push(q.recv().await.unwrap().action().to_owned());
            }
            seen.push(order);
        }
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[0], seen[2]);

        for w in 0..2 {
            let prefix = format!("w{w}-");
            let own: Vec<&String> = seen[0].iter().filter(|a| a.starts_with(&prefix)).collect();
            let expected: Vec<String> = (0..PER_WRITER).map(|i| format!("w{w}-{i}")).collect();
            assert!(own.iter().zip(&expected).all(|(a, e)| *a == e));
            assert_eq!(own.len(), PER_WRITER);
        }
    }

    #[tokio::test]
    async fn test_full_sink_does_not_stop_fan_out() {
        let b = Broadcaster::new();
        let (full, _qf) = Sink::channel(&QueuePolicy::DropNewest { capacity: 1 });
        let full_id = full.id();
        let (ok, mut qo) = Sink::channel(&QueuePolicy::Unbounded);
        b.add(full);
        b.add(ok);

        b.write(ev("first")).await.unwrap();
        assert_eq!(
            b.write(ev("second")).await,
            Err(BusError::SinkFull { sink: full_id })
        );

        assert_eq!(qo.recv().await.unwrap().action(), "first");
        assert_eq!(qo.recv().await.unwrap().action(), "second");
        assert_eq!(b.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_sink_is_pruned_silently() {
        let b = Broadcaster::new();
        let (s, mut q) = Sink::channel(&QueuePolicy::Unbounded);
        b.add(s);
        q.close();

        assert_eq!(b.write(ev("x")).await, Ok(()));
        assert!(b.is_empty());
    }
}
