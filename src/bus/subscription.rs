//! # Subscriptions and the per-subscription dispatch loop.
//!
//! Each subscription owns one delivery [`Queue`] and one dispatch task that moves
//! matching records from the queue to the consumer's [`EventStream`].
//!
//! ## Lifecycle
//! ```text
//! ACTIVE ──(signal fired / consumer gone / bus dropped)──► DRAINING ──► CLOSED
//!
//! ACTIVE:
//!   loop {
//!     select (biased) { signal.done() | consumer closed | queue.recv() }
//!     ├─ filter rejects → discard, continue
//!     └─ select (biased) { signal.done() | out.send(ev) }
//!   }
//! DRAINING:  close queue (drop backlog) → deregister sink
//! CLOSED:    send exactly one terminal value on the ErrorStream, then drop it
//! ```
//!
//! ## Rules
//! - Cancellation is checked before every receive and every handoff, so nothing is
//!   delivered once the signal has fired, even with records still queued.
//! - Teardown runs exactly once: explicitly on exit, or from `Drop` if the task
//!   is aborted before reaching it.
//! - Terminal values: `Ok(())` on cancellation or when the consumer drops the event
//!   stream; [`BusError::DeadlineExceeded`] / [`BusError::BroadcasterClosed`] otherwise;
//!   [`BusError::DispatchAborted`] if the task died without reporting.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, oneshot};

use crate::config::BusConfig;
use crate::error::BusError;
use crate::events::EventMessage;
use crate::filter::Filter;

use super::broadcaster::Broadcaster;
use super::signal::Signal;
use super::sink::{Queue, Sink, SinkId};

/// Consumer-facing stream of matched records, in publish order.
///
/// Ends (`None`) once the subscription has terminated and the buffer is drained.
/// Dropping it ends the subscription.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Arc<EventMessage>>,
}

impl EventStream {
    /// Waits for the next record.
    pub async fn recv(&mut self) -> Option<Arc<EventMessage>> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = Arc<EventMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// At-most-one-value channel carrying a subscription's terminal result.
#[derive(Debug)]
pub struct ErrorStream {
    rx: Option<oneshot::Receiver<Result<(), BusError>>>,
}

impl ErrorStream {
    /// Waits for the terminal result.
    ///
    /// The first call yields `Some(result)`; every later call yields `None`.
    /// Cancel-safe: dropping the future before completion loses nothing.
    pub async fn recv(&mut self) -> Option<Result<(), BusError>> {
        let rx = self.rx.as_mut()?;
        let res = rx.await.unwrap_or(Err(BusError::DispatchAborted));
        self.rx = None;
        Some(res)
    }
}

/// Handle to one active subscription.
///
/// Ended only by its [`Signal`] (or by dropping the event stream).
#[derive(Debug)]
pub struct Subscription {
    sink: SinkId,
    events: EventStream,
    errors: ErrorStream,
}

impl Subscription {
    /// Identity of this subscription's sink.
    #[inline]
    pub fn id(&self) -> SinkId {
        self.sink
    }

    /// Waits for the next matched record. Shorthand for `events().recv()`.
    pub async fn recv(&mut self) -> Option<Arc<EventMessage>> {
        self.events.recv().await
    }

    /// The event stream.
    #[inline]
    pub fn events(&mut self) -> &mut EventStream {
        &mut self.events
    }

    /// The terminal-result stream.
    #[inline]
    pub fn errors(&mut self) -> &mut ErrorStream {
        &mut self.errors
    }

    /// Splits into the event and terminal-result streams.
    pub fn into_parts(self) -> (EventStream, ErrorStream) {
        (self.events, self.errors)
    }

    /// Registers a new sink on `registry` and spawns its dispatch loop.
    ///
    /// The sink is registered before this returns. Must be called within a
    /// tokio runtime.
    pub(crate) fn spawn(
        registry: &Arc<Broadcaster>,
        config: &BusConfig,
        signal: Signal,
        filter: Option<Filter>,
    ) -> Self {
        let (sink, queue) = Sink::channel(&config.queue);
        let id = sink.id();
        let (out_tx, out_rx) = mpsc::channel(config.stream_capacity_clamped());
        let (done_tx, done_rx) = oneshot::channel();

        registry.add(sink);
        tracing::debug!(sink = %id, "subscribed");

        let mut dispatch = Dispatch {
            sink: id,
            queue,
            out: out_tx,
            filter: filter.filter(|f| !f.is_empty()),
            signal,
            registry: Arc::downgrade(registry),
            torn_down: false,
        };

        tokio::spawn(async move {
            let res = dispatch.run().await;
            dispatch.teardown();
            match &res {
                Ok(()) => tracing::debug!(sink = %id, "subscription closed"),
                Err(e) => tracing::debug!(
                    sink = %id,
                    label = e.as_label(),
                    error = %e,
                    "subscription terminated"
                ),
            }
            let _ = done_tx.send(res);
        });

        Self {
            sink: id,
            events: EventStream { rx: out_rx },
            errors: ErrorStream { rx: Some(done_rx) },
        }
    }
}

/// State owned by one dispatch task.
struct Dispatch {
    sink: SinkId,
    queue: Queue,
    out: mpsc::Sender<Arc<EventMessage>>,
    filter: Option<Filter>,
    signal: Signal,
    registry: Weak<Broadcaster>,
    torn_down: bool,
}

impl Dispatch {
    async fn run(&mut self) -> Result<(), BusError> {
        let Self {
            queue,
            out,
            filter,
            signal,
            ..
        } = self;

        let done = signal.done();
        tokio::pin!(done);

        loop {
            let ev = tokio::select! {
                biased;
                stop = &mut done => return stop.into_result(),
                _ = out.closed() => return Ok(()),
                next = queue.recv() => match next {
                    Some(ev) => ev,
                    None => return Err(BusError::BroadcasterClosed),
                },
            };

            if filter.as_ref().is_some_and(|f| !f.matches(&ev)) {
                continue;
            }

            tokio::select! {
                biased;
                stop = &mut done => return stop.into_result(),
                sent = out.send(ev) => {
                    if sent.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Closes the queue, then deregisters the sink. Runs once.
    fn teardown(&mut self) {
        if std::mem::replace(&mut self.torn_down, true) {
            return;
        }
        self.queue.close();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.sink);
        }
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use futures::StreamExt;
    use tokio_util::sync::CancellationToken;

    fn ev(action: &str) -> Arc<EventMessage> {
        Arc::new(EventMessage::new(action, EventType::Network, None))
    }

    #[tokio::test]
    async fn test_error_stream_yields_once() {
        let registry = Arc::new(Broadcaster::new());
        let token = CancellationToken::new();
        let mut sub = Subscription::spawn(
            &registry,
            &BusConfig::default(),
            token.clone().into(),
            None,
        );

        token.cancel();
        token.cancel();
        assert_eq!(sub.errors().recv().await, Some(Ok(())));
        assert_eq!(sub.errors().recv().await, None);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_event_stream_is_a_stream() {
        let registry = Arc::new(Broadcaster::new());
        let token = CancellationToken::new();
        let sub = Subscription::spawn(
            &registry,
            &BusConfig::default(),
            token.clone().into(),
            None,
        );
        let (mut events, mut errors) = sub.into_parts();

        registry.write(ev("create")).await.unwrap();
        registry.write(ev("connect")).await.unwrap();
        assert_eq!(events.next().await.unwrap().action(), "create");
        assert_eq!(events.next().await.unwrap().action(), "connect");

        token.cancel();
        assert_eq!(errors.recv().await, Some(Ok(())));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_aborted_dispatch_still_tears_down() {
        let registry = Arc::new(Broadcaster::new());
        let (sink, queue) = Sink::channel(&BusConfig::default().queue);
        let id = sink.id();
        registry.add(sink);
        let (out, _rx) = mpsc::channel(1);

        let dispatch = Dispatch {
            sink: id,
            queue,
            out,
            filter: None,
            signal: CancellationToken::new().into(),
            registry: Arc::downgrade(&registry),
            torn_down: false,
        };
        drop(dispatch);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_sender_reports_aborted() {
        let (tx, rx) = oneshot::channel::<Result<(), BusError>>();
        let mut errors = ErrorStream { rx: Some(rx) };
        drop(tx);
        assert_eq!(errors.recv().await, Some(Err(BusError::DispatchAborted)));
        assert_eq!(errors.recv().await, None);
    }
}
