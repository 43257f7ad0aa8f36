//! # Event bus: publish and subscribe.
//!
//! [`Events`] is the entry point. Publishers call [`Events::publish`]; each
//! [`Events::subscribe`] call gets an independent [`Subscription`] with its own
//! queue, filter and dispatch task.
//!
//! ## Architecture
//! ```text
//!   publish(action, type, actor)
//!        │  build EventMessage (UTC now, empty actor if none)
//!        ▼
//!   Broadcaster::write ── snapshot sinks ──┬──► [queue S1] ─► dispatch S1 ─► filter ─► EventStream S1
//!                                          ├──► [queue S2] ─► dispatch S2 ─► filter ─► EventStream S2
//!                                          └──► [queue SN] ─► dispatch SN ─► filter ─► EventStream SN
//! ```
//!
//! ## Guarantees
//! - Per-subscriber order equals publish order.
//! - Concurrent publishes are delivered one at a time, so all subscribers see the
//!   same total order (minus what their filters drop).
//! - A subscriber only sees events published after `subscribe` returned.
//! - A slow or cancelled subscriber never blocks delivery to others beyond its own
//!   handoff (only `QueuePolicy::Block` can make publish wait, and then every
//!   publisher waits behind it).
//! - No persistence, no replay.
//!
//! ## Example
//! ```rust
//! use eventcast::{Actor, Clause, EventType, Events, Field, Filter};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), eventcast::BusError> {
//! let bus = Events::new();
//! let token = CancellationToken::new();
//! let filter = Filter::new().with_clause(Clause::new().with(Field::Type, ["container"]));
//! let mut sub = bus.subscribe(token.clone(), Some(filter));
//!
//! bus.publish("pull", EventType::Image, None).await?;
//! bus.publish("start", EventType::Container, Some(Actor::new("c1"))).await?;
//!
//! let ev = sub.recv().await.expect("event");
//! assert_eq!(ev.action(), "start");
//!
//! token.cancel();
//! assert_eq!(sub.errors().recv().await, Some(Ok(())));
//! # Ok(())
//! # }
//! ```

mod broadcaster;
mod signal;
mod sink;
mod subscription;

pub use broadcaster::Broadcaster;
pub use signal::{Signal, Stop};
pub use sink::{Queue, Rejected, Sink, SinkId};
pub use subscription::{ErrorStream, EventStream, Subscription};

use std::sync::Arc;

use crate::config::BusConfig;
use crate::error::BusError;
use crate::events::{Actor, EventMessage, EventType};
use crate::filter::Filter;

/// In-process event bus.
///
/// Cheap to clone; clones share the same subscribers. Dropping the last clone
/// ends every active subscription with [`BusError::BroadcasterClosed`].
#[derive(Clone, Debug, Default)]
pub struct Events {
    broadcaster: Arc<Broadcaster>,
    config: BusConfig,
}

impl Events {
    /// Creates a bus with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bus with the given configuration.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            broadcaster: Arc::new(Broadcaster::new()),
            config,
        }
    }

    /// Configuration used for new subscriptions.
    #[inline]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Publishes an event to every current subscriber.
    ///
    /// The record is stamped with the current UTC time; `actor = None` becomes an
    /// empty [`Actor`]. Delivery is attempted for every subscriber even if one
    /// fails; the first failure is logged and returned.
    pub async fn publish(
        &self,
        action: impl Into<String>,
        kind: EventType,
        actor: Option<Actor>,
    ) -> Result<Arc<EventMessage>, BusError> {
        let msg = Arc::new(EventMessage::new(action, kind, actor));

        if let Err(e) = self.broadcaster.write(Arc::clone(&msg)).await {
            tracing::error!(
                action = msg.action(),
                event_type = %msg.kind(),
                id = %msg.actor().id,
                sink = e.sink().map(|s| s.get()),
                error = %e,
                "failed to publish event"
            );
            return Err(e);
        }
        Ok(msg)
    }

    /// Subscribes to events published from now on.
    ///
    /// Only events matching `filter` are delivered (`None` or an empty filter
    /// accepts everything). The subscription ends when `signal` fires; its
    /// terminal result arrives on [`Subscription::errors`].
    ///
    /// Must be called within a tokio runtime.
    pub fn subscribe(&self, signal: impl Into<Signal>, filter: Option<Filter>) -> Subscription {
        Subscription::spawn(&self.broadcaster, &self.config, signal.into(), filter)
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscribers(&self) -> usize {
        self.broadcaster.len()
    }
}
