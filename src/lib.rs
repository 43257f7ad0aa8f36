//! # eventcast
//!
//! **eventcast** is an in-process event broadcast bus for Tokio applications.
//!
//! A single publisher-facing entry point accepts event records and fans them out,
//! in publish order, to any number of independent subscribers. Each subscriber has
//! its own queue, its own filter, and its own cancellation signal; a slow or
//! cancelled subscriber never corrupts delivery to the others, and no background
//! work outlives a subscription.
//!
//! ## Architecture
//! ```text
//!     publisher        publisher        publisher
//!         │                │                │
//!         └────────────────┼────────────────┘
//!                          ▼
//!                ┌───────────────────┐
//!                │  Events::publish  │  build EventMessage (UTC now)
//!                └─────────┬─────────┘
//!                          ▼
//!                ┌───────────────────┐
//!                │    Broadcaster    │  RwLock<BTreeMap<SinkId, Sink>>
//!                │ snapshot + fan-out│  one pass at a time, first error wins
//!                └──┬──────┬──────┬──┘
//!                   ▼      ▼      ▼
//!                 [Q1]   [Q2]   [QN]     per-subscription queue (QueuePolicy)
//!                   ▼      ▼      ▼
//!              dispatch dispatch dispatch  select { signal | queue } → filter
//!                   ▼      ▼      ▼        select { signal | handoff }
//!              EventStream ...  EventStream
//!              ErrorStream ...  ErrorStream  exactly one terminal value
//! ```
//!
//! ### Subscription lifecycle
//! ```text
//! ACTIVE ──► signal fired / consumer dropped stream / bus dropped
//!        ──► DRAINING: close queue, deregister sink
//!        ──► CLOSED:   one terminal value on ErrorStream
//!                       Ok(())                    on cancellation
//!                       Err(DeadlineExceeded)     on deadline
//!                       Err(BroadcasterClosed)    if the bus was dropped
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types                                 |
//! |-------------------|-------------------------------------------------------------|-------------------------------------------|
//! | **Bus**           | Publish and subscribe.                                      | [`Events`], [`Subscription`]              |
//! | **Events**        | Immutable records with legacy flat projection.              | [`EventMessage`], [`EventType`], [`Actor`]|
//! | **Filters**       | OR-of-ANDs field matching, JSON input.                      | [`Filter`], [`Clause`], [`Field`]         |
//! | **Cancellation**  | Token plus optional deadline.                               | [`Signal`]                                |
//! | **Low level**     | Sink registry and queues.                                   | [`Broadcaster`], [`Sink`], [`Queue`]      |
//! | **Errors**        | Typed errors with stable labels.                            | [`BusError`], [`FilterError`]             |
//! | **Configuration** | Queue capacity policy, stream buffer.                       | [`BusConfig`], [`QueuePolicy`]            |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a consumer that logs every event via `tracing`.
//!
//! ## Example
//! ```rust
//! use eventcast::{Actor, EventType, Events};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Events::new();
//!
//!     let token = CancellationToken::new();
//!     let mut sub = bus.subscribe(token.clone(), None);
//!
//!     bus.publish(
//!         "create",
//!         EventType::Container,
//!         Some(Actor::new("c1").with_attribute("image", "alpine")),
//!     )
//!     .await?;
//!
//!     let ev = sub.recv().await.ok_or("stream ended")?;
//!     assert_eq!(ev.from(), Some("alpine"));
//!
//!     token.cancel();
//!     sub.errors().recv().await.transpose()?;
//!     Ok(())
//! }
//! ```

mod bus;
mod config;
mod error;
mod events;
mod filter;

// ---- Public re-exports ----

pub use bus::{
    Broadcaster, ErrorStream, EventStream, Events, Queue, Rejected, Signal, Sink, SinkId, Stop,
    Subscription,
};
pub use config::{BusConfig, QueuePolicy};
pub use error::{BusError, FilterError, UnknownEventType};
pub use events::{Actor, EventMessage, EventType};
pub use filter::{Clause, Field, Filter};

// Optional: expose a built-in logging consumer.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
mod subscribers;
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
