//! # Bus configuration.
//!
//! Provides [`BusConfig`], the settings used by [`Events`](crate::Events) when it
//! creates subscriptions.
//!
//! ## Sentinel values
//! - queue `capacity = 0` → clamped to 1
//! - `stream_capacity = 0` → clamped to 1

use serde::Deserialize;

/// Capacity policy of a subscription's delivery queue.
///
/// The queue sits between the publisher and the subscription's dispatch loop.
/// It decides what a publish does when a subscriber falls behind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueuePolicy {
    /// No capacity limit. Publish never waits and never drops; a slow
    /// subscriber's backlog grows without bound.
    #[default]
    Unbounded,

    /// At most `capacity` queued records. Publish waits at this subscriber's
    /// handoff until there is room (backpressure, no drops).
    Block {
        /// Maximum queued records (min 1).
        capacity: usize,
    },

    /// At most `capacity` queued records. A record arriving at a full queue
    /// is dropped for this subscriber and reported as
    /// [`BusError::SinkFull`](crate::BusError::SinkFull).
    DropNewest {
        /// Maximum queued records (min 1).
        capacity: usize,
    },
}

impl QueuePolicy {
    /// Returns the queue capacity as an `Option`, clamped to a minimum of 1.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → bounded to `n`
    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        match *self {
            QueuePolicy::Unbounded => None,
            QueuePolicy::Block { capacity } | QueuePolicy::DropNewest { capacity } => {
                Some(capacity.max(1))
            }
        }
    }
}

/// Configuration for an [`Events`](crate::Events) bus.
///
/// ## Field semantics
/// - `queue`: per-subscription queue policy (see [`QueuePolicy`])
/// - `stream_capacity`: buffer between the dispatch loop and the consumer (min 1)
///
/// Can be deserialized from an application config; missing fields take defaults:
/// ```
/// use eventcast::{BusConfig, QueuePolicy};
///
/// let cfg: BusConfig = serde_json::from_str(r#"{"queue":{"mode":"block","capacity":64}}"#).unwrap();
/// assert_eq!(cfg.queue, QueuePolicy::Block { capacity: 64 });
/// assert_eq!(cfg.stream_capacity, 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Policy for each subscription's delivery queue.
    pub queue: QueuePolicy,

    /// Capacity of the consumer-facing event stream.
    ///
    /// The dispatch loop hands matched records to the consumer through this
    /// buffer. `1` approximates an unbuffered handoff.
    pub stream_capacity: usize,
}

impl BusConfig {
    /// Returns the stream capacity clamped to a minimum of 1.
    #[inline]
    pub fn stream_capacity_clamped(&self) -> usize {
        self.stream_capacity.max(1)
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `queue = QueuePolicy::Unbounded`
    /// - `stream_capacity = 1`
    fn default() -> Self {
        Self {
            queue: QueuePolicy::Unbounded,
            stream_capacity: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_clamped() {
        assert_eq!(QueuePolicy::Unbounded.capacity(), None);
        assert_eq!(QueuePolicy::Block { capacity: 0 }.capacity(), Some(1));
        assert_eq!(QueuePolicy::DropNewest { capacity: 8 }.capacity(), Some(8));

        let cfg = BusConfig {
            stream_capacity: 0,
            ..BusConfig::default()
        };
        assert_eq!(cfg.stream_capacity_clamped(), 1);
    }

    #[test]
    fn test_deserialize_defaults() {
        let cfg: BusConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, BusConfig::default());

        let cfg: BusConfig =
            serde_json::from_str(r#"{"queue":{"mode":"drop_newest","capacity":2},"stream_capacity":4}"#)
                .unwrap();
        assert_eq!(cfg.queue, QueuePolicy::DropNewest { capacity: 2 });
        assert_eq!(cfg.stream_capacity, 4);
    }
}
