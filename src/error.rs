//! Error types used by the event bus and filters.
//!
//! - [`BusError`] — errors raised while publishing or by a subscription's dispatch loop.
//! - [`FilterError`] — errors raised while building a [`Filter`](crate::Filter) from caller input.
//! - [`UnknownEventType`] — a string that names no [`EventType`](crate::EventType).
//!
//! The two enums provide `as_label` for logs/metrics.

use thiserror::Error;

use crate::bus::SinkId;

/// # Errors produced by the event bus.
///
/// Publish-time errors are returned to the publisher only. Dispatch-loop errors
/// are delivered on the owning subscription's [`ErrorStream`](crate::ErrorStream)
/// and never reach other subscriptions.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A bounded queue with [`QueuePolicy::DropNewest`](crate::QueuePolicy::DropNewest)
    /// was full; the record was dropped for that subscriber only.
    #[error("sink {sink} rejected event: queue full")]
    SinkFull {
        /// The sink that rejected the record.
        sink: SinkId,
    },

    /// The subscription's deadline passed before it was cancelled.
    #[error("subscription deadline exceeded")]
    DeadlineExceeded,

    /// The bus was dropped while the subscription was still active.
    #[error("event bus closed while subscription was active")]
    BroadcasterClosed,

    /// The dispatch task ended without reporting a terminal value.
    #[error("dispatch task aborted")]
    DispatchAborted,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventcast::BusError;
    ///
    /// assert_eq!(BusError::DeadlineExceeded.as_label(), "bus_deadline_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::SinkFull { .. } => "bus_sink_full",
            BusError::DeadlineExceeded => "bus_deadline_exceeded",
            BusError::BroadcasterClosed => "bus_closed",
            BusError::DispatchAborted => "bus_dispatch_aborted",
        }
    }

    /// The sink the error concerns, if any.
    pub fn sink(&self) -> Option<SinkId> {
        match self {
            BusError::SinkFull { sink } => Some(*sink),
            _ => None,
        }
    }
}

/// # Errors produced while parsing filter input.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Field name is not one of `type`, `action`/`event`, `id`/`actor`, `attr.<key>`.
    #[error("unknown filter field {0:?}")]
    UnknownField(String),

    /// Value for a field has an unsupported shape.
    #[error("invalid value for filter field {field:?}: {reason}")]
    InvalidValue {
        /// Field whose value was rejected.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Input is not valid JSON, or not an object / array of objects.
    #[error("invalid filter json: {0}")]
    InvalidJson(String),
}

impl FilterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            FilterError::UnknownField(_) => "filter_unknown_field",
            FilterError::InvalidValue { .. } => "filter_invalid_value",
            FilterError::InvalidJson(_) => "filter_invalid_json",
        }
    }
}

/// Returned when parsing a string that is not an event type name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown event type {0:?}")]
pub struct UnknownEventType(pub String);
