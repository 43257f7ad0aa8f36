//! # Event records published on the bus.
//!
//! [`EventMessage`] is the immutable record every subscriber receives. It is built
//! once per publish, stamped with the UTC wall-clock time of publication, and shared
//! as `Arc<EventMessage>` with every subscriber.
//!
//! ## Legacy projection
//! For consumers expecting the older flat shape, some types also surface:
//! - [`EventType::Container`]: `id = actor.id`, `status = action`, `from = actor.attributes["image"]`
//! - [`EventType::Image`]: `id = actor.id`, `status = action`
//!
//! ## Example
//! ```rust
//! use eventcast::{Actor, EventMessage, EventType};
//!
//! let ev = EventMessage::new(
//!     "create",
//!     EventType::Container,
//!     Some(Actor::new("c1").with_attribute("image", "alpine")),
//! );
//!
//! assert_eq!(ev.id(), Some("c1"));
//! assert_eq!(ev.status(), Some("create"));
//! assert_eq!(ev.from(), Some("alpine"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::UnknownEventType;

/// Classification of the object an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Container lifecycle (create, start, die, ...).
    Container,
    /// Daemon-level events (reload, ...).
    Daemon,
    /// Image operations (pull, tag, delete, ...).
    Image,
    /// Network operations.
    Network,
    /// Plugin operations.
    Plugin,
    /// Volume operations.
    Volume,
}

impl EventType {
    /// All event types, in declaration order.
    pub const ALL: [EventType; 6] = [
        EventType::Container,
        EventType::Daemon,
        EventType::Image,
        EventType::Network,
        EventType::Plugin,
        EventType::Volume,
    ];

    /// Returns the lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Container => "container",
            EventType::Daemon => "daemon",
            EventType::Image => "image",
            EventType::Network => "network",
            EventType::Plugin => "plugin",
            EventType::Volume => "volume",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// The object an event is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Actor {
    /// Identifier of the object (container id, image name, ...).
    #[serde(rename = "ID")]
    pub id: String,
    /// Free-form attributes (`image`, `name`, labels, ...).
    #[serde(rename = "Attributes")]
    pub attributes: HashMap<String, String>,
}

impl Actor {
    /// Creates an actor with the given id and no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    /// Attaches an attribute.
    #[inline]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns an attribute value, if present.
    #[inline]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Immutable event record delivered to subscribers.
///
/// - `time` / `time_nano`: Unix seconds / nanoseconds at publication (UTC)
/// - `actor`: never absent; an empty [`Actor`] is substituted when none is given
/// - `id` / `status` / `from`: legacy projections computed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<String>,

    #[serde(rename = "Type")]
    kind: EventType,
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "Actor")]
    actor: Actor,

    time: i64,
    #[serde(rename = "timeNano")]
    time_nano: i64,
}

impl EventMessage {
    /// Creates a record stamped with the current UTC time.
    pub fn new(action: impl Into<String>, kind: EventType, actor: Option<Actor>) -> Self {
        Self::at(action, kind, actor, SystemTime::now())
    }

    /// Creates a record stamped with the given time.
    ///
    /// Times before the Unix epoch are stamped as `0`.
    pub fn at(
        action: impl Into<String>,
        kind: EventType,
        actor: Option<Actor>,
        now: SystemTime,
    ) -> Self {
        let action = action.into();
        let actor = actor.unwrap_or_default();
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();

        let (id, status, from) = match kind {
            EventType::Container => (
                Some(actor.id.clone()),
                Some(action.clone()),
                actor.attribute("image").map(str::to_owned),
            ),
            EventType::Image => (Some(actor.id.clone()), Some(action.clone()), None),
            _ => (None, None, None),
        };

        Self {
            status,
            id,
            from,
            kind,
            action,
            actor,
            time: i64::try_from(since_epoch.as_secs()).unwrap_or(i64::MAX),
            time_nano: i64::try_from(since_epoch.as_nanos()).unwrap_or(i64::MAX),
        }
    }

    /// Action verb (`create`, `start`, `pull`, ...).
    #[inline]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Event classification.
    #[inline]
    pub fn kind(&self) -> EventType {
        self.kind
    }

    /// Object the event is about.
    #[inline]
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Unix seconds at publication.
    #[inline]
    pub fn time(&self) -> i64 {
        self.time
    }

    /// Unix nanoseconds at publication.
    #[inline]
    pub fn time_nano(&self) -> i64 {
        self.time_nano
    }

    /// Legacy `id` (container and image events only).
    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Legacy `status` (container and image events only).
    #[inline]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Legacy `from`: the container's image, if the actor carries one.
    #[inline]
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }
}
