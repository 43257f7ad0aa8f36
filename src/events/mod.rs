//! Event data model.
//!
//! ## Contents
//! - [`EventType`] classification of the object an event is about
//! - [`Actor`] the object itself (id + attributes)
//! - [`EventMessage`] the immutable record fanned out to subscribers

mod event;

pub use event::{Actor, EventMessage, EventType};
