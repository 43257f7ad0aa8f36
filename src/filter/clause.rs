//! # Filter fields and clauses.
//!
//! A [`Clause`] maps each constrained [`Field`] to a set of accepted values. It matches
//! an event when **every** constrained field holds an accepted value. Fields it does
//! not mention are unconstrained.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;
use crate::events::EventMessage;

/// Prefix of attribute field names (`attr.image`, `attr.name`, ...).
const ATTR_PREFIX: &str = "attr.";

/// Event field a clause can constrain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// Event type (`container`, `image`, ...).
    Type,
    /// Action verb.
    Action,
    /// Actor id.
    ActorId,
    /// Actor attribute with the given key.
    Attribute(String),
}

impl Field {
    fn value_of<'a>(&self, ev: &'a EventMessage) -> Option<&'a str> {
        match self {
            Field::Type => Some(ev.kind().as_str()),
            Field::Action => Some(ev.action()),
            Field::ActorId => Some(ev.actor().id.as_str()),
            Field::Attribute(key) => ev.actor().attribute(key),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Type => f.write_str("type"),
            Field::Action => f.write_str("action"),
            Field::ActorId => f.write_str("id"),
            Field::Attribute(key) => write!(f, "{ATTR_PREFIX}{key}"),
        }
    }
}

impl FromStr for Field {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "type" => Ok(Field::Type),
            "action" | "event" => Ok(Field::Action),
            "id" | "actor" => Ok(Field::ActorId),
            _ => match s.strip_prefix(ATTR_PREFIX) {
                Some(key) if !key.is_empty() => Ok(Field::Attribute(key.to_owned())),
                _ => Err(FilterError::UnknownField(s.to_owned())),
            },
        }
    }
}

/// One alternative acceptance profile of a [`Filter`](crate::Filter).
///
/// ### Matching
/// - no fields → matches everything
/// - a field with an empty value set → never matches
/// - [`Field::Attribute`] → the actor must carry the key with an accepted value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clause {
    fields: BTreeMap<Field, BTreeSet<String>>,
}

impl Clause {
    /// Creates an empty clause.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrains `field` to the given values (added to any already accepted).
    #[must_use]
    pub fn with<I, S>(mut self, field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .entry(field)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Adds one accepted value for `field`.
    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        self.fields.entry(field).or_default().insert(value.into());
    }

    /// Returns `true` if every constrained field of `ev` holds an accepted value.
    pub fn matches(&self, ev: &EventMessage) -> bool {
        self.fields.iter().all(|(field, accepted)| {
            field
                .value_of(ev)
                .is_some_and(|value| accepted.contains(value))
        })
    }

    /// Number of constrained fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no field is constrained.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(super) fn entry(&mut self, field: Field) -> &mut BTreeSet<String> {
        self.fields.entry(field).or_default()
    }
}
