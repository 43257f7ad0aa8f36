//! # Subscription filters.
//!
//! A [`Filter`] is a list of [`Clause`]s with OR-of-ANDs semantics:
//! - empty filter → matches every event
//! - otherwise → matches if **any** clause matches
//! - a clause matches if **all** of its constrained fields hold an accepted value
//!
//! Matching is pure and takes `&self`, so one filter can be evaluated concurrently
//! against a shared `Arc<EventMessage>`.
//!
//! ## Example
//! ```rust
//! use eventcast::{Actor, Clause, EventMessage, EventType, Field, Filter};
//!
//! let filter = Filter::new()
//!     .with_clause(Clause::new().with(Field::Type, ["container"]).with(Field::Action, ["start"]))
//!     .with_clause(Clause::new().with(Field::Type, ["image"]));
//!
//! assert!(filter.matches(&EventMessage::new("start", EventType::Container, None)));
//! assert!(filter.matches(&EventMessage::new("pull", EventType::Image, None)));
//! assert!(!filter.matches(&EventMessage::new("stop", EventType::Container, None)));
//! ```
//!
//! ## JSON input
//! [`Filter::from_json`] accepts one object (a single clause) or an array of objects.
//! Values may be a string, an array of strings, or a legacy `{"value": true}` map:
//! ```text
//! {"type": "container", "event": ["start", "die"]}
//! [{"type": ["image"]}, {"attr.image": {"alpine": true}}]
//! ```

mod clause;

pub use clause::{Clause, Field};

use serde_json::Value;

use crate::error::FilterError;
use crate::events::EventMessage;

/// Set of alternative [`Clause`]s; immutable once handed to a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Creates an empty filter (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a clause.
    #[must_use]
    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Appends a clause.
    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Returns `true` if the filter is empty or any clause matches `ev`.
    pub fn matches(&self, ev: &EventMessage) -> bool {
        self.clauses.is_empty() || self.clauses.iter().any(|c| c.matches(ev))
    }

    /// Clauses in insertion order.
    #[inline]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Number of clauses.
    #[inline]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// True if there are no clauses.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Parses a filter from JSON (see the module docs for the accepted shapes).
    pub fn from_json(input: &str) -> Result<Self, FilterError> {
        let root: Value =
            serde_json::from_str(input).map_err(|e| FilterError::InvalidJson(e.to_string()))?;

        match root {
            Value::Object(_) => Ok(Filter::new().with_clause(parse_clause(&root)?)),
            Value::Array(items) => items
                .iter()
                .map(parse_clause)
                .collect::<Result<Vec<_>, _>>()
                .map(|clauses| Filter { clauses }),
            other => Err(FilterError::InvalidJson(format!(
                "expected object or array, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl FromIterator<Clause> for Filter {
    fn from_iter<I: IntoIterator<Item = Clause>>(iter: I) -> Self {
        Self {
            clauses: iter.into_iter().collect(),
        }
    }
}

fn parse_clause(value: &Value) -> Result<Clause, FilterError> {
    let Value::Object(map) = value else {
        return Err(FilterError::InvalidJson(format!(
            "clause must be an object, got {}",
            json_kind(value)
        )));
    };

    let mut clause = Clause::new();
    for (name, raw) in map {
        let field: Field = name.parse()?;
        let accepted = clause.entry(field);
        match raw {
            Value::String(s) => {
                accepted.insert(s.clone());
            }
            Value::Array(items) => {
                for item in items {
                    let Value::String(s) = item else {
                        return Err(invalid(name, "array items must be strings"));
                    };
                    accepted.insert(s.clone());
                }
            }
            Value::Object(legacy) => {
                for (s, enabled) in legacy {
                    match enabled {
                        Value::Bool(true) => {
                            accepted.insert(s.clone());
                        }
                        Value::Bool(false) => {}
                        _ => return Err(invalid(name, "map values must be booleans")),
                    }
                }
            }
            other => {
                return Err(invalid(
                    name,
                    &format!("expected string, array or map, got {}", json_kind(other)),
                ));
            }
        }
    }
    Ok(clause)
}

fn invalid(field: &str, reason: &str) -> FilterError {
    FilterError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Actor, EventType};

    fn ev(action: &str, kind: EventType, image: Option<&str>) -> EventMessage {
        let mut actor = Actor::new("obj");
        if let Some(image) = image {
            actor = actor.with_attribute("image", image);
        }
        EventMessage::new(action, kind, Some(actor))
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let f = Filter::new();
        for t in EventType::ALL {
            assert!(f.matches(&ev("anything", t, None)));
        }
    }

    #[test]
    fn test_any_clause_matches() {
        let f: Filter = [
            Clause::new().with(Field::Type, ["container"]),
            Clause::new().with(Field::Action, ["pull"]),
        ]
        .into_iter()
        .collect();

        assert!(f.matches(&ev("start", EventType::Container, None)));
        assert!(f.matches(&ev("pull", EventType::Image, None)));
        assert!(!f.matches(&ev("tag", EventType::Image, None)));
    }

    #[test]
    fn test_clause_order_is_irrelevant() {
        let a = Clause::new().with(Field::Type, ["network"]);
        let b = Clause::new().with(Field::Action, ["die"]);
        let f1 = Filter::new().with_clause(a.clone()).with_clause(b.clone());
        let f2 = Filter::new().with_clause(b).with_clause(a);

        for e in [
            ev("create", EventType::Network, None),
            ev("die", EventType::Container, None),
            ev("start", EventType::Container, None),
        ] {
            assert_eq!(f1.matches(&e), f2.matches(&e));
        }
    }

    #[test]
    fn test_from_json_object() {
        let f = Filter::from_json(r#"{"type": "container", "event": ["start", "die"]}"#).unwrap();
        assert_eq!(f.len(), 1);
        assert!(f.matches(&ev("die", EventType::Container, None)));
        assert!(!f.matches(&ev("die", EventType::Image, None)));
    }

    #[test]
    fn test_from_json_array_and_legacy_map() {
        let f = Filter::from_json(
            r#"[{"type": ["image"]}, {"attr.image": {"alpine": true, "busybox": false}}]"#,
        )
        .unwrap();
        assert_eq!(f.len(), 2);
        assert!(f.matches(&ev("pull", EventType::Image, None)));
        assert!(f.matches(&ev("start", EventType::Container, Some("alpine"))));
        assert!(!f.matches(&ev("start", EventType::Container, Some("busybox"))));
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            Filter::from_json("not json"),
            Err(FilterError::InvalidJson(_))
        ));
        assert!(matches!(
            Filter::from_json("42"),
            Err(FilterError::InvalidJson(_))
        ));
        assert_eq!(
            Filter::from_json(r#"{"colour": "red"}"#),
            Err(FilterError::UnknownField("colour".into()))
        );
        assert!(matches!(
            Filter::from_json(r#"{"type": [1, 2]}"#),
            Err(FilterError::InvalidValue { .. })
        ));
        assert!(matches!(
            Filter::from_json(r#"{"type": null}"#),
            Err(FilterError::InvalidValue { .. })
        ));
    }
}
