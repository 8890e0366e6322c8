//! Identifier normalization
//!
//! Callers may target a document by its id, by the id's string form, or by
//! a filter that carries the id in `_id` next to other match conditions.
//! [`Selector::split`] reduces all of them to the canonical
//! `(DocumentId, Filter-without-_id)` pair used as event key and channel name.

use crate::document::{DocumentId, Filter, ID_FIELD};
use crate::{Error, Result};
use serde_json::Value;

/// Target of an update / findAndModify call, in any accepted shorthand
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// A bare identifier (or its string form)
    Id(DocumentId),
    /// A filter that must contain `_id`
    Filter(Filter),
    /// Unresolved JSON: a string/`{"$oid"}` id or a filter object
    Value(Value),
}

impl Selector {
    /// Split into the document id and the remaining match conditions.
    ///
    /// The returned filter never contains `_id`; the order of the other keys
    /// is preserved. Fails with `InvalidIdentifier` when no id can be found.
    pub fn split(self) -> Result<(DocumentId, Filter)> {
        match self {
            Selector::Id(id) => {
                if id.as_str().is_empty() {
                    return Err(Error::InvalidIdentifier("empty identifier".into()));
                }
                Ok((id, Filter::new()))
            }
            Selector::Filter(filter) => split_filter(filter),
            Selector::Value(value) => match value {
                Value::Object(map) => match DocumentId::from_value(&Value::Object(map.clone())) {
                    // `{"$oid": ..}` is an id, not a filter
                    Some(id) if !map.contains_key(ID_FIELD) => Ok((id, Filter::new())),
                    _ => split_filter(map),
                },
                other => DocumentId::from_value(&other)
                    .map(|id| (id, Filter::new()))
                    .ok_or_else(|| {
                        Error::InvalidIdentifier(format!("{} is not a document identifier", other))
                    }),
            },
        }
    }
}

fn split_filter(filter: Filter) -> Result<(DocumentId, Filter)> {
    let id = match filter.get(ID_FIELD) {
        Some(value) => DocumentId::from_value(value).ok_or_else(|| {
            Error::InvalidIdentifier(format!("`_id` value {} does not name one document", value))
        })?,
        None => {
            return Err(Error::InvalidIdentifier(
                "filter has no `_id` condition".into(),
            ))
        }
    };

    let rest = filter
        .into_iter()
        .filter(|(key, _)| key != ID_FIELD)
        .collect();
    Ok((id, rest))
}

impl From<DocumentId> for Selector {
    fn from(id: DocumentId) -> Self {
        Selector::Id(id)
    }
}

impl From<&DocumentId> for Selector {
    fn from(id: &DocumentId) -> Self {
        Selector::Id(id.clone())
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::Id(DocumentId::from(s))
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        Selector::Id(DocumentId::from(s))
    }
}

impl From<Filter> for Selector {
    fn from(filter: Filter) -> Self {
        Selector::Filter(filter)
    }
}

impl From<Value> for Selector {
    fn from(value: Value) -> Self {
        Selector::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Filter {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_bare_id_has_empty_filter() {
        let (id, filter) = Selector::from(DocumentId::new("abc")).split().unwrap();
        assert_eq!(id.as_str(), "abc");
        assert!(filter.is_empty());
    }

    #[test]
    fn test_string_and_id_forms_agree() {
        let id = DocumentId::generate();
        let a = Selector::from(&id).split().unwrap();
        let b = Selector::from(id.to_string()).split().unwrap();
        let c = Selector::from(obj(json!({"_id": id.as_str()}))).split().unwrap();
        let d = Selector::from(json!({"_id": {"$oid": id.as_str()}})).split().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, d);
    }

    #[test]
    fn test_filter_keeps_other_conditions_in_order() {
        let filter = obj(json!({"z": 1, "_id": "abc", "test.a": "b", "a": 2}));
        let (id, rest) = Selector::from(filter).split().unwrap();
        assert_eq!(id.as_str(), "abc");
        assert_eq!(Value::Object(rest.clone()), json!({"z": 1, "test.a": "b", "a": 2}));
        assert_eq!(
            rest.keys().cloned().collect::<Vec<_>>(),
            vec!["z", "test.a", "a"]
        );
    }

    #[test]
    fn test_filter_without_id_is_invalid() {
        let err = Selector::from(obj(json!({"a": 1}))).split().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_operator_id_is_invalid() {
        let err = Selector::from(obj(json!({"_id": {"$in": ["a", "b"]}})))
            .split()
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_value_forms() {
        let (id, rest) = Selector::from(json!("abc")).split().unwrap();
        assert_eq!(id.as_str(), "abc");
        assert!(rest.is_empty());

        let (id, rest) = Selector::from(json!({"$oid": "abc"})).split().unwrap();
        assert_eq!(id.as_str(), "abc");
        assert!(rest.is_empty());

        assert!(Selector::from(json!(null)).split().is_err());
        assert!(Selector::from(json!(true)).split().is_err());
        assert!(Selector::from(json!("")).split().is_err());
    }

    #[test]
    fn test_empty_id_is_invalid() {
        assert!(Selector::from("").split().is_err());
    }
}
