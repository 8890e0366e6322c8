//! Call-shape normalization
//!
//! `update` and `findAndModify` accept several argument shapes. Each shape
//! has its own constructor here and all of them funnel into [`OpRequest`],
//! the only request type the executor and the dispatcher ever see.

use crate::document::{into_object, DocumentId, Filter, OperationSpec, ID_FIELD};
use crate::events::OpEvent;
use crate::selector::Selector;
use crate::store::FindAndModifyOptions;
use crate::{Error, Result};
use serde_json::Value;

/// Canonical write request: target id, remaining match conditions, mutation
#[derive(Debug, Clone, PartialEq)]
pub struct OpRequest {
    pub id: DocumentId,
    /// Match conditions besides the id; never contains `_id`
    pub filter: Filter,
    /// Passed to the store as given
    pub operation: OperationSpec,
}

impl OpRequest {
    /// `update(identifierOrFilter, operation)`
    pub fn update(selector: impl Into<Selector>, operation: Value) -> Result<Self> {
        let (id, filter) = selector.into().split()?;
        let operation = into_object(operation, "update operation")?;
        Ok(Self {
            id,
            filter,
            operation,
        })
    }

    /// The filter handed to the store: `_id` first, then the other conditions
    pub fn store_filter(&self) -> Filter {
        let mut filter = Filter::with_capacity(self.filter.len() + 1);
        filter.insert(ID_FIELD.to_string(), self.id.to_value());
        for (key, value) in &self.filter {
            filter.insert(key.clone(), value.clone());
        }
        filter
    }

    /// Turn the request into the event broadcast after a successful write
    pub fn into_event(self) -> OpEvent {
        OpEvent::new(self.id, self.filter, self.operation)
    }
}

/// A normalized findAndModify call
#[derive(Debug, Clone, PartialEq)]
pub struct FindAndModify {
    pub request: OpRequest,
    pub options: FindAndModifyOptions,
}

impl FindAndModify {
    /// `findAndModify(identifierOrFilter, update)`
    pub fn new(selector: impl Into<Selector>, update: Value) -> Result<Self> {
        Ok(Self {
            request: OpRequest::update(selector, update)?,
            options: FindAndModifyOptions::default(),
        })
    }

    /// `findAndModify({query, update, new})`
    ///
    /// `query` may be an id string or a filter containing `_id`. Unknown
    /// members are ignored.
    pub fn from_options(options: Value) -> Result<Self> {
        let mut options = into_object(options, "findAndModify options")?;

        let query = options
            .remove("query")
            .ok_or_else(|| Error::InvalidIdentifier("findAndModify options have no `query`".into()))?;
        let update = options
            .remove("update")
            .ok_or_else(|| Error::InvalidRequest("findAndModify options have no `update`".into()))?;
        let return_new = match options.get("new") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(Error::InvalidRequest(format!(
                    "findAndModify `new` must be a boolean, got {}",
                    other
                )))
            }
        };

        Ok(Self::new(query, update)?.return_new(return_new))
    }

    /// Return the document as it is after the update
    pub fn return_new(mut self, return_new: bool) -> Self {
        self.options.return_new = return_new;
        self
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
    fn test_update_shapes_are_identical() {
        let id = DocumentId::generate();
        let op = json!({"$pull": {"a": "woot"}});

        let a = OpRequest::update(&id, op.clone()).unwrap();
        let b = OpRequest::update(id.to_string(), op.clone()).unwrap();
        let c = OpRequest::update(obj(json!({"_id": id.as_str()})), op.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(a.filter.is_empty());
        assert_eq!(Value::Object(a.operation), op);
    }

    #[test]
    fn test_positional_update_passes_through() {
        let req = OpRequest::update(
            obj(json!({"_id": "abc", "test.a": "b"})),
            json!({"test.$.a": "c"}),
        )
        .unwrap();
        assert_eq!(Value::Object(req.filter.clone()), json!({"test.a": "b"}));
        assert_eq!(Value::Object(req.operation.clone()), json!({"test.$.a": "c"}));
        assert_eq!(
            Value::Object(req.store_filter()),
            json!({"_id": "abc", "test.a": "b"})
        );
    }

    #[test]
    fn test_update_rejects_non_object_operation() {
        let err = OpRequest::update("abc", json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_find_and_modify_shapes_are_identical() {
        let id = DocumentId::generate();
        let update = json!({"$pull": {"a": "woot"}});

        let shapes = vec![
            FindAndModify::from_options(json!({"query": {"_id": id.as_str()}, "update": update}))
                .unwrap(),
            FindAndModify::from_options(json!({"query": id.as_str(), "update": update})).unwrap(),
            FindAndModify::new(obj(json!({"_id": id.as_str()})), update.clone()).unwrap(),
            FindAndModify::new(id.to_string(), update.clone()).unwrap(),
        ];

        for shape in &shapes {
            assert_eq!(shape.request, shapes[0].request);
            assert!(!shape.options.return_new);
        }
        assert_eq!(shapes[0].request.id, id);
        assert!(shapes[0].request.filter.is_empty());
    }

    #[test]
    fn test_find_and_modify_options_errors() {
        let err = FindAndModify::from_options(json!({"update": {"$set": {}}})).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidIdentifier);

        let err = FindAndModify::from_options(json!({"query": "abc"})).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);

        let err = FindAndModify::from_options(json!({"query": "abc", "update": {}, "new": "yes"}))
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);

        let err = FindAndModify::from_options(json!("abc")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_find_and_modify_new_flag() {
        let fam =
            FindAndModify::from_options(json!({"query": "abc", "update": {"$set": {}}, "new": true}))
                .unwrap();
        assert!(fam.options.return_new);
    }

    #[test]
    fn test_into_event_carries_triple() {
        let req = OpRequest::update("abc", json!({"$set": {}})).unwrap();
        let event = req.into_event();
        assert_eq!(event.id.as_str(), "abc");
        assert!(event.filter.is_empty());
        assert_eq!(Value::Object(event.operation), json!({"$set": {}}));
    }
}
