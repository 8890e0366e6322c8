//! Document model shared by the store, the normalizers and the op events

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Name of the identifier field inside documents and filters
pub const ID_FIELD: &str = "_id";

/// Extended-JSON wrapper key for object ids (`{"$oid": "..."}`)
const OID_KEY: &str = "$oid";

/// A stored document
pub type Document = Map<String, Value>;

/// Field path (dot-notation allowed) → match condition
pub type Filter = Map<String, Value>;

/// Requested mutation: operator keys (`$set`, `$pull`, ...) or a flat
/// field → value mapping for positional updates
pub type OperationSpec = Map<String, Value>;

/// Identifier of a stored document.
///
/// Holds the canonical string form. Ids that denote the same document
/// (a bare string, an `{"$oid": ..}` wrapper, a numeric id) all collapse
/// to the same `DocumentId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier (32 lowercase hex chars)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recognize an identifier embedded as a field value.
    ///
    /// Accepts strings, integers and `{"$oid": "<hex>"}`. Anything else
    /// (query operators, arrays, null, empty strings) is not an identifier.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            Value::Object(obj) if obj.len() == 1 => match obj.get(OID_KEY) {
                Some(Value::String(s)) if !s.is_empty() => Some(Self(s.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    /// The value stored in the `_id` field of documents and store filters
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Read the identifier of a stored document
pub fn document_id(document: &Document) -> Option<DocumentId> {
    document.get(ID_FIELD).and_then(DocumentId::from_value)
}

/// Unwrap a JSON value that must be an object
pub(crate) fn into_object(value: Value, what: &str) -> crate::Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(crate::Error::InvalidRequest(format!(
            "{} must be an object, got {}",
            what, other
        ))),
    }
}
