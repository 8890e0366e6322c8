//! Query matching and update-operator evaluation for the in-memory store
//!
//! Covers the subset of document-store semantics the driver relies on:
//! equality and `$eq/$ne/$in/$nin/$exists/$gt/$gte/$lt/$lte` conditions on
//! dotted paths (traversing arrays), `$set`, `$unset`, `$inc`, `$push`,
//! `$addToSet`, `$pull`, positional `$` path segments, and the
//! path-conflict check that rejects e.g. `$pull` and `$push` on one field.

use crate::document::{Document, DocumentId, Filter, OperationSpec, ID_FIELD};
use crate::{Error, Result};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Largest number of nulls an update may pad an array with
const MAX_ARRAY_PADDING: usize = 1_500_000;

const UPDATE_OPERATORS: &[&str] = &["$set", "$unset", "$inc", "$push", "$addToSet", "$pull"];

/// Validated shape of an update document
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UpdatePlan {
    /// Operator document: (operator, field path, argument)
    Operators(Vec<(String, String, Value)>),
    /// Whole-document replacement (`_id` is kept)
    Replace(Document),
}

// ============================================================================
// Matching
// ============================================================================

/// Whether `doc` satisfies every condition of `filter`
pub(crate) fn matches(doc: &Document, filter: &Filter) -> Result<bool> {
    let root = Value::Object(doc.clone());
    for (path, cond) in filter {
        if path == ID_FIELD {
            let wanted = DocumentId::from_value(cond);
            let actual = doc.get(ID_FIELD).and_then(DocumentId::from_value);
            if wanted.is_none() || wanted != actual {
                return Ok(false);
            }
            continue;
        }
        if !field_matches(&root, path, cond)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn field_matches(root: &Value, path: &str, cond: &Value) -> Result<bool> {
    let candidates = resolve(root, path);
    match operator_object(cond) {
        Some(ops) => {
            for (op, arg) in ops {
                if !operator_matches(&candidates, op, arg)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        None => Ok(candidates.iter().any(|v| value_eq(v, cond))),
    }
}

/// Values reachable at `path`, descending into arrays of sub-documents
fn resolve<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![root];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(v) = map.get(segment) {
                        next.push(v);
                    }
                }
                Value::Array(items) => {
                    if let Ok(index) = segment.parse::<usize>() {
                        if let Some(v) = items.get(index) {
                            next.push(v);
                        }
                    } else {
                        next.extend(
                            items
                                .iter()
                                .filter_map(|item| item.as_object())
                                .filter_map(|obj| obj.get(segment)),
                        );
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

fn operator_object(cond: &Value) -> Option<&Map<String, Value>> {
    match cond {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => {
            Some(map)
        }
        _ => None,
    }
}

fn value_eq(value: &Value, cond: &Value) -> bool {
    value == cond || matches!(value, Value::Array(items) if items.contains(cond))
}

fn operator_matches(candidates: &[&Value], op: &str, arg: &Value) -> Result<bool> {
    match op {
        "$eq" => Ok(candidates.iter().any(|v| value_eq(v, arg))),
        "$ne" => Ok(!candidates.iter().any(|v| value_eq(v, arg))),
        "$in" | "$nin" => {
            let options = arg
                .as_array()
                .ok_or_else(|| Error::StoreRejected(format!("{} needs an array", op)))?;
            let hit = candidates
                .iter()
                .any(|v| options.iter().any(|o| value_eq(v, o)));
            Ok(if op == "$in" { hit } else { !hit })
        }
        "$exists" => {
            let wanted = !matches!(arg, Value::Bool(false) | Value::Null)
                && arg.as_f64() != Some(0.0);
            Ok(wanted == !candidates.is_empty())
        }
        "$gt" | "$gte" | "$lt" | "$lte" => Ok(candidates.iter().any(|v| {
            match compare(v, arg) {
                Some(ordering) => match op {
                    "$gt" => ordering == Ordering::Greater,
                    "$gte" => ordering != Ordering::Less,
                    "$lt" => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                },
                None => false,
            }
        })),
        other => Err(Error::StoreRejected(format!("unknown operator: {}", other))),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Whether a single array element satisfies `cond` (`$pull` conditions,
/// positional matches on arrays of scalars)
fn element_matches(element: &Value, cond: &Value) -> Result<bool> {
    if let Some(ops) = operator_object(cond) {
        for (op, arg) in ops {
            if !operator_matches(&[element], op, arg)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    match (element, cond) {
        (Value::Object(_), Value::Object(conditions)) => {
            for (path, c) in conditions {
                if !field_matches(element, path, c)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(element == cond),
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Check an update document before touching any stored data
pub(crate) fn plan(update: &OperationSpec) -> Result<UpdatePlan> {
    let operator_keys = update.keys().filter(|k| k.starts_with('$')).count();

    if operator_keys == 0 {
        // Flat mappings with dotted paths (positional updates) set those paths
        if update.keys().any(|k| k.contains('.')) {
            let ops = update
                .iter()
                .map(|(path, value)| ("$set".to_string(), path.clone(), value.clone()))
                .collect();
            return checked(ops);
        }
        return Ok(UpdatePlan::Replace(update.clone()));
    }

    if operator_keys != update.len() {
        return Err(Error::StoreRejected(
            "update document mixes operators and plain fields".into(),
        ));
    }

    let mut ops = Vec::new();
    for (op, fields) in update {
        if !UPDATE_OPERATORS.contains(&op.as_str()) {
            return Err(Error::StoreRejected(format!("unknown modifier: {}", op)));
        }
        let fields = fields.as_object().ok_or_else(|| {
            Error::StoreRejected(format!(
                "Modifiers operate on fields but we found {} instead",
                fields
            ))
        })?;
        for (path, arg) in fields {
            ops.push((op.clone(), path.clone(), arg.clone()));
        }
    }
    checked(ops)
}

fn checked(ops: Vec<(String, String, Value)>) -> Result<UpdatePlan> {
    for (i, (_, path, _)) in ops.iter().enumerate() {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(Error::StoreRejected(format!("invalid field path '{}'", path)));
        }
        if path == ID_FIELD || path.starts_with("_id.") {
            return Err(Error::StoreRejected(format!(
                "Performing an update on the path '{}' would modify the immutable field '_id'",
                path
            )));
        }
        for (_, other, _) in &ops[i + 1..] {
            if overlaps(path, other) {
                return Err(Error::StoreRejected(format!(
                    "Updating the path '{}' would create a conflict at '{}'",
                    other, path
                )));
            }
        }
    }
    Ok(UpdatePlan::Operators(ops))
}

fn overlaps(a: &str, b: &str) -> bool {
    a == b || a.starts_with(&format!("{}.", b)) || b.starts_with(&format!("{}.", a))
}

// ============================================================================
// Application
// ============================================================================

/// Apply a validated plan to `doc`, matched by `filter` (for positional `$`).
///
/// Works on a copy: on error the caller's document is untouched.
pub(crate) fn apply(doc: &Document, filter: &Filter, plan: &UpdatePlan) -> Result<Document> {
    match plan {
        UpdatePlan::Replace(replacement) => {
            let mut next = Document::new();
            if let Some(id) = doc.get(ID_FIELD) {
                next.insert(ID_FIELD.to_string(), id.clone());
            }
            for (key, value) in replacement {
                if key != ID_FIELD {
                    next.insert(key.clone(), value.clone());
                }
            }
            Ok(next)
        }
        UpdatePlan::Operators(ops) => {
            let mut root = Value::Object(doc.clone());
            for (op, path, arg) in ops {
                let segments = positional_segments(&root, filter, path)?;
                apply_one(&mut root, op, &segments, arg)?;
            }
            match root {
                Value::Object(next) => Ok(next),
                _ => Err(Error::StoreRejected("update replaced the document root".into())),
            }
        }
    }
}

/// Split a path, replacing a `$` segment with the array index the filter matched
fn positional_segments(root: &Value, filter: &Filter, path: &str) -> Result<Vec<String>> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some(pos) = segments.iter().position(|s| *s == "$") else {
        return Ok(segments.into_iter().map(String::from).collect());
    };

    let array_path = segments[..pos].join(".");
    let index = first_array_match(root, filter, &array_path)?.ok_or_else(|| {
        Error::StoreRejected(
            "The positional operator did not find the match needed from the query.".into(),
        )
    })?;

    let mut out: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
    out[pos] = index.to_string();
    Ok(out)
}

fn first_array_match(root: &Value, filter: &Filter, array_path: &str) -> Result<Option<usize>> {
    let Some(Value::Array(items)) = exact(root, array_path) else {
        return Ok(None);
    };
    let prefix = format!("{}.", array_path);

    for (index, item) in items.iter().enumerate() {
        for (path, cond) in filter {
            let hit = if path == array_path {
                element_matches(item, cond)?
            } else if let Some(rest) = path.strip_prefix(&prefix) {
                field_matches(item, rest, cond)?
            } else {
                continue;
            };
            if hit {
                return Ok(Some(index));
            }
        }
    }
    Ok(None)
}

/// The value at an exact path, without array fan-out
fn exact<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn apply_one(root: &mut Value, op: &str, segments: &[String], arg: &Value) -> Result<()> {
    let path = segments.join(".");
    match op {
        "$set" => {
            *slot(root, segments, true)?.ok_or_else(|| missing(&path))? = arg.clone();
        }
        "$unset" => {
            let (parent, last) = segments.split_at(segments.len() - 1);
            if let Some(container) = slot(root, parent, false)? {
                match container {
                    Value::Object(map) => {
                        map.shift_remove(&last[0]);
                    }
                    Value::Array(items) => {
                        if let Some(item) = last[0].parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                            *item = Value::Null;
                        }
                    }
                    _ => {}
                }
            }
        }
        "$inc" => {
            let Value::Number(delta) = arg else {
                return Err(Error::StoreRejected(format!(
                    "Cannot increment with non-numeric argument: {{{}: {}}}",
                    path, arg
                )));
            };
            let target = slot(root, segments, true)?.ok_or_else(|| missing(&path))?;
            let next = match &*target {
                Value::Null => Value::Number(delta.clone()),
                Value::Number(current) => Value::Number(add(current, delta)),
                other => {
                    return Err(Error::StoreRejected(format!(
                        "Cannot apply $inc to a value of non-numeric type: {}",
                        other
                    )))
                }
            };
            *target = next;
        }
        "$push" | "$addToSet" => {
            let items = each(arg);
            let target = slot(root, segments, true)?.ok_or_else(|| missing(&path))?;
            if target.is_null() {
                *target = Value::Array(Vec::new());
            }
            let array = match target {
                Value::Array(array) => array,
                other => {
                    return Err(Error::StoreRejected(format!(
                        "The field '{}' must be an array but is of type {}",
                        path,
                        type_name(other)
                    )))
                }
            };
            for item in items {
                if op == "$push" || !array.contains(&item) {
                    array.push(item);
                }
            }
        }
        "$pull" => {
            if let Some(target) = slot(root, segments, false)? {
                let Value::Array(array) = target else {
                    return Err(Error::StoreRejected(
                        "Cannot apply $pull to a non-array value".into(),
                    ));
                };
                let mut kept = Vec::with_capacity(array.len());
                for item in array.drain(..) {
                    if !element_matches(&item, arg)? {
                        kept.push(item);
                    }
                }
                *array = kept;
            }
        }
        other => return Err(Error::StoreRejected(format!("unknown modifier: {}", other))),
    }
    Ok(())
}

/// Mutable reference to the value at `segments`.
///
/// With `create`, missing object members are created (as null for the leaf,
/// as empty objects on the way) and arrays are padded with nulls. Without
/// it, a missing path yields `None`.
fn slot<'a>(
    root: &'a mut Value,
    segments: &[String],
    create: bool,
) -> Result<Option<&'a mut Value>> {
    let mut current = root;
    for (depth, segment) in segments.iter().enumerate() {
        let leaf = depth + 1 == segments.len();
        let fresh = || {
            if leaf {
                Value::Null
            } else {
                Value::Object(Map::new())
            }
        };
        if create && current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => {
                if !map.contains_key(segment.as_str()) {
                    if !create {
                        return Ok(None);
                    }
                    map.insert(segment.clone(), fresh());
                }
                match map.get_mut(segment.as_str()) {
                    Some(v) => v,
                    None => return Ok(None),
                }
            }
            Value::Array(items) => {
                let index = segment.parse::<usize>().map_err(|_| {
                    Error::StoreRejected(format!("Cannot create field '{}' in an array", segment))
                })?;
                if index >= items.len() {
                    if !create {
                        return Ok(None);
                    }
                    let len = index
                        .checked_add(1)
                        .filter(|len| len - items.len() <= MAX_ARRAY_PADDING)
                        .ok_or_else(|| {
                            Error::StoreRejected(format!(
                                "can't backfill array to index {}: more than {} null elements",
                                segment, MAX_ARRAY_PADDING
                            ))
                        })?;
                    items.resize(len, Value::Null);
                    items[index] = fresh();
                }
                &mut items[index]
            }
            other => {
                if !create {
                    return Ok(None);
                }
                return Err(Error::StoreRejected(format!(
                    "Cannot create field '{}' in element {}",
                    segment, other
                )));
            }
        };
    }
    Ok(Some(current))
}

fn missing(path: &str) -> Error {
    Error::StoreRejected(format!("cannot resolve path '{}'", path))
}

fn each(arg: &Value) -> Vec<Value> {
    match arg {
        Value::Object(map) if map.len() == 1 => match map.get("$each") {
            Some(Value::Array(items)) => items.clone(),
            _ => vec![arg.clone()],
        },
        _ => vec![arg.clone()],
    }
}

fn add(a: &Number, b: &Number) -> Number {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => match x.checked_add(y) {
            Some(sum) => Number::from(sum),
            None => float(x as f64 + y as f64),
        },
        _ => float(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)),
    }
}

fn float(f: f64) -> Number {
    Number::from_f64(f).unwrap_or_else(|| Number::from(0))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
