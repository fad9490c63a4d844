//! Filter document evaluation for in-memory matching.
//!
//! This module evaluates MongoDB-style filter documents against BSON documents. It
//! covers the operators the filter builder emits plus the common comparison, set and
//! pattern operators, with MongoDB's null and array-membership semantics for equality.

use std::cmp::Ordering;
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use regex::RegexBuilder;

use docmodel_core::error::{DocumentStoreError, DocumentStoreResult};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so `1`, `1i64` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// ObjectId value
    ObjectId(ObjectId),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Embedded document, fields kept in stored order
    Document(Vec<(&'a str, Comparable<'a>)>),
    /// Binary, decimal, timestamp and the other types only equal to themselves
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Document(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Document(a), Comparable::Document(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Total order used for sorting: missing and null values sort first, values of
/// incomparable types are considered equal.
pub(crate) fn sort_order(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    match (&left, &right) {
        (Comparable::Null, Comparable::Null) => Ordering::Equal,
        (Comparable::Null, _) => Ordering::Less,
        (_, Comparable::Null) => Ordering::Greater,
        _ => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

/// Resolves a possibly dotted field path inside `document`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(*value as i64),
        Bson::Int64(value) => Some(*value),
        Bson::Double(value) if value.fract() == 0.0 => Some(*value as i64),
        _ => None,
    }
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Null => false,
        other => as_integer(other).is_none_or(|n| n != 0),
    }
}

/// Evaluates filter documents against one document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every entry of `filter`.
    pub fn matches(&self, filter: &Document) -> DocumentStoreResult<bool> {
        for (key, condition) in filter {
            if !self.matches_entry(key, condition)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Keeps the documents matching `filter`, failing on the first malformed clause.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = Document>,
        filter: &Document,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(&document).matches(filter)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn matches_entry(&self, key: &str, condition: &Bson) -> DocumentStoreResult<bool> {
        match key {
            "$and" => {
                for filter in Self::sub_filters(key, condition)? {
                    if !self.matches(filter)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
            "$or" => {
                for filter in Self::sub_filters(key, condition)? {
                    if self.matches(filter)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            },
            "$nor" => {
                for filter in Self::sub_filters(key, condition)? {
                    if self.matches(filter)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
            operator if operator.starts_with('$') => Err(DocumentStoreError::InvalidFilter(
                format!("unknown top-level operator {operator}"),
            )),
            field => self.matches_field(lookup(self.document, field), condition),
        }
    }

    fn sub_filters<'f>(key: &str, condition: &'f Bson) -> DocumentStoreResult<Vec<&'f Document>> {
        condition
            .as_array()
            .ok_or_else(|| DocumentStoreError::InvalidFilter(format!("{key} expects an array")))?
            .iter()
            .map(|filter| {
                filter
                    .as_document()
                    .ok_or_else(|| DocumentStoreError::InvalidFilter(format!("{key} expects documents")))
            })
            .collect()
    }

    fn matches_field(&self, value: Option<&Bson>, condition: &Bson) -> DocumentStoreResult<bool> {
        match condition {
            Bson::Document(operators) if is_operator_document(operators) => {
                Self::matches_operators(value, operators)
            },
            _ => Ok(equals(value, condition)),
        }
    }

    fn matches_operators(value: Option<&Bson>, operators: &Document) -> DocumentStoreResult<bool> {
        for (operator, argument) in operators {
            let matched = match operator.as_str() {
                "$eq" => equals(value, argument),
                "$ne" => !equals(value, argument),
                "$gt" => compare(value, argument, |ordering| ordering == Ordering::Greater),
                "$gte" => compare(value, argument, |ordering| ordering != Ordering::Less),
                "$lt" => compare(value, argument, |ordering| ordering == Ordering::Less),
                "$lte" => compare(value, argument, |ordering| ordering != Ordering::Greater),
                "$in" => in_set(value, operator, argument)?,
                "$nin" => !in_set(value, operator, argument)?,
                "$exists" => value.is_some() == is_truthy(argument),
                "$size" => {
                    let size = as_integer(argument).ok_or_else(|| {
                        DocumentStoreError::InvalidFilter("$size expects an integer".to_string())
                    })?;
                    matches!(value, Some(Bson::Array(items)) if items.len() as i64 == size)
                },
                "$regex" => {
                    let options = operators
                        .get_str("$options")
                        .unwrap_or_default();
                    regex_match(value, argument, options)?
                },
                "$options" => true, // consumed by $regex
                "$not" => match argument {
                    Bson::Document(inner) => !Self::matches_operators(value, inner)?,
                    _ => return Err(DocumentStoreError::InvalidFilter(
                        "$not expects an operator document".to_string(),
                    )),
                },
                other => return Err(DocumentStoreError::InvalidFilter(
                    format!("unsupported operator {other}"),
                )),
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

/// MongoDB equality: `null` matches missing fields, and a scalar matches an array
/// containing it.
fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    let target_cmp = Comparable::from(target);

    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) if !matches!(target, Bson::Array(_)) => items
            .iter()
            .any(|item| Comparable::from(item) == target_cmp),
        Some(value) => Comparable::from(value) == target_cmp,
    }
}

fn compare(value: Option<&Bson>, target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let target = Comparable::from(target);
    let check = |item: &Bson| {
        Comparable::from(item)
            .partial_cmp(&target)
            .is_some_and(&accept)
    };

    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(value) => check(value),
    }
}

fn in_set(value: Option<&Bson>, operator: &str, argument: &Bson) -> DocumentStoreResult<bool> {
    let candidates = argument
        .as_array()
        .ok_or_else(|| DocumentStoreError::InvalidFilter(format!("{operator} expects an array")))?;

    Ok(candidates
        .iter()
        .any(|candidate| equals(value, candidate)))
}

fn regex_match(value: Option<&Bson>, pattern: &Bson, options: &str) -> DocumentStoreResult<bool> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| DocumentStoreError::InvalidFilter("$regex expects a string".to_string()))?;

    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|err| DocumentStoreError::InvalidFilter(err.to_string()))?;

    Ok(match value {
        Some(Bson::String(text)) => regex.is_match(text),
        Some(Bson::Array(items)) => items
            .iter()
            .filter_map(Bson::as_str)
            .any(|text| regex.is_match(text)),
        _ => false,
    })
}
