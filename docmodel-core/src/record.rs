//! The capability contract every stored type implements.
//!
//! A type becomes usable with the [`Model`](crate::model::Model) by implementing [`Record`],
//! which names the collection the type lives in. Types that carry the conventional
//! identifier and timestamp fields additionally expose them through [`DefaultFields`], so
//! the engine can stamp them on writes.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{Record, DefaultFields};
//! use bson::{oid::ObjectId, DateTime};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
//! #[record(collection = "example_objects")]
//! pub struct Example {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
//!     #[record(id)]
//!     pub id: Option<ObjectId>,
//!     #[record(created_at)]
//!     pub created_at: Option<DateTime>,
//!     #[record(updated_at)]
//!     pub updated_at: Option<DateTime>,
//!     pub title: String,
//! }
//! ```

use bson::{
    Bson, DateTime, Document,
    de::deserialize_from_bson,
    oid::ObjectId,
    ser::serialize_to_bson,
};
use serde::{Serialize, de::DeserializeOwned};
use std::any::type_name;

use crate::error::{DocumentStoreError, DocumentStoreResult, ModelError, ModelResult};

/// Core trait that all records handled by the engine must implement.
///
/// The collection name is used verbatim as the backend collection identifier, so it
/// must be non-empty, must not contain `$` or NUL characters, and must not start with
/// `system.`. Violations are reported as [`ModelError::UnsupportedType`] at call time.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the name of the collection this record belongs to.
    fn collection() -> &'static str;

    /// Fields that free-text search in `get_many` and `count` runs across.
    fn search_fields() -> &'static [&'static str] {
        &["title"]
    }

    /// Exposes the conventional identifier and timestamp fields, if the type has them.
    ///
    /// Returning `None` (the default) makes the engine skip default-field stamping.
    fn default_fields(&mut self) -> Option<&mut dyn DefaultFields> {
        None
    }
}

/// Access to the identifier and timestamp fields the engine stamps on writes.
///
/// Every method defaults to a no-op, so a record may implement any subset of the
/// three fields.
pub trait DefaultFields {
    fn id(&self) -> Option<ObjectId> {
        None
    }

    fn set_id(&mut self, _id: ObjectId) {}

    fn created_at(&self) -> Option<DateTime> {
        None
    }

    fn set_created_at(&mut self, _at: DateTime) {}

    fn updated_at(&self) -> Option<DateTime> {
        None
    }

    fn set_updated_at(&mut self, _at: DateTime) {}
}

/// Reserved prefix for backend-internal collections.
const SYSTEM_PREFIX: &str = "system.";

/// Returns the collection name of `R` after checking it is usable as a collection
/// identifier.
///
/// # Errors
///
/// Returns [`ModelError::UnsupportedType`] naming `R` if the name is rejected.
pub fn ensure_supported<R: Record>() -> ModelResult<&'static str> {
    let name = R::collection();

    if name.is_empty()
        || name.contains('$')
        || name.contains('\0')
        || name.starts_with(SYSTEM_PREFIX)
    {
        tracing::error!(
            record_type = type_name::<R>(),
            collection = name,
            "record type does not provide a usable collection name"
        );
        return Err(ModelError::UnsupportedType(type_name::<R>().to_string()));
    }

    Ok(name)
}

/// Serializes a record into a BSON document.
///
/// A record whose serialized form is not a document (a bare scalar, a sequence) is not
/// record-shaped and is reported as [`ModelError::UnsupportedType`].
pub fn to_document<R: Record>(record: &R) -> ModelResult<Document> {
    match serialize_to_bson(record) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => {
            tracing::error!(
                record_type = type_name::<R>(),
                bson_type = ?other.element_type(),
                "record does not serialize to a document"
            );
            Err(ModelError::UnsupportedType(type_name::<R>().to_string()))
        }
        Err(err) => {
            tracing::error!(
                record_type = type_name::<R>(),
                error = %err,
                "can't serialize record"
            );
            Err(ModelError::Internal)
        }
    }
}

/// Decodes a stored document into a record.
pub fn from_document<R: Record>(document: Document) -> DocumentStoreResult<R> {
    deserialize_from_bson(Bson::Document(document))
        .map_err(|err| DocumentStoreError::Serialization(err.to_string()))
}

/// Parses a caller-supplied hex string into the native identifier type.
///
/// # Errors
///
/// Returns [`ModelError::InvalidId`] carrying the rejected input.
pub fn parse_id(id: &str) -> ModelResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| ModelError::InvalidId(id.to_string()))
}
