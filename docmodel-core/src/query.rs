//! Conjunctive filter construction.
//!
//! A [`Query`] accumulates predicate clauses and renders them into a MongoDB-style
//! filter document with [`Query::exec`]. Every helper appends exactly one clause and all
//! clauses are joined with `$and`; disjunction only happens inside a single clause (text
//! search over several fields, or the three shapes of "empty").
//!
//! ```ignore
//! use docmodel::query::Query;
//!
//! let mut query = Query::new();
//! query
//!     .equal("status", "active")
//!     .not_empty("tags")
//!     .text_search("rust", &["title", "body"]);
//!
//! let filter = query.exec();
//! ```

use bson::{Bson, Document, doc, oid::ObjectId};

/// Regex options used by text search (case-insensitive).
const CASE_INSENSITIVE: &str = "i";

/// An ordered list of conjunctive filter clauses.
///
/// An empty query renders to `{}`, which matches every document in a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    and: Vec<Document>,
}

impl Query {
    /// Creates a query with no clauses.
    pub fn new() -> Self {
        Self { and: Vec::new() }
    }

    /// Returns the accumulated clauses in insertion order.
    pub fn clauses(&self) -> &[Document] {
        &self.and
    }

    pub fn is_empty(&self) -> bool {
        self.and.is_empty()
    }

    /// Renders the filter document.
    ///
    /// With no clauses this is the match-all filter `{}`; otherwise all clauses are
    /// wrapped in a single top-level `$and`.
    pub fn exec(&self) -> Document {
        if self.and.is_empty() {
            return Document::new();
        }

        doc! { "$and": self.and.clone() }
    }

    /// Case-insensitive substring match of `text` on any of `fields`.
    ///
    /// `text` is matched literally: regex metacharacters are escaped. Use
    /// [`Query::text_search_pattern`] to match a caller-built pattern.
    pub fn text_search(&mut self, text: &str, fields: &[&str]) -> &mut Self {
        self.text_search_pattern(&regex::escape(text), fields)
    }

    /// Case-insensitive regex match of `pattern` on any of `fields`.
    ///
    /// The pattern is passed to the store unmodified and must not come from untrusted
    /// input. With no `fields` no clause is added.
    pub fn text_search_pattern(&mut self, pattern: &str, fields: &[&str]) -> &mut Self {
        if fields.is_empty() {
            return self;
        }

        let or = fields
            .iter()
            .map(|&field| doc! {
                field: { "$regex": pattern, "$options": CASE_INSENSITIVE },
            })
            .collect::<Vec<_>>();

        self.push(doc! { "$or": or })
    }

    pub fn equal(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.push(doc! { field: { "$eq": value.into() } })
    }

    pub fn not_equal(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.push(doc! { field: { "$ne": value.into() } })
    }

    /// Matches documents where `field` is missing, null, or a zero-length array.
    pub fn empty(&mut self, field: &str) -> &mut Self {
        self.push(doc! {
            "$or": [
                { field: { "$exists": false } },
                { field: Bson::Null },
                { field: { "$size": 0 } },
            ],
        })
    }

    /// Matches documents where `field` is present, not null, and not a zero-length
    /// array. This is the exact complement of [`Query::empty`].
    pub fn not_empty(&mut self, field: &str) -> &mut Self {
        self.push(doc! {
            field: {
                "$exists": true,
                "$ne": Bson::Null,
                "$not": { "$size": 0 },
            },
        })
    }

    /// Matches documents whose `field` equals one of `values`.
    pub fn field_any_of<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let values = values
            .into_iter()
            .map(Into::into)
            .collect::<Vec<Bson>>();

        self.push(doc! { field: { "$in": values } })
    }

    /// Restricts `_id` to the given identifiers.
    ///
    /// Strings that are not valid identifiers are dropped. If none survive the clause
    /// is `{ "_id": { "$in": [] } }`, which matches nothing.
    pub fn ids<S: AsRef<str>>(&mut self, ids: &[S]) -> &mut Self {
        let ids = ids
            .iter()
            .filter_map(|id| ObjectId::parse_str(id.as_ref()).ok())
            .map(Bson::ObjectId)
            .collect::<Vec<_>>();

        self.push(doc! { "_id": { "$in": ids } })
    }

    /// Raw `{ field: value }` clause for anything the named helpers don't cover.
    pub fn add(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.push(doc! { field: value.into() })
    }

    fn push(&mut self, clause: Document) -> &mut Self {
        self.and.push(clause);
        self
    }
}

/// Filter selecting exactly the document with identifier `id`.
pub fn query_id(id: ObjectId) -> Document {
    doc! { "_id": id }
}
