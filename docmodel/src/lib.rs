//! Bind plain Rust structs to a document store and work with them through one engine.
//!
//! Derive [`Record`] on a serde type to give it a collection, then hand it to a
//! [`Model`](model::Model). The engine stamps identifiers and timestamps and runs
//! case-insensitive searches over the type's search fields. Failures collapse into
//! the four-variant [`ModelError`](error::ModelError).
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use docmodel::bson::{oid::ObjectId, DateTime};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
//! #[record(collection = "posts", search = ["title", "body"])]
//! pub struct Post {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
//!     #[record(id)]
//!     pub id: Option<ObjectId>,
//!     #[record(created_at)]
//!     pub created_at: Option<DateTime>,
//!     #[record(updated_at)]
//!     pub updated_at: Option<DateTime>,
//!     pub title: String,
//!     pub body: String,
//! }
//!
//! let model = Model::new(InMemoryStore::new());
//!
//! let mut post = Post { title: "Hello".to_string(), ..Default::default() };
//! let id = model.create(&mut post).await?;
//! let hits = model.get_many::<Post>(Some("hell"), 0, 20).await?;
//! ```
//!
//! Work that must land together goes through a transaction. A failed step hands its
//! error to `rollback`, which always reports `ModelError::Internal`:
//!
//! ```ignore
//! let tx = model.start_transaction().await?;
//!
//! if let Err(err) = tx.update(&mut post, &post_id).await {
//!     return Err(tx.rollback(err).await);
//! }
//!
//! tx.commit().await?;
//! ```
//!
//! Stores: [`memory`] always, [`mongodb`] with the `mongodb` feature.

#[allow(unused_extern_crates)]
extern crate self as docmodel;

pub mod prelude;

pub use docmodel_core::{backend, context, error, model, query, record, transaction};
pub use docmodel_macros::Record;

// Re-exported for custom backend implementations and derived code.
pub use async_trait::async_trait;
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemorySession, InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbConfig, MongoDbSession, MongoDbStore, MongoDbStoreBuilder};
}
