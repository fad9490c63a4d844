//! A process-local store for docmodel records.
//!
//! [`InMemoryStore`] keeps every collection as BSON documents keyed by `_id` and
//! answers the same filter documents the query builder sends to MongoDB, so an engine
//! behaves the same against it as against a real deployment. Use it in tests and
//! while prototyping; nothing is persisted.
//!
//! Supported filters cover `$and`/`$or`/`$nor`, comparisons, `$in`/`$nin`,
//! `$exists`, `$size`, `$regex` and `$not`. Aggregation accepts `$match`, `$sort`,
//! `$skip`, `$limit` and `$count`.
//!
//! A transaction on an [`InMemorySession`] stages its writes privately. Other
//! readers see them only after commit.
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! let model = Model::new(InMemoryStore::new());
//! let tx = model.start_transaction().await?;
//! tx.create(&mut draft).await?;
//! tx.commit().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod store;
pub mod evaluator;

pub use store::{InMemorySession, InMemoryStore, InMemoryStoreBuilder};
