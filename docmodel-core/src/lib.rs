//! A generic record binding layer over JSON document stores.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Capability contract** ([`record`]) - The [`Record`](record::Record) trait mapping a type to its collection
//! - **Filter builder** ([`query`]) - Conjunctive filter construction rendered to store-native documents
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing document store backends
//! - **Record engine** ([`model`]) - Generic CRUD, search, count and aggregation over any record type
//! - **Transactions** ([`transaction`]) - Session-bound engines with commit and rollback
//! - **Execution contexts** ([`context`]) - Plain and transactional contexts store calls run under
//! - **Error handling** ([`error`]) - Backend errors and the engine's closed error set
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! let model = Model::new(InMemoryStore::new());
//!
//! let mut example = Example { title: "hello".into(), ..Default::default() };
//! model.create(&mut example).await?;
//!
//! let count = model.count::<Example>(Some("hell")).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
mod collection;
pub mod context;
pub mod error;
pub mod model;
pub mod query;
pub mod record;
pub mod transaction;
