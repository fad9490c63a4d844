//! MongoDB backend implementation for docmodel.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters rendered by the query builder are passed to the driver unchanged, and
//! transactions run on driver client sessions.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmodel = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! A store is built either from a connection string or from a [`MongoDbConfig`].
//! Multi-document transactions require the server to run as a replica set.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{prelude::*, mongodb::MongoDbConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MongoDbConfig { name: "blog".to_string(), ..Default::default() };
//!     let model = Model::new(config.builder().build().await?);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_mongodb;

pub mod config;
pub mod store;

pub use config::MongoDbConfig;
pub use store::{MongoDbSession, MongoDbStore, MongoDbStoreBuilder};
