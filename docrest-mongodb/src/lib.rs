//! MongoDB backend implementation for docrest.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Records live
//! in ordinary collections and attachments in the database's default GridFS bucket.
//!
//! The server enables it through its default `mongodb` feature:
//!
//! ```toml
//! [dependencies]
//! docrest-server = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Full query support** - Leverages MongoDB's query engine for filtering
//! - **Bulk inserts** - Ordered and unordered `insertMany`, duplicate keys reported per input
//! - **Attachments** - Binary objects kept in GridFS, referenced by ObjectId
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::backend::StoreBackendBuilder;
//! use docrest_mongodb::MongoDbStore;
//!
//! let store = MongoDbStore::builder("mongodb://localhost:27017", "restdb")
//!     .build()
//!     .await?;
//! ```

pub mod store;
pub mod query;
pub mod sanitizer;
pub mod error;
pub mod gridfs;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
