//! In-memory document storage backend for docrest.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait,
//! including the binary-object area used for attachments. It backs the test suites and local
//! runs of the service that should not need a database.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Natural order** - Listings return records in insertion order
//! - **Full query support** - Dotted-path filtering and pagination
//! - **Duplicate keys** - Reported per input, ordered or unordered, like a real store
//!
//! # Quick Start
//!
//! ```ignore
//! use docrest_core::store::DocumentStore;
//! use docrest_memory::InMemoryStore;
//! use bson::doc;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let director = store
//!     .collection("directors")
//!     .insert_one(doc! { "name": "James Cameron", "age": 57 })
//!     .await?;
//! ```

pub mod store;
pub mod evaluator;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
