//! The document access layer behind the docrest HTTP service.
//!
//! This crate translates CRUD intents into operations on an external document store and
//! translates the store's answers back. It provides:
//!
//! - **Records and typed documents** ([`document`]) - Record identity, the JSON/BSON codec and the `Document` trait
//! - **Store backend abstraction** ([`backend`]) - The primitives every store engine must offer
//! - **Query and filtering API** ([`query`]) - Filter expressions and the visitor backends translate them with
//! - **Collections** ([`collection`]) - List, paginate, get, create, bulk create, update, replace, delete and attachments
//! - **Bulk reports** ([`bulk`]) - Partial-failure reporting for bulk inserts
//! - **Attachments** ([`attachment`]) - Binary objects stored apart from their parent record
//! - **Document store** ([`store`]) - Entry point owning the backend handle
//! - **Pagination** ([`page`]) - Page parameters and page results
//! - **Error handling** ([`error`]) - The error taxonomy shared by every layer
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::{document::Document, store::DocumentStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Movie {
//!     pub title: String,
//!     pub year: Option<i32>,
//! }
//!
//! impl Document for Movie {
//!     fn collection_name() -> &'static str {
//!         "movies"
//!     }
//! }
//!
//! let store = DocumentStore::new(backend);
//! let created = store
//!     .typed_collection::<Movie>()
//!     .insert_one(Movie { title: "Spider Man 3".into(), year: Some(2009) })
//!     .await?;
//! ```

pub mod attachment;
pub mod backend;
pub mod bulk;
pub mod collection;
pub mod document;
pub mod error;
pub mod page;
pub mod query;
pub mod store;
