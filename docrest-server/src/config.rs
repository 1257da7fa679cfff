//! Command line and environment configuration.

use std::net::SocketAddr;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use docrest_core::{
    backend::StoreBackendBuilder,
    store::{DocumentStore, DynDocumentStore},
};
use docrest_memory::InMemoryStore;
use tracing::info;

/// Which store engine backs the collections.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Process-local store, emptied on restart
    Memory,
    /// MongoDB, attachments in GridFS
    Mongodb,
}

#[derive(Parser, Debug)]
#[command(name = "docrest")]
#[command(about = "Document CRUD over HTTP")]
pub struct Args {
    /// Address the HTTP API listens on
    #[arg(long, env = "DOCREST_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Store engine
    #[arg(long, value_enum, env = "DOCREST_BACKEND", default_value_t = BackendKind::Memory)]
    pub backend: BackendKind,

    /// MongoDB connection string
    #[arg(long, env = "DOCREST_MONGO_URI", default_value = "mongodb://localhost:27017")]
    pub mongo_uri: String,

    /// MongoDB database name
    #[arg(long, env = "DOCREST_DATABASE", default_value = "python_api_db")]
    pub database: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Builds the configured backend and wraps it in a store.
    pub async fn connect(&self) -> Result<DynDocumentStore> {
        match self.backend {
            BackendKind::Memory => {
                info!("using the in-memory store");
                let backend = InMemoryStore::builder().build().await?;

                Ok(DocumentStore::new(backend).into_dyn())
            }
            BackendKind::Mongodb => connect_mongodb(&self.mongo_uri, &self.database).await,
        }
    }
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(uri: &str, database: &str) -> Result<DynDocumentStore> {
    let backend = docrest_mongodb::MongoDbStore::builder(uri, database)
        .build()
        .await?;

    Ok(DocumentStore::new(backend).into_dyn())
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongodb(_uri: &str, _database: &str) -> Result<DynDocumentStore> {
    anyhow::bail!("docrest was built without the `mongodb` feature")
}
