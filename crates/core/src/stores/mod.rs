pub mod directory;
pub mod qdrant;

pub use directory::DirectoryStore;
pub use qdrant::QdrantStore;

use crate::config::{ResearchConfig, StoreBackend};
use crate::retry::RetryPolicy;
use crate::traits::CollectionStore;
use std::sync::Arc;

pub fn store_from_config(config: &ResearchConfig) -> Arc<dyn CollectionStore> {
    match config.store_backend {
        StoreBackend::Directory => Arc::new(DirectoryStore::new(&config.vector_store_path)),
        StoreBackend::Qdrant => Arc::new(QdrantStore::new(
            config.qdrant_url.clone(),
            RetryPolicy::from(&config.retry),
        )),
    }
}
