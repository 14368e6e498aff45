pub mod blob;
pub mod local;

use std::sync::Arc;

use tracing::info;

use crate::config::{ArtifactStoreKind, Config};
use crate::pipeline::traits::ArtifactStore;

pub use blob::BlobArtifactStore;
pub use local::{LocalArtifactStore, FILES_ROUTE};

pub fn build_artifact_store(config: &Config) -> Arc<dyn ArtifactStore> {
    match config.artifact_store {
        ArtifactStoreKind::Local => {
            let store = LocalArtifactStore::new(config.static_dir.clone(), &config.public_base_url);
            info!(
                "Artifacts stored in {} and served from {}{}",
                store.root().display(),
                config.public_base_url,
                FILES_ROUTE
            );
            Arc::new(store)
        }
        ArtifactStoreKind::Blob => {
            info!("Artifacts stored in blob container {}", config.blob_container_url);
            Arc::new(BlobArtifactStore::new(
                &config.blob_container_url,
                &config.blob_sas_token,
            ))
        }
    }
}
