//! Service setup: config overrides and store selection.

use photodrop_core::store::{MemoryMetadataStore, MemoryObjectStore};
use photodrop_core::{Config, IngestService};
use std::sync::Arc;

use super::IngestArgs;

/// Check the inputs and build the service the batches will run on.
pub async fn setup_service(args: &IngestArgs, mut config: Config) -> anyhow::Result<IngestService> {
    for path in &args.paths {
        if !path.exists() {
            anyhow::bail!(
                "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
                path
            );
        }
    }

    if args.uploader.trim().is_empty() {
        anyhow::bail!("--uploader must not be empty");
    }

    if let Some(group_size) = args.group_size {
        if group_size == 0 {
            anyhow::bail!("--group-size must be at least 1");
        }
        config.processing.group_size = group_size;
    }

    if args.dry_run {
        tracing::info!("Dry run: objects and metadata are kept in memory");
        return Ok(IngestService::new(
            config,
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryMetadataStore::new()),
        ));
    }

    let backend = config.storage.backend;
    let service = IngestService::from_config(config).await.map_err(|e| {
        anyhow::anyhow!("Failed to set up {backend:?} storage: {e}\n\n  Hint: Check the [storage] section with `photodrop config show`.")
    })?;
    Ok(service)
}
