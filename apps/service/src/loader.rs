//! Device configuration on disk.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use netcheck::{ConfigError, Registry};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LoadError {
    /// See [`ConfigError::is_missing_targets`]
    pub fn is_missing_targets(&self) -> bool {
        matches!(self, Self::Config(e) if e.is_missing_targets())
    }
}

/// Load the registry from `path`. A file that does not exist yet means no
/// devices are configured.
pub async fn load_registry(path: &Path) -> Result<Registry, LoadError> {
    match fs::read_to_string(path).await {
        Ok(raw) => {
            let registry = Registry::load(&raw)?;
            debug!(
                path = %path.display(),
                interfaces = registry.len(),
                "Loaded device configuration"
            );
            Ok(registry)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No device configuration found");
            Ok(Registry::empty())
        }
        Err(source) => Err(LoadError::Read { path: path.to_path_buf(), source }),
    }
}

/// Validate `source` and copy it over the device configuration at `destination`
pub async fn import(source: &Path, destination: &Path) -> Result<Registry> {
    let raw = fs::read_to_string(source)
        .await
        .with_context(|| format!("failed to read {}", source.display()))?;
    let registry = Registry::load(&raw)
        .with_context(|| format!("{} is not a valid device configuration", source.display()))?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(destination, raw)
        .await
        .with_context(|| format!("failed to write {}", destination.display()))?;

    info!(from = %source.display(), to = %destination.display(), "Imported device configuration");
    Ok(registry)
}
