//! TOML-file source catalog

use async_trait::async_trait;
use digest_press_domain::{CatalogError, Source, SourceCatalog};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::fs_atomic::write_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    sources: Vec<Source>,
}

/// Source catalog stored as `[[sources]]` tables in a TOML file
pub struct TomlSourceCatalog {
    path: PathBuf,
}

impl TomlSourceCatalog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn validate(sources: &[Source]) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for source in sources {
            if !source.is_valid() {
                return Err(CatalogError::InvalidHandle {
                    handle: source.handle.clone(),
                    kind: source.kind.to_string(),
                });
            }
            if !seen.insert((source.handle.to_lowercase(), source.kind)) {
                return Err(CatalogError::Duplicate(source.to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SourceCatalog for TomlSourceCatalog {
    async fn load(&self) -> Result<Vec<Source>, CatalogError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No source catalog file, treating as empty");
                return Ok(vec![]);
            }
            Err(e) => return Err(CatalogError::Io(e)),
        };

        let file: CatalogFile = toml::from_str(&content).map_err(|e| CatalogError::Parse {
            file: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::validate(&file.sources)?;

        tracing::debug!(count = file.sources.len(), "Loaded source catalog");
        Ok(file.sources)
    }

    async fn save(&self, sources: &[Source]) -> Result<(), CatalogError> {
        Self::validate(sources)?;

        let file = CatalogFile {
            sources: sources.to_vec(),
        };
        let content = toml::to_string_pretty(&file).map_err(|e| CatalogError::Parse {
            file: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        write_atomic(&self.path, content.as_bytes()).await?;
        tracing::info!(path = %self.path.display(), count = sources.len(), "Saved source catalog");
        Ok(())
    }
}
