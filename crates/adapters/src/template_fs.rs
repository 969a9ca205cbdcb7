//! Plain-text instruction template file

use async_trait::async_trait;
use digest_press_domain::{InstructionTemplate, TemplateError, TemplateStore};
use std::path::{Path, PathBuf};

use crate::fs_atomic::write_atomic;

/// Template store backed by a single text file; the built-in default applies while it is absent
pub struct FsTemplateStore {
    path: PathBuf,
}

impl FsTemplateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an operator template overrides the default
    pub fn is_customized(&self) -> bool {
        self.path.exists()
    }
}

#[async_trait]
impl TemplateStore for FsTemplateStore {
    async fn load(&self) -> Result<InstructionTemplate, TemplateError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(InstructionTemplate::new(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(InstructionTemplate::default())
            }
            Err(e) => Err(TemplateError::Io(e)),
        }
    }

    async fn save(&self, template: &InstructionTemplate) -> Result<(), TemplateError> {
        template.validate()?;
        write_atomic(&self.path, template.text().as_bytes()).await?;
        tracing::info!(
            path = %self.path.display(),
            template_hash = %template.hash(),
            "Saved instruction template"
        );
        Ok(())
    }

    async fn reset(&self) -> Result<(), TemplateError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Instruction template reset to default");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TemplateError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn default_until_saved_and_after_reset() {
        let dir = TempDir::new().unwrap();
        let store = FsTemplateStore::new(dir.path().join("prompt.md"));

        assert_eq!(store.load().await.unwrap(), InstructionTemplate::default());

        let custom = InstructionTemplate::new("Write about {{title}}:\n{{transcript}}");
        store.save(&custom).await.unwrap();
        assert!(store.is_customized());
        assert_eq!(store.load().await.unwrap(), custom);

        store.reset().await.unwrap();
        store.reset().await.unwrap();
        assert_eq!(store.load().await.unwrap(), InstructionTemplate::default());
    }

    #[tokio::test]
    async fn invalid_template_is_not_saved() {
        let dir = TempDir::new().unwrap();
        let store = FsTemplateStore::new(dir.path().join("prompt.md"));

        let result = store
            .save(&InstructionTemplate::new("{{transcript}} by {{speaker}}"))
            .await;

        assert!(matches!(result, Err(TemplateError::UnknownPlaceholder(_))));
        assert!(!store.is_customized());
    }
}
