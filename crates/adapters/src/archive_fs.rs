//! Filesystem digest archive

use async_trait::async_trait;
use digest_press_domain::{
    ArchiveError, AssembledDigest, DigestArchive, DigestFiles, DigestRecord,
};
use std::path::{Path, PathBuf};
use time::UtcOffset;
use time::macros::format_description;

use crate::fs_atomic::write_atomic;

const FILE_PREFIX: &str = "newsletter_";

/// Archive of sent digests: `newsletter_YYYYMMDD_HHMMSS.{html,epub,json}` in one directory
pub struct FsDigestArchive {
    dir: PathBuf,
}

impl FsDigestArchive {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem for a digest, unique within the archive directory
    fn stem_for(&self, digest: &AssembledDigest) -> Result<String, ArchiveError> {
        let stamp = digest
            .manifest
            .created_at
            .to_offset(UtcOffset::UTC)
            .format(format_description!(
                "[year][month][day]_[hour][minute][second]"
            ))
            .map_err(|e| ArchiveError::Serialization(e.to_string()))?;

        let base = format!("{}{}", FILE_PREFIX, stamp);
        let mut stem = base.clone();
        let mut counter = 2;
        while self.dir.join(format!("{}.html", stem)).exists() {
            stem = format!("{}_{}", base, counter);
            counter += 1;
        }
        Ok(stem)
    }
}

#[async_trait]
impl DigestArchive for FsDigestArchive {
    async fn store_files(&self, digest: &AssembledDigest) -> Result<DigestFiles, ArchiveError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let stem = self.stem_for(digest)?;

        let html_path = self.dir.join(format!("{}.html", stem));
        let ebook_path = self.dir.join(format!("{}.epub", stem));
        write_atomic(&html_path, digest.html.as_bytes()).await?;
        write_atomic(&ebook_path, &digest.ebook).await?;

        tracing::info!(
            html_file = %html_path.display(),
            ebook_file = %ebook_path.display(),
            "Stored digest files"
        );

        Ok(DigestFiles {
            html_file: html_path.display().to_string(),
            ebook_file: ebook_path.display().to_string(),
        })
    }

    async fn record(&self, record: &DigestRecord) -> Result<(), ArchiveError> {
        let manifest_path = Path::new(&record.files.html_file).with_extension("json");
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| ArchiveError::Serialization(e.to_string()))?;

        write_atomic(&manifest_path, content.as_bytes()).await?;
        tracing::debug!(path = %manifest_path.display(), "Recorded digest manifest");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DigestRecord>, ArchiveError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(ArchiveError::Io(e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_manifest = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(FILE_PREFIX));
            if !is_manifest {
                continue;
            }

            let parsed = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    serde_json::from_str::<DigestRecord>(&content).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(record) => records.push(record),
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "Skipping unreadable digest manifest")
                }
            }
        }

        records.sort_by(|a, b| b.manifest.created_at.cmp(&a.manifest.created_at));
        Ok(records)
    }
}
