//! Run-in-progress markers

use async_trait::async_trait;
use digest_press_domain::{RunLock, RunLockError, parse_timestamp};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct LockContents {
    pid: u32,
    acquired_at: String,
}

/// Lock file published with a hard link so it never appears half-written.
///
/// A lock older than `stale_after` is taken over. The age comes from the
/// recorded `acquired_at`, or from the file's mtime when the contents cannot
/// be read. Takeover runs under a create-new guard file, so only one
/// contender can claim a stale lock.
pub struct FileRunLock {
    path: PathBuf,
    stale_after: time::Duration,
}

impl FileRunLock {
    pub fn new(path: impl AsRef<Path>, stale_after: time::Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stale_after,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unique path next to the lock, e.g. `run.lock.stale.<uuid>`
    fn sibling(&self, tag: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "run.lock".into());
        name.push(format!(".{}.{}", tag, Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }

    async fn try_create(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = LockContents {
            pid: std::process::id(),
            acquired_at: OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
        };
        let line = serde_json::to_string(&contents).map_err(std::io::Error::other)?;

        let staged = self.sibling("tmp");
        tokio::fs::write(&staged, line.as_bytes()).await?;
        let linked = tokio::fs::hard_link(&staged, &self.path).await;
        if let Err(e) = tokio::fs::remove_file(&staged).await {
            tracing::debug!(path = %staged.display(), error = %e, "Could not remove staged lock file");
        }
        linked
    }

    async fn create_or_held(&self) -> Result<(), RunLockError> {
        self.try_create().await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => RunLockError::Held("just now".to_string()),
            _ => RunLockError::Io(e.to_string()),
        })
    }

    /// When the lock at `path` was taken: its recorded time, else its mtime
    async fn holder_since(path: &Path) -> std::io::Result<OffsetDateTime> {
        let recorded = tokio::fs::read_to_string(path)
            .await?
            .trim()
            .to_string();
        if let Some(since) = serde_json::from_str::<LockContents>(&recorded)
            .ok()
            .and_then(|contents| parse_timestamp(&contents.acquired_at))
        {
            return Ok(since);
        }

        let modified = tokio::fs::metadata(path).await?.modified()?;
        Ok(OffsetDateTime::from(modified))
    }

    fn guard_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "run.lock".into());
        name.push(".takeover");
        self.path.with_file_name(name)
    }

    /// A guard left by a crashed contender is removed once it is a minute old
    async fn clear_abandoned_guard(&self, guard: &Path) {
        let Ok(modified) = tokio::fs::metadata(guard).await.and_then(|m| m.modified()) else {
            return;
        };
        if OffsetDateTime::now_utc() - OffsetDateTime::from(modified) > time::Duration::minutes(1) {
            tracing::warn!(path = %guard.display(), "Removing abandoned takeover guard");
            if let Err(e) = tokio::fs::remove_file(guard).await {
                tracing::debug!(path = %guard.display(), error = %e, "Could not remove takeover guard");
            }
        }
    }

    /// Replace a stale lock; caller holds the takeover guard
    async fn take_over(&self) -> Result<(), RunLockError> {
        let since = match Self::holder_since(&self.path).await {
            Ok(since) => since,
            Err(e) if e.kind() == ErrorKind::NotFound => return self.create_or_held().await,
            Err(e) => return Err(RunLockError::Io(e.to_string())),
        };
        if !self.is_stale(since) {
            return Err(RunLockError::Held(since.to_string()));
        }

        tracing::warn!(
            path = %self.path.display(),
            since = %since,
            "Taking over stale run lock"
        );

        let claimed = self.sibling("stale");
        match tokio::fs::rename(&self.path, &claimed).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return self.create_or_held().await,
            Err(e) => return Err(RunLockError::Io(e.to_string())),
        }

        // The stale holder may have released and a new run locked in between
        if let Ok(claimed_since) = Self::holder_since(&claimed).await {
            if !self.is_stale(claimed_since) {
                if let Err(e) = tokio::fs::hard_link(&claimed, &self.path).await {
                    tracing::warn!(error = %e, "Could not restore a live run lock");
                }
                if let Err(e) = tokio::fs::remove_file(&claimed).await {
                    tracing::debug!(path = %claimed.display(), error = %e, "Could not remove claimed lock");
                }
                return Err(RunLockError::Held(claimed_since.to_string()));
            }
        }

        tokio::fs::remove_file(&claimed)
            .await
            .map_err(|e| RunLockError::Io(e.to_string()))?;
        self.create_or_held().await
    }

    fn is_stale(&self, since: OffsetDateTime) -> bool {
        OffsetDateTime::now_utc() - since > self.stale_after
    }
}

#[async_trait]
impl RunLock for FileRunLock {
    async fn acquire(&self) -> Result<(), RunLockError> {
        match self.try_create().await {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(RunLockError::Io(e.to_string())),
        }

        let since = match Self::holder_since(&self.path).await {
            Ok(since) => since,
            // released between our attempt and the read
            Err(e) if e.kind() == ErrorKind::NotFound => return self.create_or_held().await,
            Err(e) => return Err(RunLockError::Io(e.to_string())),
        };

        if !self.is_stale(since) {
            return Err(RunLockError::Held(since.to_string()));
        }

        let guard = self.guard_path();
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&guard)
            .await
        {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.clear_abandoned_guard(&guard).await;
                return Err(RunLockError::Held(since.to_string()));
            }
            Err(e) => return Err(RunLockError::Io(e.to_string())),
        }

        let result = self.take_over().await;
        if let Err(e) = tokio::fs::remove_file(&guard).await {
            tracing::warn!(path = %guard.display(), error = %e, "Could not remove takeover guard");
        }
        result
    }

    async fn release(&self) -> Result<(), RunLockError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RunLockError::Io(e.to_string())),
        }
    }
}

/// Process-local lock for tests and one-off commands
#[derive(Debug, Default)]
pub struct InMemoryRunLock {
    held: AtomicBool,
}

impl InMemoryRunLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunLock for InMemoryRunLock {
    async fn acquire(&self) -> Result<(), RunLockError> {
        if self.held.swap(true, Ordering::SeqCst) {
            return Err(RunLockError::Held("in this process".to_string()));
        }
        Ok(())
    }

    async fn release(&self) -> Result<(), RunLockError> {
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration as StdDuration, SystemTime};
    use tempfile::TempDir;

    #[tokio::test]
    async fn second_acquire_is_refused_until_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        let first = FileRunLock::new(&path, time::Duration::hours(6));
        let second = FileRunLock::new(&path, time::Duration::hours(6));

        first.acquire().await.unwrap();
        assert!(matches!(second.acquire().await, Err(RunLockError::Held(_))));

        first.release().await.unwrap();
        second.acquire().await.unwrap();
        second.release().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(
            &path,
            r#"{"pid": 1, "acquired_at": "2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let lock = FileRunLock::new(&path, time::Duration::hours(6));
        lock.acquire().await.unwrap();

        let contents: LockContents =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(contents.pid, std::process::id());
    }

    #[tokio::test]
    async fn unreadable_fresh_lock_is_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(&path, "").unwrap();

        let lock = FileRunLock::new(&path, time::Duration::hours(6));
        assert!(matches!(lock.acquire().await, Err(RunLockError::Held(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn unreadable_old_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(&path, "garbage").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - StdDuration::from_secs(7 * 3600))
            .unwrap();

        let lock = FileRunLock::new(&path, time::Duration::hours(6));
        lock.acquire().await.unwrap();

        let contents: LockContents =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(contents.pid, std::process::id());
    }

    async fn contend(path: &Path, contenders: usize) -> Vec<Result<(), RunLockError>> {
        let mut set = tokio::task::JoinSet::new();
        for _ in 0..contenders {
            let lock = FileRunLock::new(path, time::Duration::hours(6));
            set.spawn(async move { lock.acquire().await });
        }
        set.join_all().await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn just_created_lock_is_held_by_every_contender() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        let holder = FileRunLock::new(&path, time::Duration::hours(6));
        holder.acquire().await.unwrap();

        let results = contend(&path, 8).await;
        assert!(results
            .iter()
            .all(|result| matches!(result, Err(RunLockError::Held(_)))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stale_lock_goes_to_exactly_one_contender() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(
            &path,
            r#"{"pid": 1, "acquired_at": "2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let results = contend(&path, 8).await;

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("run.lock")]);
    }

    #[tokio::test]
    async fn release_without_lock_is_fine() {
        let dir = TempDir::new().unwrap();
        let lock = FileRunLock::new(dir.path().join("run.lock"), time::Duration::hours(6));
        lock.release().await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_lock() {
        let lock = InMemoryRunLock::new();
        lock.acquire().await.unwrap();
        assert!(lock.acquire().await.is_err());
        lock.release().await.unwrap();
        lock.acquire().await.unwrap();
    }
}
