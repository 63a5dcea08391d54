//! Marker-file locking for metadata documents.
//!
//! A document `D` is guarded by the marker file `D.lock` in the same
//! directory. Creating the marker with `create_new` is the atomic acquire;
//! deleting it is the release. Waiters poll at a fixed interval up to a
//! configured timeout, and a marker older than the lease duration is treated
//! as abandoned by a crashed holder and reclaimed.
//!
//! The lock is advisory and not reentrant: a task that already holds a
//! marker and acquires it again will deadlock until its own lease expires.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// Fixed delay between acquisition attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out waiting for lock on `{resource}` after {waited:?}")]
    Timeout { resource: String, waited: Duration },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Hands out [`LockGuard`]s for metadata documents.
///
/// `timeout` bounds how long an acquire waits for a busy marker; `lease` is
/// the marker age beyond which a holder is presumed dead.
#[derive(Clone, Debug)]
pub struct LockManager {
    timeout: Duration,
    lease: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration, lease: Duration) -> Self {
        Self { timeout, lease }
    }

    /// Acquires the lock guarding `document`, waiting up to the configured
    /// timeout. `owner` is written into the marker for diagnostics only.
    pub async fn acquire(&self, document: &Path, owner: &str) -> Result<LockGuard, LockError> {
        let marker = marker_path(document);
        let started = Instant::now();
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&marker)
                .await
            {
                Ok(mut file) => {
                    // Bookkeeping only; the marker's existence is the lock.
                    if let Err(err) = file.write_all(owner.as_bytes()).await {
                        let _ = tokio::fs::remove_file(&marker).await;
                        return Err(err.into());
                    }
                    debug!(marker = %marker.display(), owner, "acquired lock");
                    return Ok(LockGuard {
                        marker,
                        released: false,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if self.try_reclaim_stale(&marker).await? {
                        continue;
                    }
                    if started.elapsed() >= self.timeout {
                        return Err(LockError::Timeout {
                            resource: marker.display().to_string(),
                            waited: started.elapsed(),
                        });
                    }
                    sleep(POLL_INTERVAL).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Removes `marker` if it has outlived the lease. Returns `true` when the
    /// caller should retry immediately (marker gone, stale or otherwise).
    ///
    /// The marker is stat-ed twice and only unlinked if its mtime did not
    /// move between the two reads, so a marker freshly re-created by another
    /// waiter is left alone. A holder can still slip in between the second
    /// stat and the unlink; atomic document saves keep that window from
    /// corrupting anything worse than last-write-wins.
    async fn try_reclaim_stale(&self, marker: &Path) -> Result<bool, LockError> {
        let first = match tokio::fs::metadata(marker).await {
            Ok(meta) => meta.modified()?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(err.into()),
        };
        let age = match SystemTime::now().duration_since(first) {
            Ok(age) => age,
            // Clock skew put the marker in the future; treat as fresh.
            Err(_) => return Ok(false),
        };
        if age < self.lease {
            return Ok(false);
        }
        let second = match tokio::fs::metadata(marker).await {
            Ok(meta) => meta.modified()?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(err.into()),
        };
        if second != first {
            return Ok(false);
        }
        match tokio::fs::remove_file(marker).await {
            Ok(()) => {
                warn!(
                    marker = %marker.display(),
                    age_secs = age.as_secs(),
                    "reclaimed stale lock marker"
                );
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(err) => Err(err.into()),
        }
    }
}

/// Held lock over one document. Prefer [`LockGuard::release`]; dropping the
/// guard removes the marker best-effort on a blocking path.
#[derive(Debug)]
#[must_use = "dropping the guard releases the lock"]
pub struct LockGuard {
    marker: PathBuf,
    released: bool,
}

impl LockGuard {
    pub async fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        match tokio::fs::remove_file(&self.marker).await {
            Ok(()) => {
                debug!(marker = %self.marker.display(), "released lock");
                Ok(())
            }
            // Already reclaimed by a waiter after our lease lapsed.
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = std::fs::remove_file(&self.marker) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(
                    marker = %self.marker.display(),
                    error = %err,
                    "failed to remove lock marker on drop"
                );
            }
        }
    }
}

fn marker_path(document: &Path) -> PathBuf {
    let mut name = document.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_manager() -> LockManager {
        LockManager::new(Duration::from_millis(300), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn acquire_creates_marker_next_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("registry.json");
        let guard = quick_manager().acquire(&document, "alice").await.unwrap();
        let marker = dir.path().join("registry.json.lock");
        assert!(marker.exists());
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "alice");
        guard.release().await.unwrap();
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("registry.json");
        let manager = quick_manager();
        let _held = manager.acquire(&document, "alice").await.unwrap();
        let err = manager.acquire(&document, "bob").await.unwrap_err();
        match err {
            LockError::Timeout { resource, waited } => {
                assert!(resource.ends_with("registry.json.lock"));
                assert!(waited >= Duration::from_millis(300));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropping_the_guard_releases() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("registry.json");
        let manager = quick_manager();
        {
            let _guard = manager.acquire(&document, "alice").await.unwrap();
        }
        // Reacquire must succeed without waiting out a timeout.
        let guard = manager.acquire(&document, "bob").await.unwrap();
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn waiter_acquires_after_holder_releases() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("registry.json");
        let manager = LockManager::new(Duration::from_secs(5), Duration::from_secs(60));
        let guard = manager.acquire(&document, "alice").await.unwrap();

        let waiter = {
            let manager = manager.clone();
            let document = document.clone();
            tokio::spawn(async move { manager.acquire(&document, "bob").await })
        };

        sleep(Duration::from_millis(250)).await;
        guard.release().await.unwrap();
        let guard = waiter.await.unwrap().unwrap();
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn stale_marker_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("registry.json");
        let marker = dir.path().join("registry.json.lock");
        std::fs::write(&marker, "crashed-holder").unwrap();

        let manager = LockManager::new(Duration::from_secs(5), Duration::from_millis(50));
        sleep(Duration::from_millis(120)).await;
        let guard = manager.acquire(&document, "bob").await.unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "bob");
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn fresh_marker_is_not_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("registry.json");
        let marker = dir.path().join("registry.json.lock");
        std::fs::write(&marker, "live-holder").unwrap();

        let manager = LockManager::new(Duration::from_millis(250), Duration::from_secs(60));
        let err = manager.acquire(&document, "bob").await.unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "live-holder");
    }
}
