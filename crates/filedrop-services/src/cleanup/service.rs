use filedrop_storage::{Storage, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct CleanupService {
    storage: Arc<dyn Storage>,
    every: Duration,
    /// Suppresses the per-file deletion log lines
    no_logs: bool,
}

impl CleanupService {
    pub fn new(storage: Arc<dyn Storage>, every: Duration, no_logs: bool) -> Self {
        Self {
            storage,
            every,
            no_logs,
        }
    }

    /// Start the background sweep on a fixed interval.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut cleanup_interval = interval(self.every);

            loop {
                cleanup_interval.tick().await;

                match self.run_once().await {
                    Ok(report) => {
                        if !self.no_logs || report.failed > 0 {
                            tracing::info!(
                                scanned = report.scanned,
                                deleted = report.deleted,
                                failed = report.failed,
                                "Cleanup task completed"
                            );
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Cleanup task failed"),
                }
            }
        })
    }

    /// Delete every expired object once.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "expire_all"))]
    pub async fn run_once(&self) -> Result<CleanupReport, anyhow::Error> {
        let keys = self.storage.list().await?;
        let mut report = CleanupReport::default();

        for key in keys {
            report.scanned += 1;

            let metadata = match self.storage.head(&key).await {
                Ok(metadata) => metadata,
                // Gone since listing, or content without metadata; reads repair the latter
                Err(StorageError::NotFound(_)) => continue,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(key = %key, error = %e, "Failed to read metadata during cleanup");
                    continue;
                }
            };

            if !metadata.is_expired() {
                continue;
            }

            match self.storage.delete(&key).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {
                    report.deleted += 1;
                    if !self.no_logs {
                        tracing::info!(key = %key, "Deleted expired file");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(key = %key, error = %e, "Failed to delete expired file");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use filedrop_core::Expiry;
    use filedrop_storage::LocalStorage;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_run_once_deletes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(dir.path().join("files"), dir.path().join("meta"))
                .await
                .unwrap(),
        );

        let past = Expiry::At(Utc::now() - ChronoDuration::seconds(5));
        let future = Expiry::At(Utc::now() + ChronoDuration::hours(1));
        for (key, expiry) in [
            ("old1.txt", past),
            ("old2.txt", past),
            ("fresh.txt", future),
            ("forever.txt", Expiry::Never),
        ] {
            storage
                .put(key, &mut Cursor::new(b"x".to_vec()), expiry, "", "")
                .await
                .unwrap();
        }

        let service = CleanupService::new(storage.clone(), Duration::from_secs(60), true);
        let report = service.run_once().await.unwrap();

        assert_eq!(
            report,
            CleanupReport {
                scanned: 4,
                deleted: 2,
                failed: 0
            }
        );
        assert!(!storage.exists("old1.txt").await.unwrap());
        assert!(storage.exists("fresh.txt").await.unwrap());
        assert!(storage.exists("forever.txt").await.unwrap());

        let again = service.run_once().await.unwrap();
        assert_eq!(again.deleted, 0);
    }

    #[tokio::test]
    async fn test_start_sweeps_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(dir.path().join("files"), dir.path().join("meta"))
                .await
                .unwrap(),
        );
        storage
            .put(
                "old.txt",
                &mut Cursor::new(b"x".to_vec()),
                Expiry::At(Utc::now() - ChronoDuration::seconds(5)),
                "",
                "",
            )
            .await
            .unwrap();

        let service = Arc::new(CleanupService::new(
            storage.clone(),
            Duration::from_millis(20),
            true,
        ));
        let handle = service.start();

        let mut gone = false;
        for _ in 0..50 {
            if !storage.exists("old.txt").await.unwrap() {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(gone);
    }
}
