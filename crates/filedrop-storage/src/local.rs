use crate::traits::{
    validate_key, ByteRange, ByteStream, ServedContent, Storage, StorageError, StorageResult,
};
use crate::StorageBackend;
use async_trait::async_trait;
use filedrop_core::keys::{generate_barename, generate_delete_key};
use filedrop_core::{Expiry, Metadata};
use filedrop_processing::{inspect_to, is_archive_mimetype, list_archive_members};
use futures::StreamExt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Local filesystem storage implementation
///
/// Content lives at `files_path/{key}` and its metadata as JSON at
/// `meta_path/{key}`. Writes go to a dot-prefixed temporary file in the same
/// directory and are renamed into place, so readers never see partial data.
#[derive(Clone)]
pub struct LocalStorage {
    files_path: PathBuf,
    meta_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance, creating both directories if needed.
    pub async fn new(
        files_path: impl Into<PathBuf>,
        meta_path: impl Into<PathBuf>,
    ) -> StorageResult<Self> {
        let files_path = files_path.into();
        let meta_path = meta_path.into();

        for dir in [&files_path, &meta_path] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage {
            files_path,
            meta_path,
        })
    }

    fn content_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.files_path.join(key))
    }

    fn metadata_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.meta_path.join(key))
    }

    fn temp_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!(".{}.{}.tmp", key, generate_barename()))
    }

    async fn read_metadata(&self, key: &str) -> StorageResult<Metadata> {
        let path = self.metadata_path(key)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };

        serde_json::from_slice(&raw).map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Unparsable metadata sidecar");
            StorageError::BadMetadata(key.to_string())
        })
    }

    /// Serialize `metadata` to a temporary sidecar, returning its path.
    async fn write_metadata_temp(&self, key: &str, metadata: &Metadata) -> StorageResult<PathBuf> {
        let encoded = serde_json::to_vec(metadata)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to encode metadata: {}", e)))?;
        let temp = Self::temp_path(&self.meta_path, key);

        let result = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(&encoded).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to write metadata for {}: {}",
                key, e
            )));
        }
        Ok(temp)
    }

    /// Best-effort removal of everything a failed put may have left behind.
    async fn discard(paths: &[&Path]) {
        for path in paths {
            if let Err(e) = fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to clean up after put");
                }
            }
        }
    }

    async fn archive_members(path: PathBuf, mimetype: String) -> Vec<String> {
        if !is_archive_mimetype(&mimetype) {
            return Vec::new();
        }
        tokio::task::spawn_blocking(move || {
            std::fs::File::open(&path)
                .map(|file| list_archive_members(&mimetype, std::io::BufReader::new(file)))
                .unwrap_or_default()
        })
        .await
        .unwrap_or_default()
    }

    async fn open_content(&self, key: &str) -> StorageResult<fs::File> {
        let path = self.content_path(key)?;
        fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::DownloadFailed(format!(
                "Failed to open file {}: {}",
                path.display(),
                e
            )),
        })
    }

    fn file_stream<R>(reader: R) -> ByteStream
    where
        R: AsyncRead + Send + 'static,
    {
        let stream = tokio_util::io::ReaderStream::new(reader).map(|result| {
            result.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
        });
        Box::pin(stream)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.content_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn head(&self, key: &str) -> StorageResult<Metadata> {
        self.read_metadata(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<(Metadata, ByteStream)> {
        let metadata = self.read_metadata(key).await?;
        let file = self.open_content(key).await?;
        Ok((metadata, Self::file_stream(file)))
    }

    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        expiry: Expiry,
        delete_key: &str,
        access_key: &str,
    ) -> StorageResult<Metadata> {
        let path = self.content_path(key)?;
        let meta_path = self.metadata_path(key)?;
        let start = std::time::Instant::now();

        let temp = Self::temp_path(&self.files_path, key);
        let mut file = fs::File::create(&temp).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", temp.display(), e))
        })?;

        let inspection = match inspect_to(reader, &mut file).await {
            Ok(inspection) => inspection,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&temp).await;
                return Err(e.into());
            }
        };
        if let Err(e) = file.sync_all().await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                temp.display(),
                e
            )));
        }
        drop(file);

        if inspection.size == 0 {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::EmptyContent);
        }

        let archive_files = Self::archive_members(temp.clone(), inspection.mimetype.clone()).await;

        let metadata = Metadata {
            delete_key: if delete_key.is_empty() {
                generate_delete_key()
            } else {
                delete_key.to_string()
            },
            access_key: access_key.to_string(),
            sha256sum: inspection.sha256sum,
            mimetype: inspection.mimetype,
            size: inspection.size,
            expiry,
            archive_files,
        };

        let meta_temp = match self.write_metadata_temp(key, &metadata).await {
            Ok(meta_temp) => meta_temp,
            Err(e) => {
                let _ = fs::remove_file(&temp).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            let _ = fs::remove_file(&meta_temp).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to move file into place {}: {}",
                path.display(),
                e
            )));
        }

        // Between these two renames an overwrite exposes the new bytes under the
        // previous sidecar (old access key and digest). If the second rename
        // fails, the old sidecar no longer describes anything and goes too.
        if let Err(e) = fs::rename(&meta_temp, &meta_path).await {
            Self::discard(&[path.as_path(), meta_path.as_path(), meta_temp.as_path()]).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to move metadata into place {}: {}",
                meta_path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = metadata.size,
            mimetype = %metadata.mimetype,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(metadata)
    }

    async fn put_metadata(&self, key: &str, metadata: &Metadata) -> StorageResult<()> {
        let meta_path = self.metadata_path(key)?;
        let temp = self.write_metadata_temp(key, metadata).await?;
        if let Err(e) = fs::rename(&temp, &meta_path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to move metadata into place {}: {}",
                meta_path.display(),
                e
            )));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.content_path(key)?;
        let meta_path = self.metadata_path(key)?;
        let start = std::time::Instant::now();

        let mut removed = false;
        let mut failures = Vec::new();
        for target in [&path, &meta_path] {
            match fs::remove_file(target).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => failures.push(format!("{}: {}", target.display(), e)),
            }
        }

        if !failures.is_empty() {
            return Err(StorageError::DeleteFailed(failures.join("; ")));
        }
        if !removed {
            return Err(StorageError::NotFound(key.to_string()));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn size(&self, key: &str) -> StorageResult<u64> {
        let path = self.content_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn serve_file(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> StorageResult<ServedContent> {
        let mut file = self.open_content(key).await?;
        let total_size = file.metadata().await?.len();

        let body = match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                Self::file_stream(file.take(range.len()))
            }
            None => Self::file_stream(file),
        };

        Ok(ServedContent {
            total_size,
            range,
            body,
        })
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.files_path).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            keys.push(name);
        }
        Ok(keys)
    }

    async fn regenerate_metadata(&self, key: &str) -> StorageResult<Metadata> {
        match self.read_metadata(key).await {
            Ok(existing) => return Ok(existing),
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let path = self.content_path(key)?;
        let mut file = self.open_content(key).await?;
        let inspection = inspect_to(&mut file, &mut tokio::io::sink()).await?;
        let archive_files = Self::archive_members(path, inspection.mimetype.clone()).await;

        let metadata = Metadata {
            delete_key: generate_delete_key(),
            access_key: String::new(),
            sha256sum: inspection.sha256sum,
            mimetype: inspection.mimetype,
            size: inspection.size,
            expiry: Expiry::Never,
            archive_files,
        };
        self.put_metadata(key, &metadata).await?;

        tracing::warn!(
            key = %key,
            size_bytes = metadata.size,
            "Regenerated missing metadata"
        );

        Ok(metadata)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use std::io::Cursor;
    use tempfile::{tempdir, TempDir};

    async fn storage() -> (TempDir, LocalStorage) {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("files"), dir.path().join("meta"))
            .await
            .unwrap();
        (dir, storage)
    }

    async fn collect(mut body: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let (_dir, storage) = storage().await;
        let data = b"round trip content".to_vec();

        let metadata = storage
            .put("a.txt", &mut Cursor::new(data.clone()), Expiry::Never, "", "")
            .await
            .unwrap();

        assert_eq!(metadata.size, data.len() as u64);
        assert_eq!(metadata.sha256sum, hex::encode(Sha256::digest(&data)));
        assert_eq!(metadata.delete_key.len(), 30);

        let (head, body) = storage.get("a.txt").await.unwrap();
        assert_eq!(head, metadata);
        assert_eq!(collect(body).await, data);
    }

    #[tokio::test]
    async fn test_put_keeps_supplied_keys() {
        let (_dir, storage) = storage().await;
        let metadata = storage
            .put("k.txt", &mut Cursor::new(b"x".to_vec()), Expiry::Never, "mine", "secret")
            .await
            .unwrap();
        assert_eq!(metadata.delete_key, "mine");
        assert_eq!(metadata.access_key, "secret");
    }

    #[tokio::test]
    async fn test_empty_put_leaves_nothing() {
        let (dir, storage) = storage().await;

        let result = storage
            .put("empty.txt", &mut Cursor::new(Vec::new()), Expiry::Never, "", "")
            .await;

        assert!(matches!(result, Err(StorageError::EmptyContent)));
        assert!(!storage.exists("empty.txt").await.unwrap());
        assert_eq!(std::fs::read_dir(dir.path().join("files")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join("meta")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_head_missing_and_corrupt() {
        let (dir, storage) = storage().await;

        assert!(matches!(
            storage.head("nope.txt").await,
            Err(StorageError::NotFound(_))
        ));

        std::fs::write(dir.path().join("meta").join("bad.txt"), b"{not json").unwrap();
        assert!(matches!(
            storage.head("bad.txt").await,
            Err(StorageError::BadMetadata(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_both_halves() {
        let (dir, storage) = storage().await;
        storage
            .put("gone.txt", &mut Cursor::new(b"bye".to_vec()), Expiry::Never, "", "")
            .await
            .unwrap();

        storage.delete("gone.txt").await.unwrap();

        assert!(!dir.path().join("files").join("gone.txt").exists());
        assert!(!dir.path().join("meta").join("gone.txt").exists());
        assert!(matches!(
            storage.delete("gone.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_serve_file_range() {
        let (_dir, storage) = storage().await;
        storage
            .put("r.txt", &mut Cursor::new(b"0123456789".to_vec()), Expiry::Never, "", "")
            .await
            .unwrap();

        let served = storage
            .serve_file("r.txt", Some(ByteRange { start: 2, end: 5 }))
            .await
            .unwrap();
        assert_eq!(served.total_size, 10);
        assert_eq!(served.content_length(), 4);
        assert_eq!(collect(served.body).await, b"2345");

        let whole = storage.serve_file("r.txt", None).await.unwrap();
        assert_eq!(collect(whole.body).await, b"0123456789");
    }

    #[tokio::test]
    async fn test_list_skips_temporaries() {
        let (dir, storage) = storage().await;
        for key in ["one.txt", "two.txt"] {
            storage
                .put(key, &mut Cursor::new(b"x".to_vec()), Expiry::Never, "", "")
                .await
                .unwrap();
        }
        std::fs::write(dir.path().join("files").join(".one.txt.abc.tmp"), b"partial").unwrap();

        let mut keys = storage.list().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["one.txt", "two.txt"]);
    }

    #[tokio::test]
    async fn test_put_metadata_keeps_content() {
        let (_dir, storage) = storage().await;
        let mut metadata = storage
            .put("m.txt", &mut Cursor::new(b"content".to_vec()), Expiry::Never, "", "")
            .await
            .unwrap();

        metadata.access_key = "letmein".to_string();
        storage.put_metadata("m.txt", &metadata).await.unwrap();

        let (head, body) = storage.get("m.txt").await.unwrap();
        assert_eq!(head.access_key, "letmein");
        assert_eq!(collect(body).await, b"content");
    }

    #[tokio::test]
    async fn test_failed_metadata_rename_removes_new_content() {
        let (dir, storage) = storage().await;
        // A non-empty directory where the sidecar goes makes the rename fail
        let blocker = dir.path().join("meta").join("w.txt");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let result = storage
            .put("w.txt", &mut Cursor::new(b"new".to_vec()), Expiry::Never, "", "")
            .await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert!(!dir.path().join("files").join("w.txt").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("meta"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("w.txt")]);
    }

    #[tokio::test]
    async fn test_discard_drops_stale_sidecar() {
        let (dir, storage) = storage().await;
        storage
            .put("s.txt", &mut Cursor::new(b"old".to_vec()), Expiry::Never, "", "secret")
            .await
            .unwrap();
        let content = dir.path().join("files").join("s.txt");
        let sidecar = dir.path().join("meta").join("s.txt");
        let temp = dir.path().join("meta").join(".s.txt.x.tmp");
        std::fs::write(&temp, b"{}").unwrap();

        LocalStorage::discard(&[content.as_path(), sidecar.as_path(), temp.as_path()]).await;

        assert!(matches!(
            storage.head("s.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!content.exists());
        assert!(!temp.exists());
        // Already gone is fine
        LocalStorage::discard(&[content.as_path()]).await;
    }

    #[tokio::test]
    async fn test_regenerate_metadata_for_bare_file() {
        let (dir, storage) = storage().await;
        std::fs::write(dir.path().join("files").join("legacy.txt"), b"hello").unwrap();

        let first = storage.regenerate_metadata("legacy.txt").await.unwrap();
        assert_eq!(first.size, 5);
        assert_eq!(first.expiry, Expiry::Never);
        assert_eq!(first.mimetype, "text/plain");

        let second = storage.regenerate_metadata("legacy.txt").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_archive_members_recorded() {
        let (_dir, storage) = storage().await;
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "inner.txt", &b"abc"[..]).unwrap();
        let tar = builder.into_inner().unwrap();

        let metadata = storage
            .put("bundle.tar", &mut Cursor::new(tar), Expiry::Never, "", "")
            .await
            .unwrap();
        assert_eq!(metadata.mimetype, "application/x-tar");
        assert_eq!(metadata.archive_files, vec!["inner.txt"]);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let (_dir, storage) = storage().await;

        assert!(matches!(
            storage.head("../../../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.delete("../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
