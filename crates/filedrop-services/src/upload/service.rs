use std::io::Cursor;
use std::sync::Arc;

use chrono::Utc;
use filedrop_core::expiry::resolve_expiry;
use filedrop_core::keys::generate_barename;
use filedrop_core::{Config, Upload};
use filedrop_processing::{magic, read_header};
use filedrop_storage::{Storage, StorageError};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::limit::SizeLimitedReader;
use super::naming::{
    is_prohibited, join_filename, next_barename, split_filename, FALLBACK_EXTENSION,
};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Empty file")]
    EmptyContent,

    #[error("File too large: {size} bytes exceeds max {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Prohibited filename: {0}")]
    ProhibitedFilename(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Server-side limits applied to every upload
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_size: u64,
    /// 0 = no maximum
    pub max_expiry_secs: u64,
    pub force_random_filename: bool,
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_size: config.max_size_bytes,
            max_expiry_secs: config.max_expiry_secs,
            force_random_filename: config.force_random_filename,
        }
    }
}

/// Client-controlled options for a single upload
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Suggested filename; may be empty
    pub filename: String,
    pub delete_key: String,
    pub access_key: String,
    pub expiry_secs: Option<u64>,
    pub randomize: bool,
    /// Size announced by the client before any bytes are read
    pub declared_size: Option<u64>,
}

/// Turns an incoming stream into a stored object.
pub struct UploadService {
    storage: Arc<dyn Storage>,
    policy: UploadPolicy,
}

impl UploadService {
    pub fn new(storage: Arc<dyn Storage>, policy: UploadPolicy) -> Self {
        Self { storage, policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Pick a free name for `barename.extension`.
    ///
    /// An existing object is replaced instead when the request carries its
    /// delete key. Two uploads racing for the same free name both get it and
    /// the later write wins.
    async fn allocate_name(
        &self,
        mut barename: String,
        extension: &str,
        delete_key: &str,
        random: bool,
    ) -> Result<String, UploadError> {
        let mut candidate = join_filename(&barename, extension);

        if !delete_key.is_empty() && self.storage.exists(&candidate).await? {
            if let Ok(existing) = self.storage.head(&candidate).await {
                if existing.delete_key == delete_key {
                    tracing::debug!(filename = %candidate, "Overwriting with matching delete key");
                    return Ok(candidate);
                }
            }
        }

        while self.storage.exists(&candidate).await? {
            barename = if random {
                generate_barename()
            } else {
                next_barename(&barename)
            };
            candidate = join_filename(&barename, extension);
        }

        Ok(candidate)
    }

    #[tracing::instrument(skip(self, request, reader), fields(suggested = %request.filename))]
    pub async fn upload<R>(&self, request: UploadRequest, reader: R) -> Result<Upload, UploadError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let max = self.policy.max_size;
        if let Some(size) = request.declared_size.filter(|size| *size > max) {
            return Err(UploadError::FileTooLarge { size, max });
        }

        let split = split_filename(&request.filename);
        let random =
            self.policy.force_random_filename || request.randomize || split.barename.is_empty();
        let barename = if random {
            generate_barename()
        } else {
            split.barename
        };

        let mut reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        let mut extension = split.extension;
        if extension.is_empty() {
            let header = read_header(&mut reader)
                .await
                .map_err(|e| UploadError::Storage(StorageError::IoError(e)))?;
            if header.is_empty() {
                return Err(UploadError::EmptyContent);
            }
            let detected = magic::detect(&header);
            extension = if detected.extension.is_empty() {
                FALLBACK_EXTENSION.to_string()
            } else {
                detected.extension.to_string()
            };
            reader = Box::new(Cursor::new(header).chain(reader));
        }

        let filename = join_filename(&barename, &extension);
        if is_prohibited(&filename) {
            return Err(UploadError::ProhibitedFilename(filename));
        }

        let filename = self
            .allocate_name(barename, &extension, &request.delete_key, random)
            .await?;
        let expiry = resolve_expiry(request.expiry_secs, self.policy.max_expiry_secs, Utc::now());

        let mut limited = SizeLimitedReader::new(reader, max);
        let result = self
            .storage
            .put(
                &filename,
                &mut limited,
                expiry,
                &request.delete_key,
                &request.access_key,
            )
            .await;

        let metadata = match result {
            Ok(metadata) => metadata,
            Err(_) if limited.exceeded() => {
                return Err(UploadError::FileTooLarge {
                    size: limited.bytes_read(),
                    max,
                })
            }
            Err(StorageError::EmptyContent) => return Err(UploadError::EmptyContent),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            filename = %filename,
            size_bytes = metadata.size,
            mimetype = %metadata.mimetype,
            expiry = metadata.expiry.unix_timestamp(),
            "Upload stored"
        );

        Ok(Upload { filename, metadata })
    }
}
