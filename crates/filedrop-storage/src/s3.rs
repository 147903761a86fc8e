use crate::traits::{
    validate_key, ByteRange, ByteStream, ServedContent, Storage, StorageError, StorageResult,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use filedrop_core::keys::generate_delete_key;
use filedrop_core::{Expiry, Metadata};
use filedrop_processing::inspect_to;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, GetRange, GetResult, ObjectStore,
    ObjectStoreExt, PutOptions, PutPayload,
};
use tokio::io::AsyncRead;

// Object metadata field names
const FIELD_EXPIRY: &str = "Expiry";
const FIELD_DELETE_KEY: &str = "Deletekey";
const FIELD_SIZE: &str = "Size";
const FIELD_MIMETYPE: &str = "Mimetype";
const FIELD_SHA256: &str = "Sha256sum";
const FIELD_ACCESS_KEY: &str = "AccessKey";

/// S3 storage implementation
///
/// Metadata travels as user-defined object metadata on the object itself, so
/// content and metadata are replaced in a single provider-atomic write.
/// Archive member lists are not kept here; they would not fit the provider's
/// metadata size limit.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Credentials come from the environment; bucket and region are explicit.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }

    fn location(key: &str) -> StorageResult<Path> {
        validate_key(key)?;
        Ok(Path::from(key.to_string()))
    }

    fn map_error(key: &str, err: ObjectStoreError) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::BackendError(other.to_string()),
        }
    }

    fn attributes(metadata: &Metadata) -> Attributes {
        let mut attributes = Attributes::new();
        let fields = [
            (FIELD_EXPIRY, metadata.expiry.unix_timestamp().to_string()),
            (FIELD_DELETE_KEY, metadata.delete_key.clone()),
            (FIELD_SIZE, metadata.size.to_string()),
            (FIELD_MIMETYPE, metadata.mimetype.clone()),
            (FIELD_SHA256, metadata.sha256sum.clone()),
            (FIELD_ACCESS_KEY, metadata.access_key.clone()),
        ];
        for (name, value) in fields {
            attributes.insert(Attribute::Metadata(name.into()), AttributeValue::from(value));
        }
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(metadata.mimetype.clone()),
        );
        attributes
    }

    /// Providers may change the case of metadata names, so match loosely.
    fn field(attributes: &Attributes, name: &str) -> Option<String> {
        attributes.iter().find_map(|(attribute, value)| match attribute {
            Attribute::Metadata(field) if field.eq_ignore_ascii_case(name) => {
                Some(AsRef::<str>::as_ref(value).to_string())
            }
            _ => None,
        })
    }

    fn metadata_from(key: &str, attributes: &Attributes) -> StorageResult<Metadata> {
        let bad = || StorageError::BadMetadata(key.to_string());
        let required = |name: &str| Self::field(attributes, name).ok_or_else(bad);

        let expiry: i64 = required(FIELD_EXPIRY)?.parse().map_err(|_| bad())?;
        let size: u64 = required(FIELD_SIZE)?.parse().map_err(|_| bad())?;

        Ok(Metadata {
            delete_key: required(FIELD_DELETE_KEY)?,
            access_key: Self::field(attributes, FIELD_ACCESS_KEY).unwrap_or_default(),
            sha256sum: required(FIELD_SHA256)?,
            mimetype: required(FIELD_MIMETYPE)?,
            size,
            expiry: Expiry::from(expiry),
            archive_files: Vec::new(),
        })
    }

    async fn fetch(&self, key: &str, options: GetOptions) -> StorageResult<GetResult> {
        let location = Self::location(key)?;
        self.store
            .get_opts(&location, options)
            .await
            .map_err(|e| Self::map_error(key, e))
    }

    async fn write(&self, key: &str, data: Bytes, metadata: &Metadata) -> StorageResult<()> {
        let location = Self::location(key)?;
        let options = PutOptions {
            attributes: Self::attributes(metadata),
            ..Default::default()
        };
        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    fn body(key: &str, result: GetResult) -> ByteStream {
        let key = key.to_string();
        let stream = result.into_stream().map_err(move |e| {
            tracing::error!(key = %key, error = %e, "S3 stream download error");
            StorageError::DownloadFailed(e.to_string())
        });
        Box::pin(stream)
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Self::location(key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn head(&self, key: &str) -> StorageResult<Metadata> {
        let result = self
            .fetch(
                key,
                GetOptions {
                    head: true,
                    ..Default::default()
                },
            )
            .await?;
        Self::metadata_from(key, &result.attributes)
    }

    async fn get(&self, key: &str) -> StorageResult<(Metadata, ByteStream)> {
        let result = self.fetch(key, GetOptions::default()).await?;
        let metadata = Self::metadata_from(key, &result.attributes)?;
        Ok((metadata, Self::body(key, result)))
    }

    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        expiry: Expiry,
        delete_key: &str,
        access_key: &str,
    ) -> StorageResult<Metadata> {
        validate_key(key)?;
        let start = std::time::Instant::now();

        // A single put needs the whole body up front.
        let mut buffer = Vec::new();
        let inspection = inspect_to(reader, &mut buffer).await?;
        if inspection.size == 0 {
            return Err(StorageError::EmptyContent);
        }

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
            archive_files: Vec::new(),
        };

        self.write(key, Bytes::from(buffer), &metadata)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = metadata.size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = metadata.size,
            mimetype = %metadata.mimetype,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(metadata)
    }

    async fn put_metadata(&self, key: &str, metadata: &Metadata) -> StorageResult<()> {
        // Object metadata cannot be edited in place; rewrite the object.
        let result = self.fetch(key, GetOptions::default()).await?;
        let data = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        self.write(key, data, metadata).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Self::location(key)?;

        self.store.delete(&location).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn size(&self, key: &str) -> StorageResult<u64> {
        let location = Self::location(key)?;
        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| Self::map_error(key, e))?;
        Ok(meta.size)
    }

    async fn serve_file(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> StorageResult<ServedContent> {
        let options = GetOptions {
            range: range.map(|r| GetRange::Bounded(r.start..r.end + 1)),
            ..Default::default()
        };
        let result = self.fetch(key, options).await?;
        let total_size = result.meta.size;

        Ok(ServedContent {
            total_size,
            range,
            body: Self::body(key, result),
        })
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        self.store
            .list(None)
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
