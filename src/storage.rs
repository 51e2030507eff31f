use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Bucket holding listing photos. It is public-read on the platform side.
pub const LISTING_IMAGES_BUCKET: &str = "property-images";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("upload of '{path}' failed: {message}")]
    Upload { path: String, message: String },
}

/// StorageService
///
/// Object storage contract for listing images. The real implementation talks
/// to the platform's S3-compatible gateway; tests use `MockStorageService`.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the bucket if missing. Only called in `Env::Local`.
    async fn ensure_bucket_exists(&self);

    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<(), StorageError>;

    /// Public URL of an object, without checking that it exists.
    fn public_url(&self, path: &str) -> String;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

/// S3StorageClient
///
/// Uses the AWS SDK against MinIO locally and the platform storage gateway
/// (`<SUPABASE_URL>/storage/v1/s3`) in production. Public URLs are built from
/// `public_base`, since the S3 endpoint itself does not serve anonymous reads.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_base: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (endpoint/bucket/key) is what MinIO and the platform gateway accept.
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.bucket_name, path)
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a client-supplied name cannot escape
/// the owner's prefix.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// object_path
///
/// `<owner>/<random>.<ext>`. The random component keeps two uploads of
/// `foto.jpg` from colliding; the extension is kept only if it is short and
/// alphanumeric.
pub fn object_path(owner: Uuid, file_name: &str) -> String {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    sanitize_key(&format!("{}/{}.{}", owner, Uuid::new_v4().simple(), extension))
}

/// UploadFile
///
/// One image part from a multipart submit.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// upload_images
///
/// Uploads each file in order and returns the public URLs of those that
/// succeeded. A failed file is logged and skipped; there is no retry and no
/// rollback of earlier successes. Objects uploaded here are orphaned if the
/// listing write that follows fails.
pub async fn upload_images(
    storage: &dyn StorageService,
    owner: Uuid,
    files: Vec<UploadFile>,
) -> Vec<String> {
    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        let path = object_path(owner, &file.file_name);
        match storage.upload(&path, file.bytes, &file.content_type).await {
            Ok(()) => urls.push(storage.public_url(&path)),
            Err(e) => {
                tracing::warn!(file = %file.file_name, error = %e, "image upload skipped");
            }
        }
    }
    urls
}

// --- Mock Implementation (tests) ---

/// MockStorageService
///
/// In-memory storage double. Records every successful upload path and can be
/// told to fail all uploads, or only those whose object path contains a marker
/// (usually an extension such as `.tiff`).
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every upload fails.
    pub should_fail: bool,
    /// Uploads whose path contains any of these fail.
    pub fail_paths_containing: Vec<String>,
    uploaded: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn failing_paths_containing(markers: &[&str]) -> Self {
        Self {
            fail_paths_containing: markers.iter().map(|m| m.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Paths of successful uploads, in upload order.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn upload(
        &self,
        path: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let rejected = self.should_fail
            || self
                .fail_paths_containing
                .iter()
                .any(|marker| path.contains(marker.as_str()));
        if rejected {
            return Err(StorageError::Upload {
                path: path.to_string(),
                message: "Mock Storage Error: Simulation requested".to_string(),
            });
        }
        if let Ok(mut paths) = self.uploaded.lock() {
            paths.push(sanitize_key(path));
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "http://localhost:9000/mock-bucket/{}",
            sanitize_key(path)
        )
    }
}
