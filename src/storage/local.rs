use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use log::info;
use tempfile::NamedTempFile;

use crate::error::{HarvestError, Result, StoreErrorKind};

use super::ObjectStore;

/// Object store backed by a local directory: buckets are subdirectories of
/// `root` and must already exist.
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Bucket directory and object path. The bucket must be a single plain
    /// path component and the key must stay inside it.
    fn object_path(&self, bucket: &str, key: &str) -> Result<(PathBuf, PathBuf)> {
        let mut bucket_components = Path::new(bucket).components();
        let plain_bucket = matches!(
            (bucket_components.next(), bucket_components.next()),
            (Some(Component::Normal(_)), None)
        ) && !bucket.contains(['/', '\\']);

        let relative = Path::new(key.trim_start_matches('/'));
        let plain_key = relative.components().next().is_some()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !plain_bucket || !plain_key {
            return Err(HarvestError::store(
                StoreErrorKind::Rejected,
                format!("invalid object location {bucket}/{key}"),
            ));
        }

        let bucket_dir = self.root.join(bucket);
        let path = bucket_dir.join(relative);
        Ok((bucket_dir, path))
    }
}

fn io_error(e: std::io::Error) -> HarvestError {
    HarvestError::store(StoreErrorKind::Io, e.to_string())
}

/// Writes through a temp file in the target directory and renames it into
/// place, so the object is either fully replaced or untouched.
fn write_atomic(path: &Path, body: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| HarvestError::store(StoreErrorKind::Rejected, "object has no parent"))?;
    std::fs::create_dir_all(parent).map_err(io_error)?;

    let mut temp = NamedTempFile::new_in(parent).map_err(io_error)?;
    temp.write_all(body).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;

    Ok(())
}

#[async_trait]
impl ObjectStore for LocalFsStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let (bucket_dir, path) = self.object_path(bucket, key)?;
        if !bucket_dir.is_dir() {
            return Err(HarvestError::store(
                StoreErrorKind::BucketNotFound,
                format!("{} does not exist", bucket_dir.display()),
            ));
        }

        let size = body.len();
        let target = path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&target, &body))
            .await
            .map_err(|e| HarvestError::store(StoreErrorKind::Io, e.to_string()))??;

        info!("Stored {size} bytes at {}", path.display());
        Ok(())
    }
}
