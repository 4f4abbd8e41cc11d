mod local;
mod s3;

use async_trait::async_trait;

use crate::error::Result;

pub use local::LocalFsStore;
pub use s3::S3LikeStore;

/// Durable blob storage addressed by bucket and key.
///
/// A successful `put_object` means the whole body is stored under `key`,
/// replacing any previous object. Implementations never leave a partial
/// object behind on failure.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}
