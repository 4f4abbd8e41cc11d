use std::fmt;

use chrono::NaiveDate;
use log::info;
use serde::Serialize;

use crate::aggregate::AggregateDocument;
use crate::error::Result;
use crate::storage::ObjectStore;

pub const DEFAULT_ARCHIVE_PREFIX: &str = "raw-data/testrail";

/// Object key for one day's aggregate:
/// `<prefix>/<yyyy>/<mm>/<dd>/<yyyymmdd>_testrail_data.json`.
///
/// Runs on the same calendar day share a key, so the last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArchivePath(String);

impl ArchivePath {
    pub fn for_date(prefix: &str, date: NaiveDate) -> Self {
        let file = format!(
            "{}/{}_testrail_data.json",
            date.format("%Y/%m/%d"),
            date.format("%Y%m%d")
        );

        match prefix.trim_matches('/') {
            "" => Self(file),
            prefix => Self(format!("{prefix}/{file}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where and how much an archive write stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReceipt {
    pub backend: String,
    pub bucket: String,
    pub key: String,
    pub bytes: usize,
}

/// Serializes the aggregate and writes it as a single object.
pub struct Archiver<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> Archiver<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// One `put_object` call, no read-back. Success means the store accepted
    /// the write.
    pub async fn store(
        &self,
        bucket: &str,
        document: &AggregateDocument,
        path: &ArchivePath,
    ) -> Result<ArchiveReceipt> {
        let body = document.to_canonical_json()?;
        let bytes = body.len();

        info!(
            "Archiving {} projects ({bytes} bytes) to {}://{bucket}/{path}",
            document.len(),
            self.store.backend()
        );

        self.store.put_object(bucket, path.as_str(), body).await?;

        Ok(ArchiveReceipt {
            backend: self.store.backend().to_string(),
            bucket: bucket.to_string(),
            key: path.to_string(),
            bytes,
        })
    }
}
