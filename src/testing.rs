//! In-memory stand-ins for the external collaborators, shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::Credential;
use crate::error::{HarvestError, Result, StoreErrorKind};
use crate::providers::testrail::{ApiReply, Endpoint, ProjectApi};
use crate::secrets::SecretStore;
use crate::storage::ObjectStore;

enum Canned {
    Reply(ApiReply),
    NetworkDown,
}

/// Project API answering from canned replies. Unknown endpoints answer the
/// way TestRail does for a project id that does not exist.
pub struct FakeApi {
    replies: HashMap<String, Canned>,
    calls: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Delays every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn reply(mut self, endpoint: Endpoint, status: u16, body: &str) -> Self {
        self.replies
            .insert(endpoint.path(), Canned::Reply(ApiReply::new(status, body)));
        self
    }

    pub fn network_down(mut self, endpoint: Endpoint) -> Self {
        self.replies.insert(endpoint.path(), Canned::NetworkDown);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectApi for FakeApi {
    async fn get(&self, endpoint: Endpoint, _credential: &Credential) -> Result<ApiReply> {
        let path = endpoint.path();
        self.calls.lock().unwrap().push(path.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.replies.get(&path) {
            Some(Canned::Reply(reply)) => Ok(reply.clone()),
            Some(Canned::NetworkDown) => Err(HarvestError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            None => Ok(ApiReply::new(
                400,
                r#"{"error":"Field :project_id is not a valid or accessible project."}"#,
            )),
        }
    }
}

/// Secret store holding at most one payload, counting reads.
pub struct FakeSecretStore {
    payload: Option<String>,
    reads: AtomicUsize,
}

impl FakeSecretStore {
    pub fn with_payload(payload: &str) -> Self {
        Self {
            payload: Some(payload.to_string()),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            payload: None,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    fn backend(&self) -> &'static str {
        "fake"
    }

    async fn secret_string(&self, name: &str) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.payload
            .clone()
            .ok_or_else(|| HarvestError::SecretNotFound(name.to_string()))
    }
}

/// Object store keeping writes in memory, optionally refusing them.
pub struct MemoryStore {
    objects: Mutex<Vec<(String, String, Vec<u8>)>>,
    attempts: AtomicUsize,
    refuse_with: Option<StoreErrorKind>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            refuse_with: None,
        }
    }

    pub fn refusing(kind: StoreErrorKind) -> Self {
        Self {
            refuse_with: Some(kind),
            ..Self::new()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn objects(&self) -> Vec<(String, String, Vec<u8>)> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.refuse_with {
            return Err(HarvestError::store(kind, "refused by test store"));
        }

        self.objects
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), body));
        Ok(())
    }
}
