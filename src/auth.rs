use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// TestRail API credential: the account identity plus its API key.
///
/// Resolved once per invocation and shared read-only by every probe.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    identity: String,
    api_key: String,
}

impl Credential {
    pub fn new(identity: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            api_key: api_key.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[cfg(test)]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Value for the `Authorization` header: `Basic base64(identity:apiKey)`.
    pub fn basic_auth_header(&self) -> String {
        let raw = format!("{}:{}", self.identity, self.api_key);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
