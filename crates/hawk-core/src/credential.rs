use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Size of the shared secret in bytes before encoding.
const KEY_BYTES: usize = 32;

/// MAC algorithm a Hawk client signs requests with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sha1,
    #[default]
    Sha256,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hawk credential handed to a client: an id to send, a key to sign with.
///
/// Credentials are immutable once issued; revocation deletes them.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub key: String,
    pub algorithm: Algorithm,
}

// Keys must never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Issues fresh credentials. The id and key come from independent random
/// sources, so neither can be derived from the other.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialFactory;

impl CredentialFactory {
    /// Algorithm stamped on every credential this factory issues.
    pub const ALGORITHM: Algorithm = Algorithm::Sha256;

    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> Credential {
        Credential {
            id: generate_id(),
            key: generate_key(),
            algorithm: Self::ALGORITHM,
        }
    }
}

fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
