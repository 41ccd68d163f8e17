//! Encrypted at-rest storage for exchange API credentials.
//!
//! Each user owns one record of `{api_key, api_secret, use_testnet, label,
//! updated_at}`. Key material is sealed with ChaCha20-Poly1305 under a
//! 32-byte master key, one fresh random nonce per field, and is only ever
//! decrypted on demand into [`Zeroizing`] buffers scoped to the request
//! being served. Plaintext never touches the disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::prelude::*;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

/// Errors raised by the credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store file could not be read or written.
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file exists but does not parse as a credential store.
    #[error("malformed store file: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A sealed field could not be decrypted (wrong master key or tampering).
    #[error("cannot decrypt credentials for {user}: {reason}")]
    Decrypt { user: String, reason: String },

    /// A field could not be sealed for writing.
    #[error("cannot encrypt credentials: {0}")]
    Encrypt(String),

    /// The master key is not a base64-encoded 32-byte value.
    #[error("invalid master key: {0}")]
    InvalidKey(String),
}

/// 32-byte key for the credential store cipher.
#[derive(Clone)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Decodes a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] if the value is not valid base64
    /// or does not decode to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, StoreError> {
        let bytes = Zeroizing::new(
            BASE64_STANDARD
                .decode(encoded)
                .map_err(|e| StoreError::InvalidKey(format!("not base64: {e}")))?,
        );
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Decrypted exchange credentials for one user. Request-scoped; key
/// material zeroizes on drop.
pub struct ExchangeCredentials {
    pub api_key: Zeroizing<String>,
    pub api_secret: Zeroizing<String>,
    pub use_testnet: bool,
    pub label: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeCredentials {
    /// Wraps plaintext credentials, stamping `updated_at` with the current
    /// time.
    #[must_use]
    pub fn new(api_key: &str, api_secret: &str, use_testnet: bool, label: Option<String>) -> Self {
        Self {
            api_key: Zeroizing::new(api_key.to_string()),
            api_secret: Zeroizing::new(api_secret.to_string()),
            use_testnet,
            label,
            updated_at: Utc::now(),
        }
    }

    /// Returns the plaintext-free view exposed over the API.
    pub fn metadata(&self) -> CredentialsMetadata {
        CredentialsMetadata {
            label: self.label.clone(),
            use_testnet: self.use_testnet,
            updated_at: self.updated_at,
        }
    }
}

impl std::fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &"..")
            .field("api_secret", &"..")
            .field("use_testnet", &self.use_testnet)
            .field("label", &self.label)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Plaintext-free credential summary returned by the balances endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsMetadata {
    pub label: Option<String>,
    pub use_testnet: bool,
    pub updated_at: DateTime<Utc>,
}

/// Plaintext credentials being written to the store.
pub struct NewCredentials<'a> {
    pub api_key: &'a str,
    pub api_secret: &'a str,
    pub use_testnet: bool,
    pub label: Option<String>,
}

/// One base64 ciphertext with its nonce, as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
struct SealedValue {
    nonce: String,
    data: String,
}

/// On-disk record for one user.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    api_key: SealedValue,
    api_secret: SealedValue,
    #[serde(default)]
    use_testnet: bool,
    #[serde(default)]
    label: Option<String>,
    updated_at: DateTime<Utc>,
}

/// On-disk store file layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    users: BTreeMap<String, StoredRecord>,
}

/// File-backed credential store.
///
/// Every read goes to disk so each request observes the latest record;
/// nothing decrypted is cached between requests.
pub struct CredentialStore {
    path: PathBuf,
    cipher: ChaCha20Poly1305,
}

impl CredentialStore {
    /// Opens a store at `path`, validating the file if it already exists.
    ///
    /// A missing file is not an error; it is created on first write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if an existing file cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>, key: &MasterKey) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));
        let store = Self { path, cipher };
        // Surface a corrupt store at startup instead of on first request.
        store.read_file()?;
        Ok(store)
    }

    /// Decrypts and returns the credentials for `user_id`, or `None` if the
    /// user has no record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decrypt`] if a record exists but cannot be
    /// opened under the store's master key — distinct from "absent" so the
    /// HTTP layer can answer 500 rather than 404.
    pub fn get(&self, user_id: &str) -> Result<Option<ExchangeCredentials>, StoreError> {
        let file = self.read_file()?;
        let Some(record) = file.users.get(user_id) else {
            return Ok(None);
        };

        let api_key = self.open_sealed(user_id, &record.api_key)?;
        let api_secret = self.open_sealed(user_id, &record.api_secret)?;
        Ok(Some(ExchangeCredentials {
            api_key,
            api_secret,
            use_testnet: record.use_testnet,
            label: record.label.clone(),
            updated_at: record.updated_at,
        }))
    }

    /// Seals and persists credentials for `user_id`, replacing any existing
    /// record and stamping `updated_at`.
    pub fn put(&self, user_id: &str, new: NewCredentials<'_>) -> Result<(), StoreError> {
        let mut file = self.read_file()?;
        let record = StoredRecord {
            api_key: self.seal(new.api_key.as_bytes())?,
            api_secret: self.seal(new.api_secret.as_bytes())?,
            use_testnet: new.use_testnet,
            label: new.label,
            updated_at: Utc::now(),
        };
        file.users.insert(user_id.to_string(), record);
        self.write_file(&file)?;
        debug!(user = user_id, "stored exchange credentials");
        Ok(())
    }

    /// Removes the record for `user_id`. Returns whether a record existed.
    pub fn remove(&self, user_id: &str) -> Result<bool, StoreError> {
        let mut file = self.read_file()?;
        let existed = file.users.remove(user_id).is_some();
        if existed {
            self.write_file(&file)?;
        }
        Ok(existed)
    }

    fn read_file(&self) -> Result<StoreFile, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&self, file: &StoreFile) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(file)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    fn seal(&self, plaintext: &[u8]) -> Result<SealedValue, StoreError> {
        let mut nonce = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let data = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| StoreError::Encrypt(e.to_string()))?;
        Ok(SealedValue {
            nonce: BASE64_STANDARD.encode(nonce),
            data: BASE64_STANDARD.encode(data),
        })
    }

    fn open_sealed(
        &self,
        user_id: &str,
        sealed: &SealedValue,
    ) -> Result<Zeroizing<String>, StoreError> {
        let decrypt_err = |reason: String| StoreError::Decrypt {
            user: user_id.to_string(),
            reason,
        };

        let nonce = BASE64_STANDARD
            .decode(&sealed.nonce)
            .map_err(|e| decrypt_err(format!("bad nonce encoding: {e}")))?;
        if nonce.len() != 12 {
            return Err(decrypt_err(format!("bad nonce length: {}", nonce.len())));
        }
        let data = BASE64_STANDARD
            .decode(&sealed.data)
            .map_err(|e| decrypt_err(format!("bad ciphertext encoding: {e}")))?;

        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(Nonce::from_slice(&nonce), data.as_slice())
                .map_err(|_| decrypt_err("authentication failed".to_string()))?,
        );
        String::from_utf8(plaintext.to_vec())
            .map(Zeroizing::new)
            .map_err(|_| decrypt_err("plaintext is not utf-8".to_string()))
    }
}
