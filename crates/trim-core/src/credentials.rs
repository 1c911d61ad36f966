use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use dirs::config_dir;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const CONFIG_DIR_NAME: &str = "trim";
const CONNECTION_FILE_NAME: &str = "connection.toml";
const MASTER_KEY_FILE: &str = "secret.key";
const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Directory holding Trim's persisted state for the current profile.
pub fn config_directory() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("token and provider must be non-empty")]
    Empty,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("local encryption failed: {0}")]
    Crypto(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// The persisted connection pair, decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConnection {
    pub token: String,
    pub provider: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConnectionDocument {
    #[serde(default = "schema_version")]
    schema_version: u32,
    provider: String,
    token: EncryptedToken,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncryptedToken {
    nonce: String,
    ciphertext: String,
}

const fn schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

/// Durable store for the current connection's identity token and provider tag.
///
/// Both halves live in one document so they are written and removed together.
/// A document with either half missing or unreadable loads as absent: a torn
/// write must never surface as a linked-looking connection.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the user's config directory.
    pub fn open_default() -> Self {
        Self::new(config_directory())
    }

    fn connection_path(&self) -> PathBuf {
        self.root.join(CONNECTION_FILE_NAME)
    }

    fn master_key_path(&self) -> PathBuf {
        self.root.join(MASTER_KEY_FILE)
    }

    /// Persist the pair, replacing any previous one. The token is encrypted
    /// with the local master key before it touches disk.
    pub fn save(&self, token: &str, provider: &str) -> Result<(), CredentialError> {
        let token = token.trim();
        let provider = provider.trim();
        if token.is_empty() || provider.is_empty() {
            return Err(CredentialError::Empty);
        }

        let (nonce, ciphertext) = self.encrypt(token.as_bytes())?;
        let document = ConnectionDocument {
            schema_version: CURRENT_SCHEMA_VERSION,
            provider: provider.to_string(),
            token: EncryptedToken {
                nonce: STANDARD.encode(nonce),
                ciphertext: STANDARD.encode(ciphertext),
            },
        };

        fs::create_dir_all(&self.root)?;
        let encoded = toml::to_string_pretty(&document)
            .map_err(|err| CredentialError::Serde(err.to_string()))?;
        fs::write(self.connection_path(), encoded)?;
        Ok(())
    }

    /// The stored pair, or `None` when nothing usable is on disk. Corruption
    /// of either half reads as absent rather than an error.
    pub fn load(&self) -> Result<Option<StoredConnection>, CredentialError> {
        let raw = match fs::read_to_string(self.connection_path()) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CredentialError::Io(err)),
        };

        let document: ConnectionDocument = match toml::from_str(&raw) {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "stored connection is unreadable; treating as absent");
                return Ok(None);
            }
        };
        if document.provider.trim().is_empty() {
            warn!("stored connection has no provider tag; treating as absent");
            return Ok(None);
        }

        let token = match self.decrypt_token(&document.token) {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "stored token could not be decrypted; treating as absent");
                return Ok(None);
            }
        };
        if token.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(StoredConnection {
            token,
            provider: document.provider,
        }))
    }

    /// Remove the pair. Removing an absent pair is not an error.
    pub fn clear(&self) -> Result<(), CredentialError> {
        match fs::remove_file(self.connection_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CredentialError::Io(err)),
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<([u8; 12], Vec<u8>), CredentialError> {
        let key = self.get_or_create_master_key()?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;

        let mut nonce_bytes = [0u8; 12];
        let mut rng = rand::rng();
        rng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        Ok((nonce_bytes, ciphertext))
    }

    fn decrypt_token(&self, token: &EncryptedToken) -> Result<String, CredentialError> {
        let nonce_bytes = STANDARD
            .decode(&token.nonce)
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        let cipher_bytes = STANDARD
            .decode(&token.ciphertext)
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        if nonce_bytes.len() != 12 {
            return Err(CredentialError::Crypto(
                "invalid nonce length for chacha20poly1305".to_string(),
            ));
        }

        let key = self.get_or_create_master_key()?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        let mut nonce_array = [0u8; 12];
        nonce_array.copy_from_slice(&nonce_bytes);
        let plaintext = cipher
            .decrypt(&Nonce::from(nonce_array), cipher_bytes.as_slice())
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        Ok(String::from_utf8_lossy(&plaintext).to_string())
    }

    fn get_or_create_master_key(&self) -> Result<[u8; 32], CredentialError> {
        let path = self.master_key_path();
        if path.exists() {
            let bytes = fs::read(&path)?;
            if bytes.len() == 32 {
                let mut key = [0u8; 32];
                key.copy_from_slice(&bytes);
                return Ok(key);
            }
            warn!(
                path = %path.display(),
                length = bytes.len(),
                "master key had unexpected length; regenerating"
            );
        }

        let mut key = [0u8; 32];
        let mut rng = rand::rng();
        rng.fill_bytes(&mut key);

        fs::create_dir_all(&self.root)?;
        let mut file = fs::File::create(&path)?;
        file.write_all(&key)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&path, fs::Permissions::from_mode(0o600));
        }
        Ok(key)
    }
}
