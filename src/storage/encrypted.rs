//! Encrypted JSON store.
//!
//! Each file is one AES-256-GCM blob: `base64url(version ‖ nonce ‖ ciphertext)`
//! with a fresh random 96-bit nonce per write. The 32-byte key is generated on
//! first use, stored base64-encoded in the key file (mode `0600` on Unix) and
//! reused afterwards. Losing the key file makes every blob written under it
//! unrecoverable.
//!
//! Reads fall back to plaintext JSON when the bytes are not a valid ciphertext
//! under the held key, which lets a plaintext predecessor file be picked up and
//! rewritten encrypted on the next save.

use super::{JsonStore, LoadOutcome, ensure_parent_dir, parse_plain};
use crate::errors::{Error, Result};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const FORMAT_VERSION: u8 = 1;

pub struct EncryptedStore {
    key_path: PathBuf,
    cipher: Aes256Gcm,
}

impl fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("key_path", &self.key_path)
            .finish_non_exhaustive()
    }
}

impl EncryptedStore {
    /// Opens the store, loading the key from `key_path` or generating it there.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the key file cannot be read or created and
    /// [`Error::Crypto`] if an existing key file does not hold a valid key.
    #[instrument]
    pub fn open(key_path: impl Into<PathBuf> + fmt::Debug) -> Result<Self> {
        let key_path = key_path.into();
        let key = ensure_key(&key_path)?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| Error::Crypto {
            message: format!("invalid key in {}: {e}", key_path.display()),
        })?;
        Ok(Self { key_path, cipher })
    }

    #[must_use]
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| Error::Crypto {
                message: "encryption failed".to_string(),
            })?;

        let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        blob.push(FORMAT_VERSION);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(URL_SAFE.encode(blob).into_bytes())
    }

    /// Returns `None` when `token` is not a ciphertext produced under this key.
    #[must_use]
    pub fn decrypt(&self, token: &[u8]) -> Option<Vec<u8>> {
        let text = std::str::from_utf8(token).ok()?.trim();
        let blob = URL_SAFE.decode(text).ok()?;
        if blob.len() <= NONCE_LEN || blob[0] != FORMAT_VERSION {
            return None;
        }
        let (nonce, ciphertext) = blob[1..].split_at(NONCE_LEN);
        self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
    }
}

impl JsonStore for EncryptedStore {
    #[instrument(skip(self))]
    fn read(&self, path: &Path) -> LoadOutcome {
        if !path.exists() {
            return LoadOutcome::Absent;
        }
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) => return LoadOutcome::Corrupt(format!("read failed: {e}")),
        };

        if let Some(plaintext) = self.decrypt(&raw) {
            return match parse_plain(&plaintext) {
                Ok(value) => LoadOutcome::Loaded(value),
                Err(reason) => LoadOutcome::Corrupt(format!("decrypted payload {reason}")),
            };
        }

        match parse_plain(&raw) {
            Ok(value) => {
                info!("Read plaintext JSON from {:?}; it will be encrypted on next save", path);
                LoadOutcome::Loaded(value)
            }
            Err(reason) => {
                warn!("{:?} is neither a valid ciphertext nor plaintext JSON ({})", path, reason);
                LoadOutcome::Corrupt(format!("undecryptable and {reason}"))
            }
        }
    }

    #[instrument(skip(self, value))]
    fn write(&self, path: &Path, value: &Value) -> Result<()> {
        ensure_parent_dir(path)?;
        let payload = serde_json::to_vec_pretty(value)?;
        let token = self.encrypt(&payload)?;
        std::fs::write(path, token)?;
        debug!("Wrote encrypted store {:?}", path);
        Ok(())
    }
}

fn ensure_key(key_path: &Path) -> Result<Vec<u8>> {
    if key_path.exists() {
        let encoded = std::fs::read_to_string(key_path)?;
        let key = STANDARD.decode(encoded.trim()).map_err(|e| Error::Crypto {
            message: format!("key file {} is not base64: {e}", key_path.display()),
        })?;
        if key.len() != KEY_LEN {
            return Err(Error::Crypto {
                message: format!(
                    "key file {} holds {} bytes, expected {KEY_LEN}",
                    key_path.display(),
                    key.len()
                ),
            });
        }
        return Ok(key);
    }

    ensure_parent_dir(key_path)?;
    let mut key = vec![0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    std::fs::write(key_path, STANDARD.encode(&key))?;
    restrict_permissions(key_path);
    info!("Generated new encryption key at {:?}", key_path);
    Ok(key)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!("Could not restrict permissions on {:?}: {}", path, e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
