use crate::types::*;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use directories::ProjectDirs;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = "session.sb";
const DEVICE_KEY_FILE: &str = "device.key";
const RECORD_VERSION: u16 = 1;

/// What the shell remembers about the signed-in session between launches.
/// Sealed at rest with a per-device key; the identity provider's own tokens
/// never land here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user: SessionUser,
    pub issued_at_ms: i64,
    pub expires_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedRecord {
    version: u16,
    nonce_b64: String,
    ciphertext_b64: String,
}

pub(crate) fn data_dir() -> SbResult<PathBuf> {
    if let Ok(custom) = env::var("SKYBRIDGE_DATA_DIR") {
        return Ok(PathBuf::from(custom));
    }
    if let Some(proj) = ProjectDirs::from("com", "skybridge", "Skybridge") {
        return Ok(proj.data_dir().to_path_buf());
    }
    // Last resort inside the app sandbox; created lazily by callers
    Ok(env::temp_dir().join("skybridge"))
}

fn load_or_create_device_key(dir: &Path) -> SbResult<[u8; 32]> {
    let key_path = dir.join(DEVICE_KEY_FILE);
    if key_path.exists() {
        let data =
            fs::read(&key_path).map_err(|e| err_storage(format!("read device.key failed: {e}")))?;
        let mut key = [0u8; 32];
        if data.len() == 32 {
            key.copy_from_slice(&data);
            return Ok(key);
        }
        // support base64-stored keys
        if let Ok(decoded) = base64::engine::general_purpose::STANDARD_NO_PAD.decode(&data) {
            if decoded.len() == 32 {
                key.copy_from_slice(&decoded);
                return Ok(key);
            }
        }
        return Err(err_storage("invalid device.key"));
    }
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    fs::create_dir_all(dir).map_err(|e| err_storage(format!("create_dir_all failed: {e}")))?;
    fs::write(&key_path, key).map_err(|e| err_storage(format!("write device.key failed: {e}")))?;
    Ok(key)
}

fn seal(record: &SessionRecord, key: &[u8; 32]) -> SbResult<SealedRecord> {
    let plaintext = serde_json::to_vec(record)
        .map_err(|e| err_not_retriable(format!("serialize session record: {e}")))?;
    let cipher = XChaCha20Poly1305::new(key.into());
    let mut nonce = [0u8; 24];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|e| err_not_retriable(format!("seal session record: {e}")))?;
    Ok(SealedRecord {
        version: RECORD_VERSION,
        nonce_b64: base64::engine::general_purpose::STANDARD_NO_PAD.encode(nonce),
        ciphertext_b64: base64::engine::general_purpose::STANDARD_NO_PAD.encode(ciphertext),
    })
}

fn open(sealed: &SealedRecord, key: &[u8; 32]) -> SbResult<SessionRecord> {
    if sealed.version != RECORD_VERSION {
        return Err(err_storage(format!(
            "unsupported session record version {}",
            sealed.version
        )));
    }
    let nonce = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(sealed.nonce_b64.as_bytes())
        .map_err(|e| err_storage(format!("decode nonce: {e}")))?;
    if nonce.len() != 24 {
        return Err(err_storage("invalid nonce length"));
    }
    let ct = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(sealed.ciphertext_b64.as_bytes())
        .map_err(|e| err_storage(format!("decode ciphertext: {e}")))?;
    let cipher = XChaCha20Poly1305::new(key.into());
    let plaintext = cipher
        .decrypt(XNonce::from_slice(&nonce), ct.as_slice())
        .map_err(|_| err_storage("session record failed to decrypt"))?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| err_storage(format!("decode session record: {e}")))
}

pub(crate) fn store_in(dir: &Path, record: &SessionRecord) -> SbResult<()> {
    fs::create_dir_all(dir).map_err(|e| err_storage(format!("create_dir_all failed: {e}")))?;
    let key = load_or_create_device_key(dir)?;
    let sealed = seal(record, &key)?;
    let bytes = serde_json::to_vec(&sealed)
        .map_err(|e| err_not_retriable(format!("serialize sealed record: {e}")))?;
    fs::write(dir.join(SESSION_FILE), bytes)
        .map_err(|e| err_storage(format!("write session file failed: {e}")))?;
    Ok(())
}

pub(crate) fn load_in(dir: &Path) -> SbResult<Option<SessionRecord>> {
    let path = dir.join(SESSION_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path).map_err(|e| err_storage(format!("read session file: {e}")))?;
    let sealed: SealedRecord = serde_json::from_slice(&bytes)
        .map_err(|e| err_storage(format!("parse sealed record: {e}")))?;
    let key = load_or_create_device_key(dir)?;
    Ok(Some(open(&sealed, &key)?))
}

pub(crate) fn clear_in(dir: &Path) -> SbResult<()> {
    let path = dir.join(SESSION_FILE);
    if path.exists() {
        fs::remove_file(&path)
            .map_err(|e| err_storage(format!("remove session file: {e}")))?;
    }
    Ok(())
}

pub fn store(record: &SessionRecord) -> SbResult<()> {
    store_in(&data_dir()?, record)
}

pub fn load() -> SbResult<Option<SessionRecord>> {
    load_in(&data_dir()?)
}

pub fn clear() -> SbResult<()> {
    clear_in(&data_dir()?)
}
