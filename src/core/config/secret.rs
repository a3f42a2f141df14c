use std::{env, fs, path::PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

const SECRET_KEY_FILE: &str = ".webdojo_secret_key";

/// Dev convenience: without SECRET_KEY we generate one and persist it next to
/// the binary so restarts keep existing tokens valid. Production must set the
/// env var (enforced by strict validation).
pub(super) fn load_or_create_secret_key() -> String {
    let path = secret_key_path();

    if let Ok(existing) = fs::read_to_string(&path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut bytes = [0u8; 48];
    OsRng.fill_bytes(&mut bytes);
    let key = URL_SAFE_NO_PAD.encode(bytes);

    if let Err(err) = fs::write(&path, &key) {
        tracing::warn!(error = %err, path = %path.display(), "Failed to persist generated secret key");
    }

    key
}

fn secret_key_path() -> PathBuf {
    env::var("WEBDOJO_SECRET_KEY_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(SECRET_KEY_FILE))
}
