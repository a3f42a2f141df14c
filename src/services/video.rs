use std::time::Duration;

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;

use crate::core::config::Settings;
use crate::db::types::UploadType;

type HmacSha256 = Hmac<Sha256>;

/// Mux direct-upload client. Uploads are created with a passthrough blob so
/// the asset-ready webhook can be correlated back to a user and challenge.
#[derive(Debug, Clone)]
pub(crate) struct VideoService {
    client: Client,
    token_id: String,
    token_secret: String,
    api_base_url: String,
}

#[derive(Debug, Clone)]
pub(crate) struct DirectUpload {
    pub(crate) upload_id: String,
    pub(crate) upload_url: String,
}

/// Correlation data attached to every direct upload and echoed back on the
/// `video.asset.ready` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UploadPassthrough {
    pub(crate) user_id: String,
    pub(crate) challenge_id: String,
    pub(crate) upload_type: UploadType,
    pub(crate) timestamp: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WebhookEvent {
    #[serde(rename = "type")]
    pub(crate) event_type: String,
    #[serde(default)]
    pub(crate) data: Value,
}

impl VideoService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        let mux = settings.mux();
        if mux.token_id.is_empty() || mux.token_secret.is_empty() {
            tracing::warn!("MUX_TOKEN_ID/MUX_TOKEN_SECRET not configured; video uploads disabled");
            return Ok(None);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Mux HTTP client")?;

        Ok(Some(Self {
            client,
            token_id: mux.token_id.clone(),
            token_secret: mux.token_secret.clone(),
            api_base_url: mux.api_base_url.trim_end_matches('/').to_string(),
        }))
    }

    pub(crate) async fn create_direct_upload(
        &self,
        passthrough: &UploadPassthrough,
    ) -> Result<DirectUpload> {
        let payload = json!({
            "new_asset_settings": {
                "playback_policy": ["public"],
                "passthrough": serde_json::to_string(passthrough)
                    .context("Failed to encode upload passthrough")?,
            },
            // The recorder runs as a browser extension, so the origin varies.
            "cors_origin": "*",
        });

        let url = format!("{}/video/v1/uploads", self.api_base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.token_id, Some(&self.token_secret))
            .json(&payload)
            .send()
            .await
            .context("Failed to call Mux uploads API")?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            anyhow::bail!("Mux uploads API error (status {status}): {body}");
        }

        let data = body.get("data").context("Mux uploads response missing data")?;
        let upload_id = data
            .get("id")
            .and_then(Value::as_str)
            .context("Mux uploads response missing upload id")?
            .to_string();
        let upload_url = data
            .get("url")
            .and_then(Value::as_str)
            .context("Mux uploads response missing upload url")?
            .to_string();

        tracing::info!(upload_id = %upload_id, "Mux direct upload created");

        Ok(DirectUpload { upload_id, upload_url })
    }
}

/// Verifies the `mux-signature` header: `t=<unix>,v1=<hex hmac>` where the
/// HMAC-SHA256 is computed over `"{timestamp}.{payload}"`. An empty secret
/// disables verification (development only, strict config forbids it).
pub(crate) fn verify_webhook_signature(secret: &str, payload: &str, header: &str) -> bool {
    if secret.is_empty() {
        return true;
    }

    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("t=") {
            timestamp = Some(value);
        } else if let Some(value) = part.strip_prefix("v1=") {
            signature = Some(value);
        }
    }

    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return false;
    };

    let Ok(expected) = hex::decode(signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());

    mac.verify_slice(&expected).is_ok()
}

pub(crate) fn playback_url(base_url: &str, playback_id: &str) -> String {
    format!("{}/{}.m3u8", base_url.trim_end_matches('/'), playback_id)
}

pub(crate) fn parse_passthrough(raw: &str) -> Option<UploadPassthrough> {
    serde_json::from_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: &str, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let payload = r#"{"type":"video.asset.ready"}"#;
        let header = format!("t=1700000000,v1={}", sign("topsecret", "1700000000", payload));
        assert!(verify_webhook_signature("topsecret", payload, &header));
    }

    #[test]
    fn tampered_payload_fails() {
        let payload = r#"{"type":"video.asset.ready"}"#;
        let header = format!("t=1700000000,v1={}", sign("topsecret", "1700000000", payload));
        assert!(!verify_webhook_signature("topsecret", r#"{"type":"other"}"#, &header));
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = "{}";
        let header = format!("t=1,v1={}", sign("secret-a", "1", payload));
        assert!(!verify_webhook_signature("secret-b", payload, &header));
    }

    #[test]
    fn malformed_header_fails() {
        assert!(!verify_webhook_signature("topsecret", "{}", "v1=deadbeef"));
        assert!(!verify_webhook_signature("topsecret", "{}", "t=1700000000"));
        assert!(!verify_webhook_signature("topsecret", "{}", "t=1,v1=not-hex"));
    }

    #[test]
    fn empty_secret_skips_verification() {
        assert!(verify_webhook_signature("", "{}", "garbage"));
    }

    #[test]
    fn playback_url_format() {
        assert_eq!(
            playback_url("https://stream.mux.com", "abc123"),
            "https://stream.mux.com/abc123.m3u8"
        );
        assert_eq!(
            playback_url("https://stream.mux.com/", "abc123"),
            "https://stream.mux.com/abc123.m3u8"
        );
    }

    #[test]
    fn passthrough_roundtrip() {
        let raw = r#"{"user_id":"u1","challenge_id":"c1","upload_type":"reference","timestamp":123}"#;
        let parsed = parse_passthrough(raw).expect("passthrough");
        assert_eq!(parsed.user_id, "u1");
        assert_eq!(parsed.upload_type, UploadType::Reference);
        assert!(parse_passthrough("not json").is_none());
    }
}
