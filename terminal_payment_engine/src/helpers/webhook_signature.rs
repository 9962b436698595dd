//! # Webhook signatures
//!
//! The processor signs every webhook delivery. The signature header has the form
//!
//! ```text
//!    t=1718000000,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! where `t` is the unix time of the delivery and each `v1` is the hex-encoded HMAC-SHA256 of `{t}.{payload}` keyed by
//! the endpoint's shared secret. Several `v1` entries may be present while a secret is being rolled; any one of them
//! matching is sufficient. Deliveries whose timestamp is further than the tolerance from the current time are rejected
//! to limit replays.
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SIGNATURE_TOLERANCE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("No webhook secret has been configured")]
    NoSecret,
    #[error("The signature header is malformed: {0}")]
    MalformedHeader(String),
    #[error("The signature timestamp is outside the tolerance window")]
    TimestampOutOfTolerance,
    #[error("No signature in the header matches the payload")]
    Mismatch,
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| SignatureError::MalformedHeader(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Produces a signature header for `payload`, as the processor would.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let mac = mac_for(secret, timestamp, payload)?;
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={signature}"))
}

/// Verifies `header` against the raw request body. The comparison of signatures is constant-time.
pub fn verify_signature(secret: &str, header: &str, payload: &[u8], tolerance: Duration) -> Result<(), SignatureError> {
    if secret.trim().is_empty() {
        return Err(SignatureError::NoSecret);
    }
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => {
                let t = t.parse::<i64>().map_err(|_| SignatureError::MalformedHeader(format!("bad timestamp {t}")))?;
                timestamp = Some(t);
            },
            Some(("v1", sig)) => signatures.push(sig),
            // Other schemes (e.g. v0) are ignored
            Some(_) => {},
            None => return Err(SignatureError::MalformedHeader(format!("unexpected element '{part}'"))),
        }
    }
    let timestamp = timestamp.ok_or_else(|| SignatureError::MalformedHeader("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader("no v1 signature".into()));
    }
    let age = Utc::now().timestamp().abs_diff(timestamp);
    if age > tolerance.as_secs() {
        return Err(SignatureError::TimestampOutOfTolerance);
    }
    let expected = mac_for(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .filter_map(|s| hex::decode(s).ok())
        .any(|sig| expected.clone().verify_slice(&sig).is_ok());
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
