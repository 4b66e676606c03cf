//! Stripe-style Webhook Signatures
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac-sha256>[,v1=...]`, where the
//! MAC covers `"{t}.{payload}"` keyed with the whole signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed timestamp, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::SignatureInvalid(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Produce a signature header for `payload`
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
}

/// Check `header` against `payload` as of `now`
pub fn verify(payload: &[u8], header: &str, secret: &str, now: i64, tolerance_secs: i64) -> Result<()> {
    if secret.is_empty() {
        return Err(PaymentError::SignatureInvalid("no signing secret configured".into()));
    }

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::SignatureInvalid("missing timestamp in signature header".into()))?;
    if candidates.is_empty() {
        return Err(PaymentError::SignatureInvalid("no v1 signature in header".into()));
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(PaymentError::SignatureInvalid("timestamp outside the tolerance zone".into()));
    }

    let matched = candidates.iter().filter_map(|c| hex::decode(c).ok()).any(|expected| {
        mac_for(secret, timestamp, payload)
            .map(|mac| mac.verify_slice(&expected).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::SignatureInvalid(
            "no signatures found matching the expected signature for payload".into(),
        ))
    }
}
