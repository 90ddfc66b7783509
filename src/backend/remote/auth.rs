//! HMAC-signed internal tokens for the remote terminal API.
//!
//! Format: `"{timestamp_ms}.{hex(hmac_sha256(secret, timestamp_ms))}"`.

use crate::backend::BackendError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the token
pub const TOKEN_HEADER: &str = "X-Internal-Token";

fn mac_for(secret: &str) -> Result<HmacSha256, BackendError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BackendError::Http(format!("invalid auth secret: {}", e)))
}

pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Sign `timestamp_ms` with `secret`
pub fn generate_token(secret: &str, timestamp_ms: u64) -> Result<String, BackendError> {
    let timestamp = timestamp_ms.to_string();
    let mut mac = mac_for(secret)?;
    mac.update(timestamp.as_bytes());
    Ok(format!(
        "{}.{}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check signature and age of a token
pub fn verify_token(token: &str, secret: &str, now_ms: u64, max_age_ms: u64) -> bool {
    let Some((timestamp, signature)) = token.split_once('.') else {
        return false;
    };
    let Ok(issued) = timestamp.parse::<u64>() else {
        return false;
    };
    if now_ms.saturating_sub(issued) > max_age_ms {
        return false;
    }
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = mac_for(secret) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.verify_slice(&signature).is_ok()
}
