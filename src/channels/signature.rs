//! Webhook authenticity checks.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{error, warn};

type HmacSha256 = Hmac<Sha256>;

const SLACK_VERSION: &str = "v0";
const SECRET_LABEL: &[u8] = b"hookdog-webhook-secret";

/// Slack allows timestamps this far ahead of the local clock.
pub const MAX_FUTURE_SKEW_SECS: i64 = 60;

fn slack_mac(timestamp: &str, request_body: &[u8], signing_secret: &str) -> Option<HmacSha256> {
    let mut mac = match HmacSha256::new_from_slice(signing_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(e) => {
            error!("Failed to create HMAC: {}", e);
            return None;
        }
    };
    mac.update(format!("{SLACK_VERSION}:{timestamp}:").as_bytes());
    mac.update(request_body);
    Some(mac)
}

/// Compute `v0=<hex>` over `v0:{timestamp}:{body}`.
#[must_use]
pub fn compute_slack_signature(timestamp: &str, request_body: &[u8], signing_secret: &str) -> String {
    match slack_mac(timestamp, request_body, signing_secret) {
        Some(mac) => format!("{SLACK_VERSION}={}", hex::encode(mac.finalize().into_bytes())),
        None => String::new(),
    }
}

/// Check a Slack request signature in constant time.
#[must_use]
pub fn verify_slack_signature(
    request_body: &[u8],
    timestamp: &str,
    signature: &str,
    signing_secret: &str,
) -> bool {
    let Some(digest_hex) = signature.strip_prefix("v0=") else {
        warn!("Slack signature missing v0= prefix");
        return false;
    };
    let Ok(supplied) = hex::decode(digest_hex) else {
        warn!("Slack signature is not valid hex");
        return false;
    };
    let Some(mac) = slack_mac(timestamp, request_body, signing_secret) else {
        return false;
    };
    mac.verify_slice(&supplied).is_ok()
}

/// Reject timestamps older than `tolerance_secs` or too far in the future.
/// A tolerance of zero disables the check.
#[must_use]
pub fn timestamp_is_fresh(timestamp: &str, tolerance_secs: i64, now_secs: i64) -> bool {
    if tolerance_secs <= 0 {
        return true;
    }
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if now_secs - ts > tolerance_secs || ts > now_secs + MAX_FUTURE_SKEW_SECS {
        error!("Timestamp out of range, potential replay attack");
        return false;
    }
    true
}

/// Constant-time comparison of a shared secret header against the
/// configured value, done by comparing HMAC tags keyed by each side.
#[must_use]
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let (Ok(mut expected_mac), Ok(mut provided_mac)) = (
        HmacSha256::new_from_slice(expected.as_bytes()),
        HmacSha256::new_from_slice(provided.as_bytes()),
    ) else {
        return false;
    };
    expected_mac.update(SECRET_LABEL);
    provided_mac.update(SECRET_LABEL);
    let expected_tag = expected_mac.finalize().into_bytes();
    provided_mac.verify_slice(&expected_tag).is_ok()
}
