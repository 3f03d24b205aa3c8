//! TC3-HMAC-SHA256 request signing

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Signature algorithm name
pub const ALGORITHM: &str = "TC3-HMAC-SHA256";

/// Content type of every signed request
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

const SIGNED_HEADERS: &str = "content-type;host";

/// Inputs of one signature
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    /// API secret id
    pub secret_id: &'a str,
    /// API secret key
    pub secret_key: &'a str,
    /// Service name (e.g. `cvm`)
    pub service: &'a str,
    /// Request host
    pub host: &'a str,
    /// JSON request body
    pub payload: &'a str,
    /// Request time
    pub timestamp: DateTime<Utc>,
}

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// HMAC-SHA256 of `data` under `key`
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Config(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn canonical_request(req: &SigningRequest<'_>) -> String {
    format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
        CONTENT_TYPE,
        req.host,
        SIGNED_HEADERS,
        sha256_hex(req.payload.as_bytes())
    )
}

fn credential_scope(req: &SigningRequest<'_>) -> String {
    format!(
        "{}/{}/tc3_request",
        req.timestamp.format("%Y-%m-%d"),
        req.service
    )
}

/// The string that gets signed
pub fn string_to_sign(req: &SigningRequest<'_>) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        req.timestamp.timestamp(),
        credential_scope(req),
        sha256_hex(canonical_request(req).as_bytes())
    )
}

/// Hex signature of a request
pub fn signature(req: &SigningRequest<'_>) -> Result<String> {
    let date = req.timestamp.format("%Y-%m-%d").to_string();
    let secret_date = hmac_sha256(format!("TC3{}", req.secret_key).as_bytes(), date.as_bytes())?;
    let secret_service = hmac_sha256(&secret_date, req.service.as_bytes())?;
    let secret_signing = hmac_sha256(&secret_service, b"tc3_request")?;
    Ok(hex::encode(hmac_sha256(
        &secret_signing,
        string_to_sign(req).as_bytes(),
    )?))
}

/// Value of the `Authorization` header
pub fn authorization(req: &SigningRequest<'_>) -> Result<String> {
    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM,
        req.secret_id,
        credential_scope(req),
        SIGNED_HEADERS,
        signature(req)?
    ))
}
