use crate::error::AppError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Generate the HMAC-SHA256 signature of a presigned blob URL.
///
/// Format: HMAC-SHA256(key|expires, secret), hex encoded.
pub fn generate_blob_signature(
    key: &str,
    expires: i64,
    secret: &str,
) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    let payload = format!("{}|{}", key, expires);
    mac.update(payload.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a presigned blob signature using constant-time comparison.
pub fn verify_blob_signature(
    key: &str,
    expires: i64,
    secret: &str,
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected_signature = generate_blob_signature(key, expires, secret)?;

    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

/// Validate a presigned blob request at time `now` (unix seconds).
pub fn validate_blob_signature(
    key: &str,
    signature: &str,
    expires: i64,
    now: i64,
    secret: &str,
) -> Result<(), AppError> {
    if expires < now {
        return Err(AppError::Forbidden(anyhow::anyhow!("Presigned URL expired")));
    }

    let valid = verify_blob_signature(key, expires, secret, signature)
        .map_err(AppError::InternalError)?;

    if !valid {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Invalid presigned URL signature"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "my_secret_key";
    const KEY: &str = "0b9a6c1e/4f2d.bin";

    #[test]
    fn test_signature_generation_and_verification() {
        let expires = 1678886400;
        let signature = generate_blob_signature(KEY, expires, SECRET).unwrap();
        assert_eq!(signature.len(), 64);

        assert!(verify_blob_signature(KEY, expires, SECRET, &signature).unwrap());
    }

    #[test]
    fn test_invalid_signature() {
        let expires = 1678886400;
        let signature = generate_blob_signature(KEY, expires, SECRET).unwrap();
        let first = if signature.starts_with('a') { "b" } else { "a" };
        let invalid_signature = format!("{}{}", first, &signature[1..]);

        assert!(!verify_blob_signature(KEY, expires, SECRET, &invalid_signature).unwrap());
    }

    #[test]
    fn test_tampered_expiry() {
        let signature = generate_blob_signature(KEY, 1000, SECRET).unwrap();
        assert!(!verify_blob_signature(KEY, 2000, SECRET, &signature).unwrap());
    }

    #[test]
    fn test_validate_rejects_expired_url() {
        let signature = generate_blob_signature(KEY, 1000, SECRET).unwrap();
        let result = validate_blob_signature(KEY, &signature, 1000, 1001, SECRET);
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_validate_accepts_fresh_url() {
        let signature = generate_blob_signature(KEY, 1000, SECRET).unwrap();
        assert!(validate_blob_signature(KEY, &signature, 1000, 999, SECRET).is_ok());
    }
}
