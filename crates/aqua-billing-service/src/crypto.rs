//! Cryptographic utilities for webhook verification.
//!
//! Midtrans signs payment notifications with
//! `sha512(order_id + status_code + gross_amount + server_key)`, hex-encoded.
//! `gross_amount` is concatenated exactly as it appears on the wire (for
//! example `"105000.00"`), so callers must pass the raw string, never a
//! re-formatted number.

use sha2::{Digest, Sha512};

/// Compute SHA-512 and return the hex-encoded result (128 characters).
#[must_use]
pub fn sha512_hex(message: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(message.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compute the Midtrans notification signature for the given fields.
///
/// # Arguments
///
/// * `order_id` - The gateway order id (our encoded payment reference)
/// * `status_code` - The gateway status code, as received
/// * `gross_amount` - The gross amount string, exactly as received
/// * `server_key` - The merchant server key
#[must_use]
pub fn midtrans_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    sha512_hex(&format!("{order_id}{status_code}{gross_amount}{server_key}"))
}

/// Constant-time string comparison to prevent timing attacks.
///
/// This function compares two strings in constant time to prevent timing
/// side-channel attacks when verifying cryptographic signatures.
///
/// # Arguments
///
/// * `a` - First string to compare
/// * `b` - Second string to compare
///
/// # Returns
///
/// `true` if the strings are equal, `false` otherwise.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha512_matches_known_vector() {
        // NIST vector for "abc".
        assert_eq!(
            sha512_hex("abc"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn sha512_produces_correct_length() {
        let result = sha512_hex("message");
        assert_eq!(result.len(), 128); // SHA512 = 64 bytes = 128 hex chars
    }

    #[test]
    fn midtrans_signature_matches_gateway_example() {
        // Computed from the documented formula with a sandbox server key.
        let signature = midtrans_signature(
            "BILLING-7d5e2ab0-6c3f-4b4e-9d8a-1f2e3c4d5e6f",
            "200",
            "105000.00",
            "SB-Mid-server-GwUP_WGbJPXsDzsNEBRs8IYA",
        );
        assert_eq!(
            signature,
            "1938e226d2dfe4fdc3d5f28795b5c3d5f950363ec92b398751f0eb723cf0040c\
             fd4a7a7dd2f84687a5b3ba91a0ba6428e204f85070eb7d87a9692353537f024c"
        );
    }

    #[test]
    fn midtrans_signature_is_sensitive_to_amount_formatting() {
        let key = "server-key";
        let with_decimals = midtrans_signature("ORDER-1", "200", "105000.00", key);
        let without_decimals = midtrans_signature("ORDER-1", "200", "105000", key);
        assert_ne!(with_decimals, without_decimals);
    }

    #[test]
    fn constant_time_eq_equal_strings() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(constant_time_eq("", ""));
        assert!(constant_time_eq("longer string here", "longer string here"));
    }

    #[test]
    fn constant_time_eq_different_strings() {
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("ab", "abc"));
        assert!(!constant_time_eq("abc", "ABC"));
    }
}
