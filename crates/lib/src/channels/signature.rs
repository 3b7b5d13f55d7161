//! X-Line-Signature: base64(HMAC-SHA256(channel secret, raw body)).

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature on webhook POSTs.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

fn mac_for(secret: &str, body: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    mac
}

/// Sign a body the way the platform does and return the base64 signature.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let tag = mac_for(secret, body).finalize().into_bytes();
    base64::engine::general_purpose::STANDARD.encode(tag)
}

/// True only when `signature` is the valid signature of `body`. Missing or malformed signatures are invalid.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    // verify_slice compares in constant time
    mac_for(secret, body).verify_slice(&decoded).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "channel-secret";
    const BODY: &[u8] = br#"{"destination":"U0","events":[]}"#;

    #[test]
    fn sign_and_verify() {
        let sig = sign_body(SECRET, BODY);
        assert!(verify_signature(SECRET, BODY, Some(&sig)));
        assert!(verify_signature(SECRET, BODY, Some(&sig)));
        assert!(!verify_signature("wrong-secret", BODY, Some(&sig)));
    }

    #[test]
    fn known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let sig = sign_body("key", b"The quick brown fox jumps over the lazy dog");
        assert_eq!(sig, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }

    #[test]
    fn any_body_byte_mutation_fails() {
        let sig = sign_body(SECRET, BODY);
        for i in 0..BODY.len() {
            let mut body = BODY.to_vec();
            body[i] ^= 0x01;
            assert!(!verify_signature(SECRET, &body, Some(&sig)), "byte {}", i);
        }
    }

    #[test]
    fn any_signature_byte_mutation_fails() {
        let sig = sign_body(SECRET, BODY);
        let raw = base64::engine::general_purpose::STANDARD.decode(&sig).unwrap();
        for i in 0..raw.len() {
            let mut bad = raw.clone();
            bad[i] ^= 0x80;
            let bad = base64::engine::general_purpose::STANDARD.encode(bad);
            assert!(!verify_signature(SECRET, BODY, Some(&bad)), "byte {}", i);
        }
    }

    #[test]
    fn missing_or_malformed_signature_fails_closed() {
        assert!(!verify_signature(SECRET, BODY, None));
        assert!(!verify_signature(SECRET, BODY, Some("")));
        assert!(!verify_signature(SECRET, BODY, Some("not base64!!")));
        assert!(!verify_signature(SECRET, BODY, Some("AAAA")));
    }
}
