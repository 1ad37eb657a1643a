//! Approval-link tokens.
//!
//! An email-approval link is authorized by the lowercase-hex SHA-256 of
//! `"{request_id}:{manager_email}:{secret}"`. Verification is an exact
//! string comparison; anything that is not byte-for-byte identical is
//! rejected.

use sha2::{Digest, Sha256};

/// Compute the token embedded in an approval link.
pub fn approval_token(request_id: i32, manager_email: &str, secret: &str) -> String {
    let material = format!("{request_id}:{manager_email}:{secret}");
    let digest = Sha256::digest(material.as_bytes());
    encode_hex(digest.as_slice())
}

/// Check a presented token against the expected digest.
pub fn verify_token(request_id: i32, manager_email: &str, secret: &str, presented: &str) -> bool {
    approval_token(request_id, manager_email, secret) == presented
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::{approval_token, verify_token};

    #[test]
    fn token_is_lowercase_hex_sha256() {
        let token = approval_token(42, "manager@example.com", "secret");
        assert_eq!(token.len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn token_is_deterministic() {
        let first = approval_token(42, "manager@example.com", "secret");
        let second = approval_token(42, "manager@example.com", "secret");
        assert_eq!(first, second);
    }

    #[test]
    fn any_component_change_yields_a_different_token() {
        let base = approval_token(42, "manager@example.com", "secret");
        assert_ne!(base, approval_token(43, "manager@example.com", "secret"));
        assert_ne!(base, approval_token(42, "other@example.com", "secret"));
        assert_ne!(base, approval_token(42, "manager@example.com", "other"));
    }

    #[test]
    fn verify_accepts_only_the_exact_token() {
        let token = approval_token(42, "manager@example.com", "secret");
        assert!(verify_token(42, "manager@example.com", "secret", &token));

        let uppercased = token.to_uppercase();
        assert!(!verify_token(
            42,
            "manager@example.com",
            "secret",
            &uppercased
        ));
        assert!(!verify_token(42, "manager@example.com", "secret", ""));
        assert!(!verify_token(
            42,
            "manager@example.com",
            "secret",
            &token[..63]
        ));
    }
}
