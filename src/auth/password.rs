use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use tracing::error;

const SPECIAL_CHARS: &str = "!@#$%^&*";

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// At least 8 characters with a digit, a special character, a lowercase and an uppercase letter.
pub fn is_strong_password(plain: &str) -> bool {
    plain.chars().count() >= 8
        && plain.chars().any(|c| c.is_ascii_digit())
        && plain.chars().any(|c| SPECIAL_CHARS.contains(c))
        && plain.chars().any(|c| c.is_lowercase())
        && plain.chars().any(|c| c.is_uppercase())
}

/// Placeholder secret for accounts that only ever sign in through Google.
pub fn unusable_password() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn password_complexity_rule() {
        assert!(is_strong_password("Abc12345!"));
        assert!(!is_strong_password("Ab1!"));
        assert!(!is_strong_password("abc12345!"));
        assert!(!is_strong_password("ABC12345!"));
        assert!(!is_strong_password("Abcdefgh!"));
        assert!(!is_strong_password("Abc123456"));
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("foo@bar.com"));
        assert!(!is_valid_email("foo@bar"));
        assert!(!is_valid_email("foo bar@baz.com"));
        assert!(!is_valid_email("@bar.com"));
    }

    #[test]
    fn unusable_passwords_are_random() {
        assert_eq!(unusable_password().len(), 40);
        assert_ne!(unusable_password(), unusable_password());
    }
}
