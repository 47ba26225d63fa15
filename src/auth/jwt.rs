use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{AccessClaims, TokenKind, VerificationClaims};
use crate::{config::JwtConfig, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed or signature invalid")]
    Malformed,
}

/// Upper bound for configured lifetimes; larger values are clamped.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 100;

fn ttl_from_minutes(minutes: i64) -> Duration {
    Duration::from_secs(minutes.clamp(0, MAX_TTL_MINUTES) as u64 * 60)
}

/// Signing and verification keys derived from the single process-wide secret.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub verification_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: ttl_from_minutes(cfg.ttl_minutes),
            verification_ttl: ttl_from_minutes(cfg.verification_ttl_minutes),
        }
    }

    fn window(&self, ttl: Duration) -> (usize, usize) {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
    }

    fn sign<C: Serialize>(&self, claims: &C) -> anyhow::Result<String> {
        Ok(encode(&Header::default(), claims, &self.encoding)?)
    }

    fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, TokenError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        decode::<C>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    pub fn sign_access(&self, email: &str) -> anyhow::Result<String> {
        let (iat, exp) = self.window(self.access_ttl);
        let token = self.sign(&AccessClaims {
            email: email.to_string(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Access,
        })?;
        debug!(%email, "access token signed");
        Ok(token)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }

    pub fn sign_verification(&self, email: &str) -> anyhow::Result<String> {
        let (iat, exp) = self.window(self.verification_ttl);
        let token = self.sign(&VerificationClaims {
            email: email.to_string(),
            verified: true,
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::EmailVerification,
        })?;
        debug!(%email, "verification token signed");
        Ok(token)
    }

    pub fn verify_verification(&self, token: &str) -> Result<VerificationClaims, TokenError> {
        let claims: VerificationClaims = self.verify(token)?;
        if claims.kind != TokenKind::EmailVerification {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }
}

/// 256 random bits, hex encoded. Checked by equality against the session, never signed.
pub fn issue_state_nonce() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 60 * 24 * 7,
            verification_ttl_minutes: 60 * 24,
        })
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let token = keys.sign_access("a@example.com").expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
    }

    #[test]
    fn verification_token_carries_flag_and_one_day_expiry() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.sign_verification("a@example.com").expect("sign");
        let claims = keys.verify_verification(&token).expect("verify");
        assert_eq!(claims.email, "a@example.com");
        assert!(claims.verified);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let access = keys.sign_access("a@example.com").unwrap();
        let verification = keys.sign_verification("a@example.com").unwrap();
        assert_eq!(keys.verify_verification(&access).unwrap_err(), TokenError::Malformed);
        assert_eq!(keys.verify_access(&verification).unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let stale = keys
            .sign(&AccessClaims {
                email: "a@example.com".into(),
                iat: now - 8 * 24 * 3600,
                exp: now - 24 * 3600,
                iss: "iss".into(),
                aud: "aud".into(),
                kind: TokenKind::Access,
            })
            .unwrap();
        assert_eq!(keys.verify_access(&stale).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn verify_rejects_other_secret_and_garbage() {
        let good = make_keys("secret-a", "iss", "aud");
        let bad = make_keys("secret-b", "iss", "aud");
        let token = good.sign_access("a@example.com").unwrap();
        assert_eq!(bad.verify_access(&token).unwrap_err(), TokenError::Malformed);
        assert_eq!(good.verify_access("not.a.jwt").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let other = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.sign_access("a@example.com").unwrap();
        assert!(other.verify_access(&token).is_err());
    }

    #[test]
    fn oversized_and_negative_lifetimes_are_clamped() {
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: i64::MAX,
            verification_ttl_minutes: -5,
        });
        assert_eq!(keys.access_ttl, Duration::from_secs(MAX_TTL_MINUTES as u64 * 60));
        assert_eq!(keys.verification_ttl, Duration::ZERO);

        let token = keys.sign_access("a@example.com").unwrap();
        assert_eq!(keys.verify_access(&token).unwrap().email, "a@example.com");
    }

    #[test]
    fn state_nonce_is_256_bit_hex() {
        let a = issue_state_nonce();
        let b = issue_state_nonce();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
