use serde::{Deserialize, Serialize};

/// Type of JWT: bearer access or email verification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    EmailVerification,
}

/// Bearer token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub email: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Payload of the link mailed to prove control of an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationClaims {
    pub email: String,
    pub verified: bool,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}
