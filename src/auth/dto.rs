use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /auth/google-auth`: what the provider echoed back to the redirect URL.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GoogleAuthRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UrlPayload {
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedFlag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_email_verified: Option<bool>,
}
