use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use axum_extra::extract::CookieJar;
use tracing::{error, info, instrument};

use super::{
    dto::{EmailRequest, GoogleAuthRequest, TokenRequest, UrlPayload, VerifiedFlag},
    jwt::issue_state_nonce,
    services::{self, ResendOutcome},
    session::{ensure_session, session_id},
};
use crate::{
    error::{body_or, ApiError, Envelope, EnvelopeSchema, Success},
    state::AppState,
    users::dto::AuthPayload,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/get-google-auth-url", post(get_google_auth_url))
        .route("/auth/google-auth", post(google_auth))
        .route("/auth/resend-email", post(resend_email))
        .route("/auth/verify-email", post(verify_email))
}

/// Issues a state nonce bound to the caller's session and returns the consent URL.
#[utoipa::path(
    post,
    path = "/auth/get-google-auth-url",
    tag = "auth",
    responses((status = 200, description = "`data.url` is the provider consent page", body = EnvelopeSchema))
)]
#[instrument(skip(state, jar))]
pub async fn get_google_auth_url(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Envelope<UrlPayload>), ApiError> {
    let nonce = issue_state_nonce();
    let url = state.oauth.authorize_url(&nonce).map_err(|e| {
        error!(error = %e, "authorization url unavailable");
        ApiError::OperationFailed
    })?;
    let (jar, sid) = ensure_session(jar);
    state.sessions.bind_state(&sid, &nonce);
    Ok((jar, Envelope::success(Success::Operation, Some(UrlPayload { url }))))
}

#[utoipa::path(
    post,
    path = "/auth/google-auth",
    tag = "auth",
    request_body = GoogleAuthRequest,
    responses((status = 200, description = "Token and user, or an error envelope", body = EnvelopeSchema))
)]
#[instrument(skip(state, jar, payload))]
pub async fn google_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<GoogleAuthRequest>, JsonRejection>,
) -> Result<Envelope<AuthPayload>, ApiError> {
    let payload = body_or(payload, ApiError::OperationFailed)?;
    let sid = session_id(&jar);
    let signed =
        services::google_sign_in(&state, sid.as_deref(), &payload.code, &payload.state).await?;
    info!(email = %signed.user.email, "google sign-in completed");
    Ok(Envelope::success(
        Success::Operation,
        Some(AuthPayload::new(signed.token, signed.user)),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/resend-email",
    tag = "auth",
    request_body = EmailRequest,
    security(("bearer" = [])),
    responses((status = 200, body = EnvelopeSchema))
)]
#[instrument(skip(state, payload))]
pub async fn resend_email(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Envelope<VerifiedFlag>, ApiError> {
    let payload = body_or(payload, ApiError::OperationFailed)?;
    match services::resend_verification(&state, &payload.email).await? {
        ResendOutcome::Sent => Ok(Envelope::success(Success::EmailResend, None)),
        ResendOutcome::AlreadyVerified(flag) => Ok(Envelope::failure(
            ApiError::EmailAlreadyVerified,
            Some(VerifiedFlag {
                is_email_verified: flag,
            }),
        )),
    }
}

#[utoipa::path(
    post,
    path = "/auth/verify-email",
    tag = "auth",
    request_body = TokenRequest,
    responses((status = 200, body = EnvelopeSchema))
)]
#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Envelope<()>, ApiError> {
    let payload = body_or(payload, ApiError::OperationFailed)?;
    services::verify_email(&state, &payload.token).await?;
    Ok(Envelope::success(Success::EmailVerified, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_verified_envelope_shape() {
        let env = Envelope::failure(
            ApiError::EmailAlreadyVerified,
            Some(VerifiedFlag {
                is_email_verified: Some(true),
            }),
        );
        let body = serde_json::to_value(env).unwrap();
        assert_eq!(body["status"], 406);
        assert_eq!(body["data"]["isEmailVerified"], true);

        let unknown = Envelope::failure(
            ApiError::EmailAlreadyVerified,
            Some(VerifiedFlag {
                is_email_verified: None,
            }),
        );
        let body = serde_json::to_value(unknown).unwrap();
        assert!(body["data"].get("isEmailVerified").is_none());
    }
}
