use anyhow::Context;
use axum::extract::FromRef;
use tracing::{debug, info, warn};

use crate::{
    auth::{
        google::ProviderError, jwt::JwtKeys, mailer::verification_mail,
        password::unusable_password,
    },
    error::{operation_failed, ApiError},
    state::AppState,
    users::services::{create_account, signin, NewAccount, SignedIn},
};

/// Signs a one-day verification token and mails the link built from it.
pub async fn send_verification_email(state: &AppState, email: &str) -> anyhow::Result<()> {
    let token = JwtKeys::from_ref(state)
        .sign_verification(email)
        .context("sign verification token")?;
    let link = format!("{}{}", state.config.verification_link, token);
    let (subject, html) = verification_mail(&link);
    state
        .mailer
        .send(email, subject, &html)
        .await
        .context("deliver verification mail")?;
    info!(%email, "verification email sent");
    Ok(())
}

/// Fire-and-forget variant used after signup; failures are only logged.
pub fn spawn_verification_email(state: AppState, email: String) {
    tokio::spawn(async move {
        if let Err(e) = send_verification_email(&state, &email).await {
            warn!(error = %e, %email, "verification email failed");
        }
    });
}

/// Flips `is_email_verified` for the token's email. Verifying twice is a no-op success.
pub async fn verify_email(state: &AppState, token: &str) -> Result<(), ApiError> {
    if token.is_empty() {
        return Err(ApiError::TokenNotExist);
    }
    let claims = JwtKeys::from_ref(state)
        .verify_verification(token)
        .map_err(|e| {
            warn!(error = %e, "verification token rejected");
            ApiError::TokenExpired
        })?;
    if !claims.verified {
        return Err(ApiError::TokenExpired);
    }

    let Some(user) = state
        .users
        .find_by_email(&claims.email)
        .await
        .map_err(operation_failed)?
    else {
        warn!(email = %claims.email, "verification token for unknown account");
        return Ok(());
    };
    if user.is_email_verified {
        debug!(user_id = %user.id, "email already verified");
        return Ok(());
    }
    state
        .users
        .mark_email_verified(user.id)
        .await
        .map_err(operation_failed)?;
    info!(user_id = %user.id, email = %user.email, "email verified");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent,
    /// Nothing was sent: the address is unknown (`None`) or already verified.
    AlreadyVerified(Option<bool>),
}

pub async fn resend_verification(state: &AppState, email: &str) -> Result<ResendOutcome, ApiError> {
    if email.is_empty() {
        return Err(ApiError::EmailNotFound);
    }
    let user = state
        .users
        .find_by_email(email)
        .await
        .map_err(operation_failed)?;
    match user {
        Some(u) if !u.is_email_verified => {}
        other => return Ok(ResendOutcome::AlreadyVerified(other.map(|u| u.is_email_verified))),
    }
    send_verification_email(state, email)
        .await
        .map_err(operation_failed)?;
    Ok(ResendOutcome::Sent)
}

/// Completes the authorization-code flow. The state check happens before any
/// call to the provider.
pub async fn google_sign_in(
    state: &AppState,
    session_id: Option<&str>,
    code: &str,
    state_param: &str,
) -> Result<SignedIn, ApiError> {
    if code.is_empty() {
        return Err(ApiError::TokenNotExist);
    }
    if !state.sessions.state_matches(session_id, state_param) {
        warn!(has_session = session_id.is_some(), "oauth state mismatch");
        return Err(ApiError::TokenInvalid);
    }

    let provider_failed = |e: ProviderError| {
        warn!(error = %e, "google api call failed");
        ApiError::GoogleApi
    };
    let tokens = state
        .oauth
        .exchange_code(code)
        .await
        .map_err(provider_failed)?;
    let profile = state
        .oauth
        .fetch_profile(&tokens.access_token)
        .await
        .map_err(provider_failed)?;
    let email = state
        .oauth
        .token_email(&tokens.access_token)
        .await
        .map_err(provider_failed)?
        .ok_or(ApiError::EmailNotFound)?;

    let existing = state
        .users
        .find_by_email(&email)
        .await
        .map_err(operation_failed)?;
    if existing.is_none() {
        let created = create_account(
            state,
            NewAccount {
                email: email.clone(),
                password: unusable_password(),
                first_name: profile.given_name,
                last_name: profile.family_name,
                is_google_registered: true,
                is_email_verified: true,
            },
        )
        .await;
        match created {
            Ok(_) | Err(ApiError::UserAlreadyExists) => {}
            Err(e) => return Err(e),
        }
    }

    signin(state, &email, "").await
}
