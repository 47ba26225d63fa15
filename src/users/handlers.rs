use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::instrument;

use super::{
    dto::{AuthPayload, CredentialsRequest, ModifyPasswordRequest, ModifyProfileRequest, PublicUser},
    services,
};
use crate::{
    auth::middleware::CurrentUser,
    error::{body_or, ApiError, Envelope, EnvelopeSchema, Success},
    state::AppState,
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/signin", post(signin))
        .route("/users/logout", get(logout))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/users/modify-profile", put(modify_profile))
        .route("/users/modify-password", put(modify_password))
}

/// The pipeline attaches the identity on every non-public path; a missing
/// one means the handler was reached some other way.
fn require_user(user: Option<Extension<CurrentUser>>) -> Result<CurrentUser, ApiError> {
    user.map(|Extension(u)| u).ok_or(ApiError::UserNotFound)
}

#[utoipa::path(
    post,
    path = "/users/signup",
    tag = "users",
    request_body = CredentialsRequest,
    responses((status = 200, description = "Token and user, or an error envelope", body = EnvelopeSchema))
)]
#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Envelope<AuthPayload>, ApiError> {
    let payload = body_or(payload, ApiError::EmailOrPasswordRequired)?;
    let signed = services::signup(&state, &payload.email, &payload.password).await?;
    Ok(Envelope::success(
        Success::Signup,
        Some(AuthPayload::new(signed.token, signed.user)),
    ))
}

#[utoipa::path(
    post,
    path = "/users/signin",
    tag = "users",
    request_body = CredentialsRequest,
    responses((status = 200, description = "Token and user, or an error envelope", body = EnvelopeSchema))
)]
#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Envelope<AuthPayload>, ApiError> {
    let payload = body_or(payload, ApiError::EmailOrPasswordRequired)?;
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::EmailOrPasswordRequired);
    }
    let signed = services::signin(&state, &payload.email, &payload.password).await?;
    Ok(Envelope::success(
        Success::Signin,
        Some(AuthPayload::new(signed.token, signed.user)),
    ))
}

/// Clears the `token` cookie. Bearer tokens stay valid until they expire.
#[utoipa::path(
    get,
    path = "/users/logout",
    tag = "users",
    responses((status = 200, body = EnvelopeSchema))
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, Envelope<()>) {
    (
        jar.remove(Cookie::from("token")),
        Envelope::success(Success::Signout, None),
    )
}

#[utoipa::path(
    put,
    path = "/users/modify-profile",
    tag = "users",
    request_body = ModifyProfileRequest,
    security(("bearer" = [])),
    responses((status = 200, body = EnvelopeSchema))
)]
#[instrument(skip(state, user, payload))]
pub async fn modify_profile(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    payload: Result<Json<ModifyProfileRequest>, JsonRejection>,
) -> Result<Envelope<PublicUser>, ApiError> {
    let CurrentUser(user) = require_user(user)?;
    let payload = body_or(payload, ApiError::EmailOrPasswordRequired)?;
    let updated =
        services::change_profile(&state, &user, &payload.first_name, &payload.last_name).await?;
    Ok(Envelope::success(Success::ProfileUpdate, Some(updated)))
}

#[utoipa::path(
    put,
    path = "/users/modify-password",
    tag = "users",
    request_body = ModifyPasswordRequest,
    security(("bearer" = [])),
    responses((status = 200, body = EnvelopeSchema))
)]
#[instrument(skip(state, user, payload))]
pub async fn modify_password(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    payload: Result<Json<ModifyPasswordRequest>, JsonRejection>,
) -> Result<Envelope<()>, ApiError> {
    let CurrentUser(user) = require_user(user)?;
    let payload = body_or(payload, ApiError::EmailOrPasswordRequired)?;
    services::change_password(&state, &user, &payload.old_password, &payload.new_password).await?;
    Ok(Envelope::success(Success::ModifyPassword, None))
}
