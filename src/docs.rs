use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    auth::{self, dto as auth_dto},
    dashboard,
    error::EnvelopeSchema,
    state::AppState,
    users::{self, dto as users_dto},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        users::handlers::signup,
        users::handlers::signin,
        users::handlers::logout,
        users::handlers::modify_profile,
        users::handlers::modify_password,
        auth::handlers::get_google_auth_url,
        auth::handlers::google_auth,
        auth::handlers::resend_email,
        auth::handlers::verify_email,
        dashboard::handlers::list_users,
        dashboard::handlers::statistics,
    ),
    components(schemas(
        EnvelopeSchema,
        users_dto::CredentialsRequest,
        users_dto::ModifyProfileRequest,
        users_dto::ModifyPasswordRequest,
        users_dto::PublicUser,
        users_dto::AuthPayload,
        auth_dto::GoogleAuthRequest,
        auth_dto::EmailRequest,
        auth_dto::TokenRequest,
        auth_dto::UrlPayload,
        auth_dto::VerifiedFlag,
        dashboard::services::Statistics,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "users", description = "Accounts and profiles"),
        (name = "auth", description = "Google sign-in and email verification"),
        (name = "dashboard", description = "Verified-only reporting"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Served under the documentation prefix, which the authorization pipeline leaves open.
pub fn docs_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
