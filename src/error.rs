use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

/// Business failures. Every variant is delivered inside an HTTP 200 envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Source error: CORS policy has blocked the requested resource.")]
    Cors,
    #[error("A valid authentication token is required to access this resource.")]
    TokenNotExist,
    #[error("The authentication token has expired.")]
    TokenExpired,
    #[error("The authentication token or url is invalid. Please check the token or url and try again.")]
    TokenInvalid,
    #[error("An error occurred while interacting with the Google API. Please try again later.")]
    GoogleApi,
    #[error("The email address does not exist.")]
    EmailNotFound,
    #[error("The provided email address is either unregistered or awaiting verification. Please check your registration or verification status.")]
    EmailNotVerified,
    #[error("No further action is required. The email address is already verified.")]
    EmailAlreadyVerified,
    #[error("User not found.")]
    UserNotFound,
    #[error("To continue, please provide your username and password.")]
    EmailOrPasswordRequired,
    #[error("The user already exists.")]
    UserAlreadyExists,
    #[error("The email or password is incorrect.")]
    InvalidCredentials,
    #[error("The email address format is invalid.")]
    InvalidEmailFormat,
    #[error("Password must be at least 8 characters long and contain at least one digit, one special character, one lowercase letter, and one uppercase letter.")]
    WeakPassword,
    #[error("The new password cannot be the same as the old password.")]
    TwoPasswordSame,
    #[error("The old password is incorrect.")]
    OldPasswordIncorrect,
    #[error("There is nothing to change.")]
    NothingToChange,
    #[error("You are Google users, you cannot change your password.")]
    GoogleUserCannotChangePassword,
    #[error("Oops! Something went wrong. Please try again later.")]
    OperationFailed,
}

impl ApiError {
    pub fn status(&self) -> i32 {
        match self {
            ApiError::Cors => 400,
            ApiError::TokenNotExist | ApiError::TokenExpired => 401,
            ApiError::TokenInvalid => 402,
            ApiError::GoogleApi => 403,
            ApiError::EmailNotFound => 404,
            ApiError::EmailNotVerified => 405,
            ApiError::EmailAlreadyVerified => 406,
            ApiError::UserNotFound => 301,
            ApiError::EmailOrPasswordRequired => 302,
            ApiError::UserAlreadyExists => 303,
            ApiError::InvalidCredentials => 304,
            ApiError::InvalidEmailFormat => 305,
            ApiError::WeakPassword => 306,
            ApiError::TwoPasswordSame => 404,
            ApiError::OldPasswordIncorrect => 405,
            ApiError::NothingToChange => 406,
            ApiError::GoogleUserCannotChangePassword => 407,
            ApiError::OperationFailed => 500,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Envelope::<()>::failure(self, None).into_response()
    }
}

/// Status-0 outcomes and their messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Success {
    EmailResend,
    EmailVerified,
    Signin,
    Signout,
    Signup,
    ModifyPassword,
    ProfileUpdate,
    Operation,
}

impl Success {
    pub fn message(&self) -> &'static str {
        match self {
            Success::EmailResend => "Verification email sent successfully.",
            Success::EmailVerified => "Thank you! Your email has been verified successfully.",
            Success::Signin => "Welcome! You have successfully logged in.",
            Success::Signout => "User logged out successfully.",
            Success::Signup => "Congratulations! You have successfully registered.",
            Success::ModifyPassword => "Great! Your password has been updated successfully.",
            Success::ProfileUpdate => "Great! Your profile has been updated successfully.",
            Success::Operation => "Great! Your operation was successfully completed.",
        }
    }
}

/// `{status, message, data}` body shared by every business response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(kind: Success, data: Option<T>) -> Self {
        Self {
            status: 0,
            message: kind.message().to_string(),
            data,
        }
    }

    pub fn failure(err: ApiError, data: Option<T>) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Envelope shape as published in the OpenAPI document.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnvelopeSchema {
    /// 0 for success, an application error code otherwise.
    pub status: i32,
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
}

/// Transport-level authentication failures: HTTP 401 with a bare `{message}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthRejection {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": self.to_string() })),
        )
            .into_response()
    }
}

/// Logs an unexpected failure and collapses it into `OperationFailed`.
pub fn operation_failed<E: std::fmt::Display>(e: E) -> ApiError {
    tracing::error!(error = %e, "operation failed");
    ApiError::OperationFailed
}

/// Unwraps a JSON body, turning a missing content type or a malformed body
/// into `fallback` so the caller still gets an envelope.
pub fn body_or<T>(payload: Result<Json<T>, JsonRejection>, fallback: ApiError) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::warn!(error = %rejection, "request body rejected");
        fallback
    })
}
