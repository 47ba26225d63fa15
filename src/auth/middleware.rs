//! Per-request gate: classify the route, check the bearer token, load the
//! user and enforce email verification before any handler runs.
//!
//! The order matters. Public paths are exempt before the header is looked at,
//! and the header and signature are checked before the store is touched.

use axum::{
    extract::{FromRef, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use super::jwt::{JwtKeys, TokenError};
use crate::{
    error::{ApiError, AuthRejection},
    state::AppState,
    store::User,
};

const PUBLIC_PATHS: [&str; 6] = [
    "/users/logout",
    "/users/signup",
    "/users/signin",
    "/auth/google-auth",
    "/auth/get-google-auth-url",
    "/auth/verify-email",
];

const API_DOCS_PREFIX: &str = "/api-doc";

const VERIFIED_ONLY_PATHS: [&str; 2] = ["/dashboard/users", "/dashboard/statistics"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Authenticated,
    /// Authenticated, and the email must be verified.
    VerifiedOnly,
}

impl RouteAccess {
    pub fn classify(path: &str) -> Self {
        if path.starts_with(API_DOCS_PREFIX) || PUBLIC_PATHS.contains(&path) {
            RouteAccess::Public
        } else if VERIFIED_ONLY_PATHS.contains(&path) {
            RouteAccess::VerifiedOnly
        } else {
            RouteAccess::Authenticated
        }
    }
}

/// Identity attached to the request once admitted.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[derive(Debug)]
pub enum Admission {
    Anonymous,
    Admitted(User),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Rejection {
    /// HTTP 401 with a bare message.
    Auth(AuthRejection),
    /// HTTP 200 envelope.
    Business(ApiError),
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Rejection::Auth(r) => r.into_response(),
            Rejection::Business(e) => e.into_response(),
        }
    }
}

/// Extracts `<token>` from `Bearer <token>`.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthRejection> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthRejection::Unauthorized)
}

pub async fn admit(
    state: &AppState,
    path: &str,
    authorization: Option<&str>,
) -> Result<Admission, Rejection> {
    let access = RouteAccess::classify(path);
    if access == RouteAccess::Public {
        return Ok(Admission::Anonymous);
    }

    let token = bearer_token(authorization).map_err(Rejection::Auth)?;

    let claims = JwtKeys::from_ref(state)
        .verify_access(token)
        .map_err(|e| {
            warn!(%path, error = %e, "bearer token rejected");
            Rejection::Auth(match e {
                TokenError::Expired => AuthRejection::TokenExpired,
                TokenError::Malformed => AuthRejection::InvalidToken,
            })
        })?;

    let user = match state.users.find_by_email(&claims.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %claims.email, "token for unknown user");
            return Err(Rejection::Business(ApiError::UserNotFound));
        }
        Err(e) => {
            error!(error = %e, "user lookup failed during authorization");
            return Err(Rejection::Auth(AuthRejection::Unauthorized));
        }
    };

    if access == RouteAccess::VerifiedOnly && !user.is_email_verified {
        debug!(user_id = %user.id, %path, "email not verified");
        return Err(Rejection::Business(ApiError::EmailNotVerified));
    }

    Ok(Admission::Admitted(user))
}

pub async fn authorize(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match admit(&state, &path, authorization.as_deref()).await {
        Ok(Admission::Anonymous) => next.run(req).await,
        Ok(Admission::Admitted(user)) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::{
        auth::password::hash_password,
        store::{MemoryStore, NewUser, StoreError, UserStore},
    };

    /// Counts every call that reaches the credential store.
    struct CountingStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl UserStore for CountingStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.hit();
            self.inner.find_by_email(email).await
        }
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.hit();
            self.inner.find_by_id(id).await
        }
        async fn create(&self, user: NewUser) -> Result<User, StoreError> {
            self.hit();
            self.inner.create(user).await
        }
        async fn update_name(&self, id: Uuid, f: &str, l: &str) -> Result<Option<User>, StoreError> {
            self.hit();
            self.inner.update_name(id, f, l).await
        }
        async fn update_password(&self, id: Uuid, h: &str) -> Result<(), StoreError> {
            self.hit();
            self.inner.update_password(id, h).await
        }
        async fn mark_email_verified(&self, id: Uuid) -> Result<(), StoreError> {
            self.hit();
            self.inner.mark_email_verified(id).await
        }
        async fn touch_session(&self, id: Uuid, at: OffsetDateTime, c: bool) -> Result<(), StoreError> {
            self.hit();
            self.inner.touch_session(id, at, c).await
        }
        async fn list(&self) -> Result<Vec<User>, StoreError> {
            self.hit();
            self.inner.list().await
        }
        async fn count(&self) -> Result<i64, StoreError> {
            self.hit();
            self.inner.count().await
        }
    }

    fn counting_state() -> (AppState, Arc<CountingStore>) {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
        });
        let mut state = AppState::fake();
        state.users = store.clone();
        (state, store)
    }

    async fn seed(state: &AppState, email: &str, verified: bool) -> String {
        state
            .users
            .create(NewUser {
                email: email.into(),
                password_hash: hash_password("Abc12345!").unwrap(),
                first_name: "A".into(),
                last_name: "B".into(),
                is_google_registered: false,
                is_email_verified: verified,
            })
            .await
            .unwrap();
        JwtKeys::from_ref(state).sign_access(email).unwrap()
    }

    #[test]
    fn classifies_routes() {
        for p in PUBLIC_PATHS {
            assert_eq!(RouteAccess::classify(p), RouteAccess::Public);
        }
        assert_eq!(RouteAccess::classify("/api-docs/openapi.json"), RouteAccess::Public);
        assert_eq!(RouteAccess::classify("/dashboard/users"), RouteAccess::VerifiedOnly);
        assert_eq!(RouteAccess::classify("/users/modify-profile"), RouteAccess::Authenticated);
        assert_eq!(RouteAccess::classify("/auth/resend-email"), RouteAccess::Authenticated);
        // Exact match only.
        assert_eq!(RouteAccess::classify("/users/signin/"), RouteAccess::Authenticated);
    }

    #[test]
    fn bearer_header_forms() {
        assert_eq!(bearer_token(Some("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(None), Err(AuthRejection::Unauthorized));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AuthRejection::Unauthorized));
        assert_eq!(bearer_token(Some("Bearer ")), Err(AuthRejection::Unauthorized));
        assert_eq!(bearer_token(Some("bearer abc")), Err(AuthRejection::Unauthorized));
    }

    #[tokio::test]
    async fn public_paths_need_no_header() {
        let (state, store) = counting_state();
        for p in PUBLIC_PATHS {
            assert!(matches!(admit(&state, p, None).await, Ok(Admission::Anonymous)));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bad_tokens_are_401_and_never_touch_the_store() {
        let (state, store) = counting_state();
        let foreign = JwtKeys::from_config(&crate::config::JwtConfig {
            secret: "other".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 10,
            verification_ttl_minutes: 10,
        })
        .sign_access("a@example.com")
        .unwrap();
        let verification = JwtKeys::from_ref(&state).sign_verification("a@example.com").unwrap();
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let expired = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &crate::auth::claims::AccessClaims {
                email: "a@example.com".into(),
                iat: now - 3 * 3600,
                exp: now - 3600,
                iss: "test-issuer".into(),
                aud: "test-aud".into(),
                kind: crate::auth::claims::TokenKind::Access,
            },
            &jsonwebtoken::EncodingKey::from_secret(b"test"),
        )
        .unwrap();

        let cases = [
            (None, AuthRejection::Unauthorized),
            (Some("Token abc".to_string()), AuthRejection::Unauthorized),
            (Some("Bearer garbage".to_string()), AuthRejection::InvalidToken),
            (Some(format!("Bearer {foreign}")), AuthRejection::InvalidToken),
            (Some(format!("Bearer {verification}")), AuthRejection::InvalidToken),
            (Some(format!("Bearer {expired}")), AuthRejection::TokenExpired),
        ];
        for (header, expected) in cases {
            let got = admit(&state, "/users/modify-profile", header.as_deref()).await;
            assert_eq!(got.unwrap_err(), Rejection::Auth(expected));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_user_is_an_envelope_error() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access("ghost@example.com").unwrap();
        let header = format!("Bearer {token}");
        let got = admit(&state, "/users/modify-profile", Some(&header)).await;
        assert_eq!(got.unwrap_err(), Rejection::Business(ApiError::UserNotFound));
    }

    #[tokio::test]
    async fn unverified_user_is_gated_on_dashboard_only() {
        let state = AppState::fake();
        let token = seed(&state, "u@example.com", false).await;
        let header = format!("Bearer {token}");

        for p in VERIFIED_ONLY_PATHS {
            let got = admit(&state, p, Some(&header)).await;
            assert_eq!(got.unwrap_err(), Rejection::Business(ApiError::EmailNotVerified));
        }
        let got = admit(&state, "/users/modify-profile", Some(&header)).await;
        assert!(matches!(got, Ok(Admission::Admitted(u)) if u.email == "u@example.com"));
    }

    #[tokio::test]
    async fn verified_user_reaches_dashboard() {
        let state = AppState::fake();
        let token = seed(&state, "v@example.com", true).await;
        let header = format!("Bearer {token}");
        let got = admit(&state, "/dashboard/statistics", Some(&header)).await;
        assert!(matches!(got, Ok(Admission::Admitted(_))));
    }
}
