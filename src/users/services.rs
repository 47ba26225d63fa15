use axum::extract::FromRef;
use tracing::{info, warn};

use super::dto::PublicUser;
use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password, is_strong_password, is_valid_email, verify_password},
        policy::role_for,
        services::spawn_verification_email,
    },
    error::{operation_failed, ApiError},
    state::AppState,
    store::{NewUser, StoreError, User},
};

/// A freshly issued access token and the identity it belongs to.
#[derive(Debug)]
pub struct SignedIn {
    pub token: String,
    pub user: PublicUser,
}

/// Account to create; `password` is plain text and hashed here.
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_google_registered: bool,
    pub is_email_verified: bool,
}

/// Validates and stores a new account. The store's unique index is the
/// authority on duplicates; the lookup before it only saves a hash.
pub async fn create_account(state: &AppState, account: NewAccount) -> Result<User, ApiError> {
    if account.email.is_empty() || account.password.is_empty() {
        return Err(ApiError::EmailOrPasswordRequired);
    }
    if !is_valid_email(&account.email) {
        return Err(ApiError::InvalidEmailFormat);
    }
    if !account.is_google_registered && !is_strong_password(&account.password) {
        return Err(ApiError::WeakPassword);
    }
    if state
        .users
        .find_by_email(&account.email)
        .await
        .map_err(operation_failed)?
        .is_some()
    {
        return Err(ApiError::UserAlreadyExists);
    }

    let password_hash = hash_password(&account.password).map_err(operation_failed)?;
    let created = state
        .users
        .create(NewUser {
            email: account.email,
            password_hash,
            first_name: account.first_name,
            last_name: account.last_name,
            is_google_registered: account.is_google_registered,
            is_email_verified: account.is_email_verified,
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, google = user.is_google_registered, "user created");
            Ok(user)
        }
        Err(StoreError::Duplicate) => Err(ApiError::UserAlreadyExists),
        Err(e) => Err(operation_failed(e)),
    }
}

/// Creates the account, mails a verification link in the background and signs the user in.
pub async fn signup(state: &AppState, email: &str, password: &str) -> Result<SignedIn, ApiError> {
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::EmailOrPasswordRequired);
    }
    let user = create_account(
        state,
        NewAccount {
            email: email.to_string(),
            password: password.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_google_registered: false,
            is_email_verified: false,
        },
    )
    .await?;

    spawn_verification_email(state.clone(), user.email.clone());
    signin(state, email, password).await
}

/// Google-registered accounts skip the password comparison.
pub async fn signin(state: &AppState, email: &str, password: &str) -> Result<SignedIn, ApiError> {
    let user = state
        .users
        .find_by_email(email)
        .await
        .map_err(operation_failed)?
        .ok_or_else(|| {
            warn!(%email, "signin unknown email");
            ApiError::UserNotFound
        })?;

    if !user.is_google_registered {
        let ok = verify_password(password, &user.password_hash).map_err(operation_failed)?;
        if !ok {
            warn!(%email, user_id = %user.id, "signin invalid password");
            return Err(ApiError::InvalidCredentials);
        }
    }

    let token = JwtKeys::from_ref(state)
        .sign_access(&user.email)
        .map_err(operation_failed)?;
    let role = role_for(&user.email);
    info!(user_id = %user.id, email = %user.email, "user signed in");
    Ok(SignedIn {
        token,
        user: PublicUser::from(user).with_role(role),
    })
}

pub async fn change_password(
    state: &AppState,
    user: &User,
    old_password: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    if old_password == new_password {
        return Err(ApiError::TwoPasswordSame);
    }
    if user.is_google_registered {
        return Err(ApiError::GoogleUserCannotChangePassword);
    }
    let ok = verify_password(old_password, &user.password_hash).map_err(operation_failed)?;
    if !ok {
        warn!(user_id = %user.id, "old password mismatch");
        return Err(ApiError::OldPasswordIncorrect);
    }
    if !is_strong_password(new_password) {
        return Err(ApiError::WeakPassword);
    }
    let hash = hash_password(new_password).map_err(operation_failed)?;
    state
        .users
        .update_password(user.id, &hash)
        .await
        .map_err(operation_failed)?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

pub async fn change_profile(
    state: &AppState,
    user: &User,
    first_name: &str,
    last_name: &str,
) -> Result<PublicUser, ApiError> {
    if user.first_name == first_name && user.last_name == last_name {
        return Err(ApiError::NothingToChange);
    }
    let updated = state
        .users
        .update_name(user.id, first_name, last_name)
        .await
        .map_err(operation_failed)?
        .ok_or(ApiError::UserNotFound)?;
    info!(user_id = %user.id, "profile updated");
    Ok(updated.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL: &str = "alice@example.com";
    const PASSWORD: &str = "Abc12345!";

    async fn current(state: &AppState) -> User {
        state.users.find_by_email(EMAIL).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn signup_then_signin_roundtrip() {
        let state = AppState::fake();
        let signed_up = signup(&state, EMAIL, PASSWORD).await.expect("signup");
        assert!(!signed_up.token.is_empty());
        assert!(!signed_up.user.is_email_verified);

        let signed_in = signin(&state, EMAIL, PASSWORD).await.expect("signin");
        assert!(!signed_in.token.is_empty());
        assert!(signed_in.user.role.is_some());
        let claims = JwtKeys::from_ref(&state).verify_access(&signed_in.token).unwrap();
        assert_eq!(claims.email, EMAIL);

        let err = signin(&state, EMAIL, "wrong").await.unwrap_err();
        assert_eq!(err, ApiError::InvalidCredentials);
    }

    #[tokio::test]
    async fn signup_validation() {
        let state = AppState::fake();
        assert_eq!(signup(&state, "", PASSWORD).await.unwrap_err(), ApiError::EmailOrPasswordRequired);
        assert_eq!(signup(&state, EMAIL, "").await.unwrap_err(), ApiError::EmailOrPasswordRequired);
        assert_eq!(signup(&state, "nope", PASSWORD).await.unwrap_err(), ApiError::InvalidEmailFormat);
        assert_eq!(signup(&state, EMAIL, "weakpass").await.unwrap_err(), ApiError::WeakPassword);
        signup(&state, EMAIL, PASSWORD).await.unwrap();
        assert_eq!(signup(&state, EMAIL, PASSWORD).await.unwrap_err(), ApiError::UserAlreadyExists);
    }

    #[tokio::test]
    async fn concurrent_signups_yield_exactly_one_account() {
        let state = AppState::fake();
        let (a, b) = tokio::join!(
            signup(&state, EMAIL, PASSWORD),
            signup(&state, EMAIL, PASSWORD)
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ApiError::UserAlreadyExists))));
        assert_eq!(state.users.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn signin_unknown_user() {
        let state = AppState::fake();
        assert_eq!(signin(&state, EMAIL, PASSWORD).await.unwrap_err(), ApiError::UserNotFound);
    }

    #[tokio::test]
    async fn google_accounts_bypass_password_and_cannot_change_it() {
        let state = AppState::fake();
        create_account(
            &state,
            NewAccount {
                email: EMAIL.into(),
                password: "0123456789abcdef".into(),
                first_name: "Al".into(),
                last_name: "Ice".into(),
                is_google_registered: true,
                is_email_verified: true,
            },
        )
        .await
        .expect("weak random password is accepted for google accounts");

        assert!(signin(&state, EMAIL, "").await.is_ok());
        let user = current(&state).await;
        assert_eq!(
            change_password(&state, &user, "a", "b").await.unwrap_err(),
            ApiError::GoogleUserCannotChangePassword
        );
    }

    #[tokio::test]
    async fn change_password_rules() {
        let state = AppState::fake();
        signup(&state, EMAIL, PASSWORD).await.unwrap();
        let user = current(&state).await;

        assert_eq!(
            change_password(&state, &user, "same", "same").await.unwrap_err(),
            ApiError::TwoPasswordSame
        );
        assert_eq!(
            change_password(&state, &user, "Wrong123!", "New12345!").await.unwrap_err(),
            ApiError::OldPasswordIncorrect
        );
        assert_eq!(
            change_password(&state, &user, PASSWORD, "weak").await.unwrap_err(),
            ApiError::WeakPassword
        );
        change_password(&state, &user, PASSWORD, "New12345!").await.unwrap();
        assert!(signin(&state, EMAIL, "New12345!").await.is_ok());
        assert_eq!(signin(&state, EMAIL, PASSWORD).await.unwrap_err(), ApiError::InvalidCredentials);
    }

    #[tokio::test]
    async fn change_profile_rules() {
        let state = AppState::fake();
        signup(&state, EMAIL, PASSWORD).await.unwrap();
        let user = current(&state).await;

        assert_eq!(
            change_profile(&state, &user, "", "").await.unwrap_err(),
            ApiError::NothingToChange
        );
        let updated = change_profile(&state, &user, "Alice", "Liddell").await.unwrap();
        assert_eq!(updated.username, "Alice Liddell");
        assert_eq!(current(&state).await.first_name, "Alice");
    }
}
