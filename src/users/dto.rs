use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::policy::{Permission, Role},
    store::User,
};

/// Request body for signup and signin.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModifyProfileRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModifyPasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Public part of the user returned to the client. Never carries the password hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// `"<firstName> <lastName>"`
    pub username: String,
    pub is_google_registered: bool,
    pub is_email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub last_session: OffsetDateTime,
    pub login_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub permission: Option<Vec<Permission>>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        let username = u.display_name();
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            username,
            is_google_registered: u.is_google_registered,
            is_email_verified: u.is_email_verified,
            last_session: u.last_session,
            login_count: u.login_count,
            created_at: u.created_at,
            updated_at: u.updated_at,
            role: None,
            permission: None,
        }
    }
}

impl PublicUser {
    pub fn with_role(mut self, role: Role) -> Self {
        self.permission = Some(role.permission.clone());
        self.role = Some(role);
        self
    }
}

/// Response data after signup, signin or Google sign-in.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub access_token: String,
    /// Same value as the access token; there is no separate refresh flow.
    pub refresh_token: String,
    pub user: PublicUser,
}

impl AuthPayload {
    pub fn new(token: String, user: PublicUser) -> Self {
        Self {
            refresh_token: token.clone(),
            access_token: token,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::policy::role_for;

    fn sample_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            first_name: "Foo".into(),
            last_name: "Bar".into(),
            is_google_registered: false,
            is_email_verified: true,
            last_session: now,
            login_count: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn public_user_hides_password_and_derives_username() {
        let json = serde_json::to_value(PublicUser::from(sample_user())).unwrap();
        assert_eq!(json["email"], "test@example.com");
        assert_eq!(json["username"], "Foo Bar");
        assert_eq!(json["isEmailVerified"], true);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(json.get("role").is_none());
        assert!(!json.to_string().contains("argon2"));
    }

    #[test]
    fn role_is_attached_transiently() {
        let user = PublicUser::from(sample_user()).with_role(role_for("test@example.com"));
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"]["name"], "Admin");
        assert!(json["permission"].as_array().is_some_and(|p| !p.is_empty()));
    }

    #[test]
    fn auth_payload_mirrors_token() {
        let json =
            serde_json::to_value(AuthPayload::new("t0k".into(), PublicUser::from(sample_user())))
                .unwrap();
        assert_eq!(json["accessToken"], "t0k");
        assert_eq!(json["refreshToken"], "t0k");
    }
}
