use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const TOKEN_INFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const PEOPLE_URL: &str = "https://people.googleapis.com/v1/people/me?personFields=names";
const SCOPES: &str = "https://www.googleapis.com/auth/userinfo.profile \
                      https://www.googleapis.com/auth/userinfo.email";

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider answered with status {0}")]
    Status(u16),
    #[error("provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oauth provider is not configured")]
    Unconfigured,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderProfile {
    pub given_name: String,
    pub family_name: String,
}

/// The external OAuth2 identity provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError>;
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError>;
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError>;
    /// Email bound to the access token, if the provider disclosed one.
    async fn token_email(&self, access_token: &str) -> Result<Option<String>, ProviderError>;
}

pub struct GoogleProvider {
    cfg: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(cfg: GoogleConfig) -> Self {
        Self {
            cfg,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct PeopleResponse {
    #[serde(default)]
    names: Vec<PersonName>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonName {
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
}

#[derive(Deserialize)]
struct TokenInfo {
    email: Option<String>,
}

fn check(res: &reqwest::Response, what: &str) -> Result<(), ProviderError> {
    let status = res.status();
    if !status.is_success() {
        warn!(%status, what, "google api error");
        return Err(ProviderError::Status(status.as_u16()));
    }
    Ok(())
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("access_type", "offline"),
                ("scope", SCOPES),
                ("response_type", "code"),
                ("client_id", self.cfg.client_id.as_str()),
                ("redirect_uri", self.cfg.redirect_url.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| {
            warn!(error = %e, "building authorization url failed");
            ProviderError::Unconfigured
        })?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        let res = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
                ("redirect_uri", self.cfg.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        check(&res, "token exchange")?;
        let tokens = res.json::<ProviderTokens>().await?;
        debug!(has_refresh = tokens.refresh_token.is_some(), "google code exchanged");
        Ok(tokens)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        let res = self
            .http
            .get(PEOPLE_URL)
            .bearer_auth(access_token)
            .send()
            .await?;
        check(&res, "people")?;
        let people = res.json::<PeopleResponse>().await?;
        Ok(people
            .names
            .into_iter()
            .next()
            .map(|n| ProviderProfile {
                given_name: n.given_name,
                family_name: n.family_name,
            })
            .unwrap_or_default())
    }

    async fn token_email(&self, access_token: &str) -> Result<Option<String>, ProviderError> {
        let res = self
            .http
            .get(TOKEN_INFO_URL)
            .query(&[("access_token", access_token)])
            .send()
            .await?;
        check(&res, "tokeninfo")?;
        Ok(res.json::<TokenInfo>().await?.email.filter(|e| !e.is_empty()))
    }
}

/// Stand-in used when no client credentials are configured.
pub struct UnconfiguredProvider;

#[async_trait]
impl OAuthProvider for UnconfiguredProvider {
    fn authorize_url(&self, _state: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unconfigured)
    }

    async fn exchange_code(&self, _code: &str) -> Result<ProviderTokens, ProviderError> {
        Err(ProviderError::Unconfigured)
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<ProviderProfile, ProviderError> {
        Err(ProviderError::Unconfigured)
    }

    async fn token_email(&self, _access_token: &str) -> Result<Option<String>, ProviderError> {
        Err(ProviderError::Unconfigured)
    }
}
