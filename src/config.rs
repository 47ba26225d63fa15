use anyhow::Context;
use serde::Deserialize;
use time::UtcOffset;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub verification_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub cors_origins: Vec<String>,
    pub verification_link: String,
    pub google: Option<GoogleConfig>,
    pub mail: Option<MailConfig>,
    /// Offset that defines "today" for dashboard statistics.
    pub utc_offset: UtcOffset,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "pulseboard".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "pulseboard-users".into()),
            ttl_minutes: env_i64("JWT_TTL_MINUTES").unwrap_or(60 * 24 * 7),
            verification_ttl_minutes: env_i64("JWT_VERIFICATION_TTL_MINUTES").unwrap_or(60 * 24),
        };

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:3001".into()),
        );

        let verification_link = std::env::var("VERIFICATION_LINK")
            .unwrap_or_else(|_| "http://localhost:3001/#/checkemail?token=".into());

        let google = match (
            std::env::var("GOOGLE_CLIENT_ID"),
            std::env::var("GOOGLE_CLIENT_SECRET"),
            std::env::var("GOOGLE_REDIRECT_URL"),
        ) {
            (Ok(client_id), Ok(client_secret), Ok(redirect_url)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url,
            }),
            _ => None,
        };

        let mail = match (
            std::env::var("MAIL_API_URL"),
            std::env::var("MAIL_TOKEN_URL"),
            std::env::var("MAIL_CLIENT_ID"),
            std::env::var("MAIL_CLIENT_SECRET"),
            std::env::var("MAIL_REFRESH_TOKEN"),
            std::env::var("MAIL_FROM"),
        ) {
            (Ok(api_url), Ok(token_url), Ok(client_id), Ok(client_secret), Ok(refresh_token), Ok(from)) => {
                Some(MailConfig {
                    api_url,
                    token_url,
                    client_id,
                    client_secret,
                    refresh_token,
                    from,
                })
            }
            _ => None,
        };

        let utc_offset = utc_offset_from_minutes(env_i64("APP_UTC_OFFSET_MINUTES").unwrap_or(0))?;

        Ok(Self {
            database_url,
            jwt,
            cors_origins,
            verification_link,
            google,
            mail,
            utc_offset,
        })
    }
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse::<i64>().ok())
}

fn utc_offset_from_minutes(minutes: i64) -> anyhow::Result<UtcOffset> {
    let seconds = minutes
        .checked_mul(60)
        .and_then(|s| i32::try_from(s).ok())
        .context("APP_UTC_OFFSET_MINUTES out of range")?;
    UtcOffset::from_whole_seconds(seconds).context("APP_UTC_OFFSET_MINUTES out of range")
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_origins() {
        let origins = parse_origins("http://localhost:3001, http://localhost:5000/ ,,");
        assert_eq!(origins, vec!["http://localhost:3001", "http://localhost:5000"]);
    }

    #[test]
    fn utc_offset_rejects_values_that_do_not_fit() {
        assert_eq!(
            utc_offset_from_minutes(120).unwrap(),
            UtcOffset::from_hms(2, 0, 0).unwrap()
        );
        assert_eq!(
            utc_offset_from_minutes(-330).unwrap(),
            UtcOffset::from_hms(-5, -30, 0).unwrap()
        );
        // Would wrap to a valid 44 second offset if truncated.
        assert!(utc_offset_from_minutes(71_582_789).is_err());
        assert!(utc_offset_from_minutes(i64::MAX).is_err());
        assert!(utc_offset_from_minutes(60 * 26).is_err());
    }
}
