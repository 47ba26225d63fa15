use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::google::{GoogleProvider, OAuthProvider, UnconfiguredProvider};
use crate::auth::mailer::{HttpMailer, LogMailer, Mailer};
use crate::auth::session::OAuthSessions;
use crate::config::AppConfig;
use crate::store::{ActivityStore, MemoryStore, PgStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub activities: Arc<dyn ActivityStore>,
    pub sessions: Arc<OAuthSessions>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub mailer: Arc<dyn Mailer>,
    /// Present when running on Postgres; used for migrations.
    pub pg: Option<PgStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, activities, pg) = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                let store = PgStore::new(db);
                (
                    Arc::new(store.clone()) as Arc<dyn UserStore>,
                    Arc::new(store.clone()) as Arc<dyn ActivityStore>,
                    Some(store),
                )
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store, data will not persist");
                let store = Arc::new(MemoryStore::new());
                (
                    store.clone() as Arc<dyn UserStore>,
                    store as Arc<dyn ActivityStore>,
                    None,
                )
            }
        };

        let oauth: Arc<dyn OAuthProvider> = match config.google.clone() {
            Some(google) => Arc::new(GoogleProvider::new(google)),
            None => {
                warn!("GOOGLE_CLIENT_ID/SECRET/REDIRECT_URL not set; google sign-in disabled");
                Arc::new(UnconfiguredProvider)
            }
        };

        let mailer: Arc<dyn Mailer> = match config.mail.clone() {
            Some(mail) => Arc::new(HttpMailer::new(mail)),
            None => {
                info!("mail api not configured; verification mails go to the log");
                Arc::new(LogMailer)
            }
        };

        Ok(Self {
            config,
            users,
            activities,
            sessions: Arc::new(OAuthSessions::new()),
            oauth,
            mailer,
            pg,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<MemoryStore>,
        oauth: Arc<dyn OAuthProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            users: store.clone(),
            activities: store,
            sessions: Arc::new(OAuthSessions::new()),
            oauth,
            mailer,
            pg: None,
        }
    }

    /// In-memory state with a fixed secret and no outside collaborators.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24 * 7,
                verification_ttl_minutes: 60 * 24,
            },
            cors_origins: vec!["http://localhost:3001".into()],
            verification_link: "http://localhost:3001/#/checkemail?token=".into(),
            google: None,
            mail: None,
            utc_offset: time::UtcOffset::UTC,
        });
        Self::from_parts(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(UnconfiguredProvider),
            Arc::new(LogMailer),
        )
    }
}
