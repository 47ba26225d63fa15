use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MailConfig;

/// Outbound mail: one message to one address, success or failure.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// Mail API reached with an OAuth refresh token (Zoho-style message endpoint).
pub struct HttpMailer {
    cfg: MailConfig,
    http: reqwest::Client,
}

impl HttpMailer {
    pub fn new(cfg: MailConfig) -> Self {
        Self {
            cfg,
            http: reqwest::Client::new(),
        }
    }

    async fn api_token(&self) -> anyhow::Result<String> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let res = self
            .http
            .post(&self.cfg.token_url)
            .query(&[
                ("refresh_token", self.cfg.refresh_token.as_str()),
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("mail token request")?
            .error_for_status()
            .context("mail token status")?;
        Ok(res.json::<TokenResponse>().await.context("mail token payload")?.access_token)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingMessage<'a> {
    from_address: &'a str,
    to_address: &'a str,
    subject: &'a str,
    content: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let token = self.api_token().await?;
        self.http
            .post(&self.cfg.api_url)
            .header(reqwest::header::AUTHORIZATION, format!("Zoho-oauthtoken {token}"))
            .json(&OutgoingMessage {
                from_address: &self.cfg.from,
                to_address: to,
                subject,
                content: html,
            })
            .send()
            .await
            .context("mail send request")?
            .error_for_status()
            .context("mail send status")?;
        info!(%to, "mail sent");
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        info!(%to, %subject, "mail delivery not configured; message not sent");
        debug!(%to, body = %html, "undelivered message body");
        Ok(())
    }
}

pub fn verification_mail(link: &str) -> (&'static str, String) {
    (
        "Please verify your email address",
        format!(
            r#"<p>Please click the following link to verify your email:</p>
<a href="{link}" style="display:inline-block;padding:10px 20px;background-color:#007bff;color:#fff;text-decoration:none;border-radius:5px;">Verify Email</a>"#
        ),
    )
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[traced_test]
    #[tokio::test]
    async fn log_mailer_keeps_the_body_out_of_info_logs() {
        let (subject, body) = verification_mail("http://front/#/checkemail?token=live-secret");
        LogMailer.send("a@example.com", subject, &body).await.unwrap();

        assert!(logs_contain("a@example.com"));
        logs_assert(|lines: &[&str]| {
            let leaked = lines
                .iter()
                .filter(|l| l.contains("INFO") && l.contains("live-secret"))
                .count();
            match leaked {
                0 => Ok(()),
                n => Err(format!("{n} info lines carry the token")),
            }
        });
    }

    #[test]
    fn verification_mail_links_the_token() {
        let (subject, body) = verification_mail("http://front/#/checkemail?token=abc");
        assert_eq!(subject, "Please verify your email address");
        assert!(body.contains(r#"href="http://front/#/checkemail?token=abc""#));
    }
}
