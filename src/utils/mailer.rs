use serde_json::json;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail gateway is not configured")]
    NotConfigured,

    #[error("mail gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail gateway rejected the message: {status}")]
    Rejected { status: u16 },
}

/// Thin client for the external mail gateway. Delivery is advisory: callers
/// log failures and leave the outbox row marked `failed`, they never roll
/// back the business transition that queued the mail.
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
}

impl Mailer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailerError> {
        let gateway_url = Config::get()
            .mail_gateway_url
            .clone()
            .ok_or(MailerError::NotConfigured)?;

        let response = self
            .client
            .post(&gateway_url)
            .json(&json!({
                "to": to,
                "subject": subject,
                "html": html_body,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailerError::Rejected {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

impl Default for Mailer {
    fn default() -> Self {
        Self::new()
    }
}
