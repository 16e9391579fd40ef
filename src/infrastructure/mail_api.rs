use crate::domain::notification::Email;
use crate::domain::ports::Mailer;
use crate::error::{RegistrationError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

const SERVICE: &str = "mail";
pub const DEFAULT_MAIL_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    html_content: String,
}

/// Sends mail through a transactional email HTTP API (Brevo-compatible).
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    sender_email: String,
    sender_name: Option<String>,
    timeout: Duration,
}

impl HttpMailer {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        sender_email: impl Into<String>,
        sender_name: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| RegistrationError::from_http(SERVICE, timeout, e))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            sender_email: sender_email.into(),
            sender_name,
            timeout,
        })
    }

    fn body(&self, email: Email) -> SendEmailBody {
        SendEmailBody {
            sender: EmailAddress {
                email: self.sender_email.clone(),
                name: self.sender_name.clone(),
            },
            to: vec![EmailAddress {
                email: email.to,
                name: email.to_name,
            }],
            subject: email.subject,
            html_content: email.html,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<()> {
        let to = email.to.clone();
        let body = self.body(email);

        let response = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))?;

        let status = response.status();
        if status.is_success() {
            info!(to = %to, subject = %body.subject, "Email sent");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(RegistrationError::upstream(
            SERVICE,
            format!("send failed (status={status}): {text}"),
        ))
    }
}
