//! Runtime settings, read from command-line flags with environment fallbacks.

use clap::Args;
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::application::service::PublicUrls;
use crate::domain::checksum::ChecksumSigner;
use crate::domain::event::EventConfig;
use crate::error::{RegistrationError, Result};
use crate::infrastructure::google_auth::{
    AccessTokenSourceRef, DEFAULT_TOKEN_URL, ServiceAccountTokens, StaticToken,
};
use crate::infrastructure::mail_api::DEFAULT_MAIL_API_URL;
use crate::infrastructure::sheets::DEFAULT_SHEETS_API_URL;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Port the HTTP server listens on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Path to a persistent pending-registration database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PENDING_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory for CSV registration sheets, used when Google Sheets is not configured
    #[arg(long, env = "ROWS_CSV_DIR")]
    pub rows_dir: Option<PathBuf>,

    /// Seconds to wait for any outbound call before giving up
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Seconds an unpaid registration is kept before it is swept
    #[arg(long, env = "PENDING_TTL_SECS", default_value_t = 86_400)]
    pub pending_ttl_secs: u64,

    #[command(flatten)]
    pub gateway: GatewaySettings,

    #[command(flatten)]
    pub urls: UrlSettings,

    #[command(flatten)]
    pub mail: MailSettings,

    #[command(flatten)]
    pub sheets: SheetsSettings,

    #[command(flatten)]
    pub events: EventSettings,
}

#[derive(Debug, Clone, Args)]
pub struct GatewaySettings {
    #[arg(long, env = "PHONEPE_MID")]
    pub phonepe_mid: String,

    #[arg(long, env = "PHONEPE_SALTKEY", hide_env_values = true)]
    pub phonepe_saltkey: String,

    #[arg(long, env = "PHONEPE_SALT_INDEX", default_value_t = 1)]
    pub phonepe_salt_index: u32,

    /// Base URL of the pay/status API, e.g. https://api.phonepe.com/apis/hermes/pg/v1
    #[arg(long, env = "PHONEPE_API_URL")]
    pub phonepe_api_url: String,
}

#[derive(Debug, Clone, Args)]
pub struct UrlSettings {
    /// Public URL of this server, used for gateway callbacks and redirects
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: String,

    /// Public URL of the registration site
    #[arg(long, env = "FRONTEND_URL")]
    pub frontend_url: String,
}

#[derive(Debug, Clone, Args)]
pub struct MailSettings {
    #[arg(long, env = "MAIL_API_URL", default_value = DEFAULT_MAIL_API_URL)]
    pub mail_api_url: String,

    /// Without a key, emails are only logged
    #[arg(long, env = "MAIL_API_KEY", hide_env_values = true)]
    pub mail_api_key: Option<String>,

    #[arg(long, env = "MAIL_SENDER_EMAIL", default_value = "events@localhost")]
    pub mail_sender_email: String,

    #[arg(long, env = "MAIL_SENDER_NAME", default_value = "The Brand Stories")]
    pub mail_sender_name: String,
}

#[derive(Debug, Clone, Args)]
pub struct SheetsSettings {
    #[arg(long, env = "GOOGLE_SHEETS_API_URL", default_value = DEFAULT_SHEETS_API_URL)]
    pub sheets_api_url: String,

    /// Service account that owns access to the sheets
    #[arg(long, env = "GOOGLE_SHEETS_CLIENT_EMAIL")]
    pub sheets_client_email: Option<String>,

    /// PEM private key of the service account; literal `\n` sequences are accepted
    #[arg(long, env = "GOOGLE_SHEETS_PRIVATE_KEY", hide_env_values = true)]
    pub sheets_private_key: Option<String>,

    #[arg(long, env = "GOOGLE_OAUTH_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    pub sheets_token_url: String,

    /// Pre-minted OAuth access token, used only without service account credentials
    #[arg(long, env = "GOOGLE_SHEETS_ACCESS_TOKEN", hide_env_values = true)]
    pub sheets_access_token: Option<String>,

    /// Sheet (tab) name holding the registrations
    #[arg(long, env = "GOOGLE_SHEETS_RANGE", default_value = "Sheet1")]
    pub sheets_range: String,
}

#[derive(Debug, Clone, Args)]
pub struct EventSettings {
    #[arg(long, env = "EVENT_SLUG", default_value = "summit")]
    pub event_slug: String,

    #[arg(long, env = "EVENT_TITLE", default_value = "Trading Summit")]
    pub event_title: String,

    #[arg(long, env = "EVENT_TICKET_PREFIX", default_value = "BSKTETC24")]
    pub event_ticket_prefix: String,

    #[arg(long, env = "GOOGLE_SHEETS_SHEET_ID")]
    pub event_sheet_id: Option<String>,

    /// Also serve the second event under /api/evolve
    #[arg(long, env = "EVOLVE_ENABLED")]
    pub evolve: bool,

    #[arg(long, env = "EVOLVE_TITLE", default_value = "Evolve")]
    pub evolve_title: String,

    #[arg(long, env = "EVOLVE_TICKET_PREFIX", default_value = "EVOLVE")]
    pub evolve_ticket_prefix: String,

    /// Setting this also enables the second event
    #[arg(long, env = "EVOLVE_SHEET_ID")]
    pub evolve_sheet_id: Option<String>,
}

fn check_url(name: &str, value: &str) -> Result<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| RegistrationError::ConfigError(format!("{name} '{value}' is not a valid URL: {e}")))
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        check_url("PHONEPE_API_URL", &self.gateway.phonepe_api_url)?;
        check_url("BACKEND_URL", &self.urls.backend_url)?;
        check_url("FRONTEND_URL", &self.urls.frontend_url)?;
        check_url("MAIL_API_URL", &self.mail.mail_api_url)?;
        check_url("GOOGLE_SHEETS_API_URL", &self.sheets.sheets_api_url)?;
        check_url("GOOGLE_OAUTH_TOKEN_URL", &self.sheets.sheets_token_url)?;

        if self.sheets.sheets_client_email.is_some() != self.sheets.sheets_private_key.is_some() {
            return Err(RegistrationError::ConfigError(
                "GOOGLE_SHEETS_CLIENT_EMAIL and GOOGLE_SHEETS_PRIVATE_KEY must be set together"
                    .to_string(),
            ));
        }

        if self.gateway.phonepe_saltkey.trim().is_empty() {
            return Err(RegistrationError::ConfigError(
                "PHONEPE_SALTKEY must not be empty".to_string(),
            ));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(RegistrationError::ConfigError(
                "UPSTREAM_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        if self.pending_ttl_secs == 0 {
            return Err(RegistrationError::ConfigError(
                "PENDING_TTL_SECS must be positive".to_string(),
            ));
        }

        let events = self.events();
        let mut slugs: Vec<&str> = events.iter().map(|e| e.slug.as_str()).collect();
        slugs.sort_unstable();
        slugs.dedup();
        if slugs.len() != events.len() {
            return Err(RegistrationError::ConfigError(
                "event slugs must be unique".to_string(),
            ));
        }
        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn checksum_signer(&self) -> ChecksumSigner {
        ChecksumSigner::new(
            self.gateway.phonepe_saltkey.clone(),
            self.gateway.phonepe_salt_index,
        )
    }

    pub fn public_urls(&self) -> PublicUrls {
        PublicUrls {
            backend_url: self.urls.backend_url.trim_end_matches('/').to_string(),
            frontend_url: self.urls.frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Token source for the Sheets API: service account credentials first,
    /// then a pre-minted token. `None` when neither is configured.
    pub fn sheets_tokens(&self) -> Result<Option<AccessTokenSourceRef>> {
        let sheets = &self.sheets;
        if let (Some(email), Some(key)) = (&sheets.sheets_client_email, &sheets.sheets_private_key) {
            let tokens = ServiceAccountTokens::new(
                email.clone(),
                key,
                sheets.sheets_token_url.clone(),
                self.upstream_timeout(),
            )?;
            return Ok(Some(Arc::new(tokens)));
        }
        Ok(sheets
            .sheets_access_token
            .as_ref()
            .map(|token| Arc::new(StaticToken::new(token.clone())) as AccessTokenSourceRef))
    }

    /// The primary event under `/api`, plus the second event when enabled.
    pub fn events(&self) -> Vec<EventConfig> {
        let events = &self.events;
        let mut configs = vec![EventConfig {
            slug: events.event_slug.clone(),
            title: events.event_title.clone(),
            ticket_prefix: events.event_ticket_prefix.clone(),
            mount_path: "/api".to_string(),
            sheet_id: events.event_sheet_id.clone(),
        }];

        if events.evolve || events.evolve_sheet_id.is_some() {
            configs.push(EventConfig {
                slug: "evolve".to_string(),
                title: events.evolve_title.clone(),
                ticket_prefix: events.evolve_ticket_prefix.clone(),
                mount_path: "/api/evolve".to_string(),
                sheet_id: events.evolve_sheet_id.clone(),
            });
        }
        configs
    }
}
