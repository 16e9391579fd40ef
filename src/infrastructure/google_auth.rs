use crate::error::{RegistrationError, Result};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const SERVICE: &str = "google auth";

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.file";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are replaced this long before Google says they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Supplies OAuth bearer tokens for Google APIs.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    /// Forgets a cached token the API has rejected.
    async fn invalidate(&self) {}
}

pub type AccessTokenSourceRef = Arc<dyn AccessTokenSource>;

/// A token minted outside the process, used as is.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Service-account credentials exchanged for short-lived access tokens.
///
/// Signs an RS256 JWT assertion with the account's private key and trades it
/// at the token endpoint. The token is cached and minted again shortly before
/// it expires; concurrent callers wait for a single refresh.
pub struct ServiceAccountTokens {
    client: Client,
    client_email: String,
    key: EncodingKey,
    token_url: String,
    scope: String,
    timeout: Duration,
    cached: Mutex<Option<CachedToken>>,
}

/// Private keys pasted into environment variables usually carry literal `\n`
/// sequences and sometimes surrounding quotes.
pub fn normalize_private_key(raw: &str) -> String {
    raw.trim().trim_matches('"').replace("\\n", "\n")
}

impl ServiceAccountTokens {
    pub fn new(
        client_email: impl Into<String>,
        private_key_pem: &str,
        token_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let pem = normalize_private_key(private_key_pem);
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
            RegistrationError::ConfigError(format!("invalid service account private key: {e}"))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| RegistrationError::from_http(SERVICE, timeout, e))?;

        Ok(Self {
            client,
            client_email: client_email.into(),
            key,
            token_url: token_url.into(),
            scope: SHEETS_SCOPES.to_string(),
            timeout,
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: &self.scope,
            aud: &self.token_url,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| RegistrationError::InternalError(Box::new(e)))
    }

    async fn mint(&self) -> Result<CachedToken> {
        let assertion = self.assertion()?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistrationError::upstream(
                SERVICE,
                format!("token exchange failed (status={status}): {body}"),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))?;
        info!(account = %self.client_email, expires_in = token.expires_in, "Minted Google access token");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(REFRESH_MARGIN);
        Ok(CachedToken {
            token: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.token.clone());
            }
            debug!("Google access token due for refresh");
        }

        let fresh = self.mint().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}
