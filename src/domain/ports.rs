use super::callback::CallbackOutcome;
use super::notification::Email;
use super::registration::{PendingRegistration, RegistrationRow};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Registrations accepted but not yet settled by a gateway callback.
#[async_trait]
pub trait PendingStore: Send + Sync {
    async fn put(&self, registration: PendingRegistration) -> Result<()>;
    async fn get(&self, order_id: &str) -> Result<Option<PendingRegistration>>;
    async fn delete(&self, order_id: &str) -> Result<()>;
    /// Removes and returns the entry in one step; of two concurrent callers
    /// at most one receives `Some`.
    async fn take(&self, order_id: &str) -> Result<Option<PendingRegistration>>;
    /// Drops entries created before `cutoff`, returning how many went.
    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Durable, append-only storage of settled registrations (the spreadsheet).
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn append(&self, row: RegistrationRow) -> Result<()>;
    async fn rows(&self) -> Result<Vec<RegistrationRow>>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

/// What the gateway needs to open a hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub order_id: String,
    pub user_id: String,
    pub amount_minor: i64,
    pub mobile_number: String,
    pub redirect_url: String,
    pub callback_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub redirect_url: String,
}

/// Result of a server-side status query.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentStatus {
    pub success: bool,
    pub outcome: CallbackOutcome,
    pub details: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: PaymentRequest) -> Result<PaymentSession>;
    async fn status(&self, order_id: &str) -> Result<PaymentStatus>;
}

pub type PendingStoreRef = Arc<dyn PendingStore>;
pub type RowStoreRef = Arc<dyn RowStore>;
pub type MailerRef = Arc<dyn Mailer>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
