use crate::domain::notification::Email;
use crate::domain::ports::{Mailer, PendingStore, RowStore};
use crate::domain::registration::{PendingRegistration, RegistrationRow};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// A thread-safe in-memory store for pending registrations.
///
/// Uses `Arc<RwLock<HashMap<String, PendingRegistration>>>` so clones share the
/// same entries. Everything is lost on restart. Orders whose callback never
/// arrives stay until [`PendingStore::purge_created_before`] removes them.
#[derive(Default, Clone)]
pub struct InMemoryPendingStore {
    entries: Arc<RwLock<HashMap<String, PendingRegistration>>>,
}

impl InMemoryPendingStore {
    /// Creates a new, empty in-memory pending store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl PendingStore for InMemoryPendingStore {
    async fn put(&self, registration: PendingRegistration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(registration.order_id.clone(), registration);
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Result<Option<PendingRegistration>> {
        let entries = self.entries.read().await;
        Ok(entries.get(order_id).cloned())
    }

    async fn delete(&self, order_id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(order_id);
        Ok(())
    }

    async fn take(&self, order_id: &str) -> Result<Option<PendingRegistration>> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(order_id))
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, registration| registration.created_at >= cutoff);
        Ok(before - entries.len())
    }
}

/// Row storage kept in process memory, for local runs and tests.
#[derive(Default, Clone)]
pub struct InMemoryRowStore {
    rows: Arc<RwLock<Vec<RegistrationRow>>>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<RegistrationRow>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows)),
        }
    }
}

#[async_trait]
impl RowStore for InMemoryRowStore {
    async fn append(&self, row: RegistrationRow) -> Result<()> {
        self.rows.write().await.push(row);
        Ok(())
    }

    async fn rows(&self) -> Result<Vec<RegistrationRow>> {
        Ok(self.rows.read().await.clone())
    }
}

/// Mailer that keeps every message in memory and logs it instead of
/// delivering it. Used when no mail API is configured.
#[derive(Default, Clone)]
pub struct MailOutbox {
    sent: Arc<RwLock<Vec<Email>>>,
}

impl MailOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Mailer for MailOutbox {
    async fn send(&self, email: Email) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, "Email queued in local outbox");
        self.sent.write().await.push(email);
        Ok(())
    }
}
