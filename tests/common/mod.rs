#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use ticketgate::application::service::{Ports, PublicUrls, RegistrationService};
use ticketgate::domain::callback::CallbackOutcome;
use ticketgate::domain::checksum::ChecksumSigner;
use ticketgate::domain::event::EventConfig;
use ticketgate::domain::notification::Email;
use ticketgate::domain::ports::{
    Mailer, PaymentGateway, PaymentRequest, PaymentSession, PaymentStatus, RowStore,
};
use ticketgate::domain::registration::{Amount, PendingRegistration, RegistrationRow};
use ticketgate::error::{RegistrationError, Result};
use ticketgate::infrastructure::in_memory::{InMemoryPendingStore, InMemoryRowStore, MailOutbox};
use tokio::sync::Mutex;

pub const SALT_KEY: &str = "099eb0cd-02cf-4e2a-8aca-3e6c6aff0399";
pub const SALT_INDEX: u32 = 1;

pub fn signer() -> ChecksumSigner {
    ChecksumSigner::new(SALT_KEY, SALT_INDEX)
}

pub fn summit() -> EventConfig {
    EventConfig {
        slug: "summit".to_string(),
        title: "Trading Summit".to_string(),
        ticket_prefix: "BSKTETC24".to_string(),
        mount_path: "/api".to_string(),
        sheet_id: None,
    }
}

pub fn evolve() -> EventConfig {
    EventConfig {
        slug: "evolve".to_string(),
        title: "Evolve".to_string(),
        ticket_prefix: "EVOLVE".to_string(),
        mount_path: "/api/evolve".to_string(),
        sheet_id: None,
    }
}

pub fn urls() -> PublicUrls {
    PublicUrls {
        backend_url: "https://api.example.com".to_string(),
        frontend_url: "https://example.com".to_string(),
    }
}

pub fn pending(event: &str, order_id: &str, email: &str, phone: &str) -> PendingRegistration {
    PendingRegistration {
        order_id: order_id.to_string(),
        event: event.to_string(),
        name: "Asha Rao".to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        address: None,
        package: "gold".to_string(),
        ticket_number: "BSKTETC240001".to_string(),
        amount: Amount::new(dec!(1499)).unwrap(),
        created_at: Utc.with_ymd_and_hms(2024, 11, 2, 10, 30, 0).unwrap(),
    }
}

/// Base64 callback body as the gateway posts it.
pub fn callback_response(order_id: &str, code: &str, transaction_id: Option<&str>) -> String {
    let body = json!({
        "success": code == "PAYMENT_SUCCESS",
        "code": code,
        "message": "callback",
        "data": {
            "merchantId": "MERCHANTUAT",
            "merchantTransactionId": order_id,
            "transactionId": transaction_id,
            "amount": 149900,
            "state": if code == "PAYMENT_SUCCESS" { "COMPLETED" } else { "FAILED" },
        }
    });
    STANDARD.encode(serde_json::to_vec(&body).unwrap())
}

/// `X-VERIFY` value the gateway would send with `response`.
pub fn sign_callback(response: &str) -> String {
    signer().sign_encoded(response, "").to_string()
}

/// Row store that can be switched into failing appends.
#[derive(Clone, Default)]
pub struct FlakyRowStore {
    pub inner: InMemoryRowStore,
    fail_appends: Arc<AtomicBool>,
}

impl FlakyRowStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_appends.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RowStore for FlakyRowStore {
    async fn append(&self, row: RegistrationRow) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(RegistrationError::upstream("spreadsheet", "quota exceeded"));
        }
        self.inner.append(row).await
    }

    async fn rows(&self) -> Result<Vec<RegistrationRow>> {
        self.inner.rows().await
    }
}

/// Mailer that can be switched into failing sends.
#[derive(Clone, Default)]
pub struct FlakyMailer {
    pub outbox: MailOutbox,
    fail_sends: Arc<AtomicBool>,
}

impl FlakyMailer {
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    pub async fn subjects(&self) -> Vec<String> {
        self.outbox.sent().await.into_iter().map(|e| e.subject).collect()
    }
}

#[async_trait]
impl Mailer for FlakyMailer {
    async fn send(&self, email: Email) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(RegistrationError::upstream("mail", "503 Service Unavailable"));
        }
        self.outbox.send(email).await
    }
}

/// Gateway that records payment requests and answers from a canned status.
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<PaymentRequest>>,
    pub fail_initiate: AtomicBool,
    pub delay: Option<Duration>,
}

impl FakeGateway {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initiate(&self, request: PaymentRequest) -> Result<PaymentSession> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_initiate.load(Ordering::SeqCst) {
            return Err(RegistrationError::upstream("payment gateway", "BAD_REQUEST"));
        }
        let redirect_url = format!("https://pay.example.com/{}", request.order_id);
        self.requests.lock().await.push(request);
        Ok(PaymentSession { redirect_url })
    }

    async fn status(&self, order_id: &str) -> Result<PaymentStatus> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(PaymentStatus {
            success: true,
            outcome: CallbackOutcome::Success {
                transaction_id: format!("T-{order_id}"),
            },
            details: json!({ "merchantTransactionId": order_id, "state": "COMPLETED" }),
        })
    }
}

/// One event service wired to in-memory fakes the test can inspect.
pub struct Harness {
    pub service: Arc<RegistrationService>,
    pub pending: InMemoryPendingStore,
    pub rows: FlakyRowStore,
    pub mailer: FlakyMailer,
    pub gateway: Arc<FakeGateway>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gateway(summit(), InMemoryPendingStore::new(), FakeGateway::default())
    }

    pub fn with_gateway(event: EventConfig, pending: InMemoryPendingStore, gateway: FakeGateway) -> Self {
        let rows = FlakyRowStore::default();
        let mailer = FlakyMailer::default();
        let gateway = Arc::new(gateway);
        let ports = Ports {
            pending: Arc::new(pending.clone()),
            rows: Arc::new(rows.clone()),
            mailer: Arc::new(mailer.clone()),
            gateway: gateway.clone(),
        };
        let service = RegistrationService::new(event, urls(), signer(), ports);
        Self {
            service: Arc::new(service),
            pending,
            rows,
            mailer,
            gateway,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let ports = Ports {
            pending: Arc::new(self.pending.clone()),
            rows: Arc::new(self.rows.clone()),
            mailer: Arc::new(self.mailer.clone()),
            gateway: self.gateway.clone(),
        };
        let service = RegistrationService::new(self.service.event().clone(), urls(), signer(), ports)
            .with_upstream_timeout(timeout);
        self.service = Arc::new(service);
        self
    }

    pub async fn seed(&self, registration: PendingRegistration) {
        use ticketgate::domain::ports::PendingStore;
        self.pending.put(registration).await.unwrap();
    }

    pub async fn rows(&self) -> Vec<RegistrationRow> {
        self.rows.rows().await.unwrap()
    }
}
