use crate::domain::callback::{CallbackOutcome, decode_callback};
use crate::domain::checksum::ChecksumSigner;
use crate::domain::event::EventConfig;
use crate::domain::notification;
use crate::domain::ports::{
    MailerRef, PaymentGatewayRef, PaymentRequest, PaymentStatus, PendingStoreRef, RowStoreRef,
};
use crate::domain::registration::{
    AvailabilityQuery, Identifiers, PendingRegistration, RegistrationRequest, RegistrationRow,
    find_duplicate,
};
use crate::error::{RegistrationError, Result};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// The collaborators a [`RegistrationService`] talks to.
#[derive(Clone)]
pub struct Ports {
    pub pending: PendingStoreRef,
    pub rows: RowStoreRef,
    pub mailer: MailerRef,
    pub gateway: PaymentGatewayRef,
}

/// Public URLs the gateway and the browser are sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrls {
    pub backend_url: String,
    pub frontend_url: String,
}

impl PublicUrls {
    /// Where the verification page sends the browser once it has rendered.
    pub fn payment_status_page(&self) -> String {
        format!("{}/payment-status", self.frontend_url.trim_end_matches('/'))
    }
}

/// Returned to the browser after a payment was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub payment_url: String,
    pub order_id: String,
    pub ticket_number: String,
}

/// What a processed callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub order_id: String,
    pub outcome: CallbackOutcome,
}

/// Periodically drops pending registrations older than `ttl`, i.e. payments
/// whose callback never arrived.
pub fn spawn_pending_sweeper(pending: PendingStoreRef, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            warn!("Pending registration TTL out of range, sweeper disabled");
            return;
        };
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
                continue;
            };
            match pending.purge_created_before(cutoff).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Dropped abandoned pending registrations"),
                Err(e) => warn!(error = %e, "Pending registration sweep failed"),
            }
        }
    })
}

/// Registration flow of one event.
///
/// Owns the event configuration and drives each registration from pending to
/// committed or rejected. Every outbound call is bounded by the upstream
/// timeout.
pub struct RegistrationService {
    event: EventConfig,
    urls: PublicUrls,
    checksum: ChecksumSigner,
    ports: Ports,
    upstream_timeout: Duration,
}

impl RegistrationService {
    /// Creates a new `RegistrationService`.
    ///
    /// # Arguments
    ///
    /// * `event` - Which event this service registers attendees for.
    /// * `urls` - Public backend/frontend URLs used for gateway redirects.
    /// * `checksum` - Signer holding the merchant salt, used for callbacks.
    /// * `ports` - Stores, mailer and payment gateway.
    pub fn new(event: EventConfig, urls: PublicUrls, checksum: ChecksumSigner, ports: Ports) -> Self {
        Self {
            event,
            urls,
            checksum,
            ports,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn event(&self) -> &EventConfig {
        &self.event
    }

    pub fn urls(&self) -> &PublicUrls {
        &self.urls
    }

    async fn bounded<T>(&self, service: &'static str, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.upstream_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RegistrationError::TimeoutError {
                service,
                timeout: self.upstream_timeout,
            }),
        }
    }

    async fn ensure_available(&self, email: &str, phone: &str) -> Result<()> {
        let rows = self.bounded("spreadsheet", self.ports.rows.rows()).await?;
        match find_duplicate(&rows, email, phone) {
            Some(field) => {
                info!(event = %self.event.slug, %field, "Duplicate registration rejected");
                Err(RegistrationError::DuplicateError(field))
            }
            None => Ok(()),
        }
    }

    /// Rejects the registration if email or phone already has a row.
    pub async fn check_registration(&self, query: AvailabilityQuery) -> Result<()> {
        query.validate()?;
        self.ensure_available(&query.email, &query.phone).await
    }

    /// Accepts a registration and opens a payment for it.
    pub async fn register(&self, request: RegistrationRequest) -> Result<RegistrationReceipt> {
        let applicant = request.validate()?;
        self.ensure_available(&applicant.email, &applicant.phone).await?;

        let now = Utc::now();
        let ids = Identifiers::generate(&self.event.ticket_prefix, now);
        let pending = PendingRegistration::new(&self.event.slug, applicant, ids, now);
        let order_id = pending.order_id.clone();

        let payment = PaymentRequest {
            order_id: order_id.clone(),
            user_id: pending.email.clone(),
            amount_minor: pending.amount.to_minor_units()?,
            mobile_number: pending.phone.clone(),
            redirect_url: self.event.redirect_url(&self.urls.backend_url),
            callback_url: self.event.callback_url(&self.urls.backend_url),
        };

        self.bounded("pending store", self.ports.pending.put(pending.clone()))
            .await?;

        let session = match self
            .bounded("payment gateway", self.ports.gateway.initiate(payment))
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(event = %self.event.slug, order_id = %order_id, error = %e, "Payment initialization failed");
                if let Err(cleanup) = self
                    .bounded("pending store", self.ports.pending.delete(&order_id))
                    .await
                {
                    error!(order_id = %order_id, error = %cleanup, "Failed to drop pending registration");
                }
                return Err(e);
            }
        };

        let email = notification::registration_initiated(&self.event, &pending);
        if let Err(e) = self.bounded("mail", self.ports.mailer.send(email)).await {
            warn!(order_id = %order_id, error = %e, "Registration initiated email not sent");
        }

        info!(event = %self.event.slug, order_id = %order_id, ticket = %pending.ticket_number, "Registration pending payment");
        Ok(RegistrationReceipt {
            payment_url: session.redirect_url,
            order_id,
            ticket_number: pending.ticket_number,
        })
    }

    /// Authenticates, decodes and commits a gateway callback.
    ///
    /// A missing or wrong checksum stops here, before any state is touched.
    pub async fn handle_callback(&self, checksum: Option<&str>, response: &str) -> Result<CommitReceipt> {
        let verified = checksum.is_some_and(|supplied| self.checksum.verify_callback(response, supplied));
        if !verified {
            warn!(event = %self.event.slug, "Callback rejected: checksum mismatch");
            return Err(RegistrationError::ChecksumMismatchError);
        }

        let decoded = decode_callback(response)?;
        self.commit(&decoded.order_id, decoded.outcome).await
    }

    /// Settles the pending registration `order_id` with `outcome`.
    ///
    /// The entry is claimed atomically, so concurrent callbacks for one order
    /// commit once and the others see `NotFoundError`. If a side effect fails
    /// before anything durable happened, the entry is put back so a gateway
    /// retry can settle it; once the row is written the entry stays consumed.
    pub async fn commit(&self, order_id: &str, outcome: CallbackOutcome) -> Result<CommitReceipt> {
        let not_found = || RegistrationError::NotFoundError(order_id.to_string());

        // Another event's order is never taken, so its own callback cannot miss it.
        let owner = self
            .bounded("pending store", self.ports.pending.get(order_id))
            .await?
            .ok_or_else(not_found)?;
        if owner.event != self.event.slug {
            warn!(event = %self.event.slug, owner = %owner.event, order_id, "Callback for another event");
            return Err(not_found());
        }

        let pending = self
            .bounded("pending store", self.ports.pending.take(order_id))
            .await?
            .ok_or_else(not_found)?;

        match &outcome {
            CallbackOutcome::Success { transaction_id } => {
                let row = RegistrationRow::committed(&pending, transaction_id);
                if let Err(e) = self.bounded("spreadsheet", self.ports.rows.append(row)).await {
                    error!(order_id, error = %e, "Row append failed, keeping registration pending");
                    self.restore(pending).await;
                    return Err(e);
                }
                info!(event = %self.event.slug, order_id, transaction_id = %transaction_id, "Registration committed");

                let email = notification::registration_confirmed(&self.event, &pending, transaction_id);
                if let Err(e) = self.bounded("mail", self.ports.mailer.send(email)).await {
                    error!(order_id, to = %pending.email, error = %e, "Confirmation email failed after commit");
                    return Err(e);
                }
            }
            CallbackOutcome::Failed { reason_code } => {
                let email = notification::registration_failed(&self.event, &pending, reason_code);
                if let Err(e) = self.bounded("mail", self.ports.mailer.send(email)).await {
                    error!(order_id, error = %e, "Failure email failed, keeping registration pending");
                    self.restore(pending).await;
                    return Err(e);
                }
                info!(event = %self.event.slug, order_id, reason = %reason_code, "Payment failed");
            }
        }

        Ok(CommitReceipt {
            order_id: order_id.to_string(),
            outcome,
        })
    }

    async fn restore(&self, pending: PendingRegistration) {
        let order_id = pending.order_id.clone();
        if let Err(e) = self.bounded("pending store", self.ports.pending.put(pending)).await {
            error!(order_id = %order_id, error = %e, "Failed to restore pending registration");
        }
    }

    /// Asks the gateway for the current state of `order_id`.
    pub async fn payment_status(&self, order_id: &str) -> Result<PaymentStatus> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(RegistrationError::ValidationError(
                "orderId is required".to_string(),
            ));
        }
        self.bounded("payment gateway", self.ports.gateway.status(order_id))
            .await
    }
}
