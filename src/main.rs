use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use std::time::Duration;
use ticketgate::application::service::{Ports, RegistrationService, spawn_pending_sweeper};
use ticketgate::config::Settings;
use ticketgate::domain::event::EventConfig;
use ticketgate::domain::ports::{MailerRef, PaymentGatewayRef, PendingStoreRef, RowStoreRef};
use ticketgate::infrastructure::csv_rows::CsvRowStore;
use ticketgate::infrastructure::google_auth::AccessTokenSourceRef;
use ticketgate::infrastructure::in_memory::{InMemoryPendingStore, InMemoryRowStore, MailOutbox};
use ticketgate::infrastructure::mail_api::HttpMailer;
use ticketgate::infrastructure::phonepe::PhonePeGateway;
#[cfg(feature = "storage-rocksdb")]
use ticketgate::infrastructure::rocksdb::RocksDBPendingStore;
use ticketgate::infrastructure::sheets::SheetsRowStore;
use ticketgate::interfaces::http::router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const PENDING_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Parser)]
#[command(author, version, about = "Event registration and payment backend", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,
}

fn pending_store(settings: &Settings) -> Result<PendingStoreRef> {
    match &settings.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            let store = RocksDBPendingStore::open(db_path).into_diagnostic()?;
            info!(path = %db_path.display(), "pending registrations stored in RocksDB");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryPendingStore::new()))
        }
        None => Ok(Arc::new(InMemoryPendingStore::new())),
    }
}

fn row_store(
    settings: &Settings,
    tokens: Option<&AccessTokenSourceRef>,
    event: &EventConfig,
) -> Result<RowStoreRef> {
    if let (Some(tokens), Some(sheet_id)) = (tokens, &event.sheet_id) {
        let store = SheetsRowStore::new(
            settings.sheets.sheets_api_url.clone(),
            sheet_id.clone(),
            settings.sheets.sheets_range.clone(),
            tokens.clone(),
            settings.upstream_timeout(),
        )
        .into_diagnostic()?;
        info!(event = %event.slug, sheet_id = %sheet_id, "registrations written to Google Sheets");
        return Ok(Arc::new(store));
    }

    if let Some(dir) = &settings.rows_dir {
        let store = CsvRowStore::in_dir(dir, &event.slug).into_diagnostic()?;
        info!(event = %event.slug, path = %store.path().display(), "registrations written to CSV");
        return Ok(Arc::new(store));
    }

    warn!(event = %event.slug, "no sheet configured, registrations are kept in memory only");
    Ok(Arc::new(InMemoryRowStore::new()))
}

fn mailer(settings: &Settings) -> Result<MailerRef> {
    match &settings.mail.mail_api_key {
        Some(key) => {
            let mailer = HttpMailer::new(
                settings.mail.mail_api_url.clone(),
                key.clone(),
                settings.mail.mail_sender_email.clone(),
                Some(settings.mail.mail_sender_name.clone()),
                settings.upstream_timeout(),
            )
            .into_diagnostic()?;
            Ok(Arc::new(mailer))
        }
        None => {
            warn!("MAIL_API_KEY not set, emails are logged instead of sent");
            Ok(Arc::new(MailOutbox::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Cli::parse().settings;
    settings.validate().into_diagnostic()?;

    let pending = pending_store(&settings)?;
    let sweeper = spawn_pending_sweeper(pending.clone(), settings.pending_ttl(), PENDING_SWEEP_INTERVAL);
    let sheets_tokens = settings.sheets_tokens().into_diagnostic()?;
    let mailer = mailer(&settings)?;
    let gateway: PaymentGatewayRef = Arc::new(
        PhonePeGateway::new(
            settings.gateway.phonepe_api_url.clone(),
            settings.gateway.phonepe_mid.clone(),
            settings.checksum_signer(),
            settings.upstream_timeout(),
        )
        .into_diagnostic()?,
    );

    // Pending entries carry their event, so all events share one store.
    // The Sheets token cache is shared too.
    let mut services = Vec::new();
    for event in settings.events() {
        let ports = Ports {
            pending: pending.clone(),
            rows: row_store(&settings, sheets_tokens.as_ref(), &event)?,
            mailer: mailer.clone(),
            gateway: gateway.clone(),
        };
        info!(event = %event.slug, mount = %event.mount_path, "serving event");
        let service = RegistrationService::new(
            event,
            settings.public_urls(),
            settings.checksum_signer(),
            ports,
        )
        .with_upstream_timeout(settings.upstream_timeout());
        services.push(Arc::new(service));
    }

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&addr).await.into_diagnostic()?;
    info!("listening on {addr}");

    axum::serve(listener, router(services))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    sweeper.abort();
    Ok(())
}
