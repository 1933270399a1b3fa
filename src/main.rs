use std::{str::FromStr, sync::Arc, time::Duration};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payment_service::{
    api,
    config::{InvoiceFormat, Settings, StorageBackend},
    events::KafkaPublisher,
    invoice::{HtmlInvoiceRenderer, InvoiceRenderer, PdfInvoiceRenderer},
    payments::MidtransClient,
    repository::{SqlitePaymentHistoryRepository, SqlitePaymentRepository},
    service::{PaymentCollaborators, PaymentOptions, PaymentService},
    storage::{BlobStorage, GcsStorage, LocalStorage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payment_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting payment service on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let connect_options = SqliteConnectOptions::from_str(&settings.database.url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(settings.database.busy_timeout_secs));
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect_with(connect_options)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let payment_repo = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
    let history_repo = Arc::new(SqlitePaymentHistoryRepository::new(db_pool.clone()));

    let gateway = match settings.midtrans.base_url.clone() {
        Some(base_url) => MidtransClient::with_base_url(settings.midtrans.server_key.clone(), base_url),
        None => MidtransClient::new(settings.midtrans.server_key.clone(), settings.midtrans.is_production),
    };
    if settings.midtrans.server_key.is_empty() {
        tracing::warn!("midtrans.server_key is empty, payment link creation will fail");
    }

    let collaborators = PaymentCollaborators {
        gateway: Arc::new(gateway),
        storage: build_storage(&settings)?,
        renderer: build_renderer(&settings),
        publisher: Arc::new(KafkaPublisher::new(
            &settings.kafka.brokers,
            Duration::from_millis(settings.kafka.message_timeout_ms),
        )?),
    };
    tracing::info!("Publishing status events to {} on {}", settings.kafka.topic, settings.kafka.brokers);

    let payment_service = Arc::new(PaymentService::new(
        db_pool,
        payment_repo,
        history_repo,
        collaborators,
        PaymentOptions::try_from(&settings)?,
    ));

    let app = api::create_app(payment_service, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_storage(settings: &Settings) -> anyhow::Result<Arc<dyn BlobStorage>> {
    match settings.storage.backend {
        StorageBackend::Gcs => {
            let gcs = settings
                .storage
                .gcs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("storage.backend is gcs but [storage.gcs] is missing"))?;
            tracing::info!("Storing invoices in bucket {}", gcs.bucket_name);
            Ok(Arc::new(GcsStorage::from_key_file(
                gcs.bucket_name.clone(),
                &gcs.credentials_path,
            )?))
        }
        StorageBackend::Local => {
            let local = settings.storage.local.clone().unwrap_or_default();
            tracing::info!("Storing invoices under {}", local.directory);
            Ok(Arc::new(LocalStorage::new(&local.directory, &local.public_base_url)))
        }
    }
}

fn build_renderer(settings: &Settings) -> Arc<dyn InvoiceRenderer> {
    match settings.invoice.format {
        InvoiceFormat::Pdf => Arc::new(PdfInvoiceRenderer::new()),
        InvoiceFormat::Html => Arc::new(HtmlInvoiceRenderer::new()),
    }
}
