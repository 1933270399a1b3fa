#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use payment_service::{
    domain::{
        CreatePaymentRequest, CustomerDetail, InvoiceRequest, ItemDetail, PaymentStatus,
        VaNumber, WebhookRequest,
    },
    error::{AppError, Result},
    events::EventPublisher,
    invoice::InvoiceRenderer,
    payments::{PaymentGateway, PaymentLink, PaymentLinkRequest},
    repository::{SqlitePaymentHistoryRepository, SqlitePaymentRepository},
    service::{PaymentCollaborators, PaymentOptions, PaymentService},
    storage::BlobStorage,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

/// One connection that never recycles, so the in-memory database lives as
/// long as the pool does.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// A database file removed again when the test finishes.
pub struct TempDatabase {
    path: PathBuf,
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// File-backed pool with several connections, configured like the service.
pub async fn file_pool(connections: u32) -> anyhow::Result<(SqlitePool, TempDatabase)> {
    let path = std::env::temp_dir().join(format!("payment-test-{}.db", uuid::Uuid::new_v4()));
    let db = TempDatabase { path: path.clone() };

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new()
        .max_connections(connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok((pool, db))
}

#[derive(Default)]
pub struct FakeGateway {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub requests: Mutex<Vec<PaymentLinkRequest>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Gateway("gateway unavailable".to_string()));
        }

        let link = PaymentLink {
            token: format!("tok-{}", request.order_id),
            redirect_url: format!("https://pay.test/snap/{}", request.order_id),
        };
        self.requests.lock().unwrap().push(request);
        Ok(link)
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub fail: AtomicBool,
    pub hang: AtomicBool,
    /// Latency added to every successful upload.
    pub delay_ms: AtomicU64,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl BlobStorage for FakeStorage {
    async fn upload(&self, filename: &str, data: Vec<u8>, timeout: Duration) -> Result<String> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.hang.load(Ordering::SeqCst) {
            let stalled = tokio::time::sleep(Duration::from_secs(30));
            return match tokio::time::timeout(timeout, stalled).await {
                Ok(()) => Err(AppError::Storage("stalled upload finished".to_string())),
                Err(_) => Err(AppError::Storage("upload timed out".to_string())),
            };
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Storage("bucket unavailable".to_string()));
        }

        self.uploads.lock().unwrap().push((filename.to_string(), data));
        Ok(format!("https://storage.test/invoices/{}", filename))
    }
}

#[derive(Default)]
pub struct FakeRenderer {
    pub fail: AtomicBool,
    pub rendered: Mutex<Vec<InvoiceRequest>>,
}

#[async_trait]
impl InvoiceRenderer for FakeRenderer {
    async fn render(&self, _template: &str, invoice: &InvoiceRequest) -> Result<Vec<u8>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Render("renderer down".to_string()));
        }
        self.rendered.lock().unwrap().push(invoice.clone());
        Ok(b"%PDF-1.4 fake".to_vec())
    }

    fn file_extension(&self) -> &'static str {
        "pdf"
    }
}

#[derive(Default)]
pub struct FakePublisher {
    pub fail: AtomicBool,
    pub messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakePublisher {
    pub fn published(&self) -> Vec<serde_json::Value> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, bytes)| serde_json::from_slice(bytes).unwrap())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for FakePublisher {
    async fn produce(&self, topic: &str, message: &[u8]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Publish("broker unreachable".to_string()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), message.to_vec()));
        Ok(())
    }
}

pub struct TestHarness {
    pub pool: SqlitePool,
    pub service: Arc<PaymentService>,
    pub payment_repo: Arc<SqlitePaymentRepository>,
    pub history_repo: Arc<SqlitePaymentHistoryRepository>,
    pub gateway: Arc<FakeGateway>,
    pub storage: Arc<FakeStorage>,
    pub renderer: Arc<FakeRenderer>,
    pub publisher: Arc<FakePublisher>,
}

pub async fn harness() -> anyhow::Result<TestHarness> {
    harness_with(PaymentOptions::default()).await
}

pub async fn harness_with(options: PaymentOptions) -> anyhow::Result<TestHarness> {
    Ok(harness_on(test_pool().await?, options))
}

pub fn harness_on(pool: SqlitePool, options: PaymentOptions) -> TestHarness {
    let payment_repo = Arc::new(SqlitePaymentRepository::new(pool.clone()));
    let history_repo = Arc::new(SqlitePaymentHistoryRepository::new(pool.clone()));
    let gateway = Arc::new(FakeGateway::default());
    let storage = Arc::new(FakeStorage::default());
    let renderer = Arc::new(FakeRenderer::default());
    let publisher = Arc::new(FakePublisher::default());

    let service = Arc::new(PaymentService::new(
        pool.clone(),
        payment_repo.clone(),
        history_repo.clone(),
        PaymentCollaborators {
            gateway: gateway.clone(),
            storage: storage.clone(),
            renderer: renderer.clone(),
            publisher: publisher.clone(),
        },
        options,
    ));

    TestHarness {
        pool,
        service,
        payment_repo,
        history_repo,
        gateway,
        storage,
        renderer,
        publisher,
    }
}

pub fn create_request(order_id: &str, expires_in: chrono::Duration) -> CreatePaymentRequest {
    CreatePaymentRequest {
        order_id: order_id.to_string(),
        amount: 50_000,
        customer_detail: CustomerDetail {
            name: "Budi Santoso".to_string(),
            email: "budi@example.com".to_string(),
            phone: "081234567890".to_string(),
        },
        item_details: vec![
            ItemDetail {
                id: "court-a".to_string(),
                amount: 50_000,
                quantity: 1,
                name: "Court A booking".to_string(),
            },
            ItemDetail {
                id: "towel".to_string(),
                amount: 5_000,
                quantity: 2,
                name: "Towel".to_string(),
            },
        ],
        description: Some("Court A, 19:00-20:00".to_string()),
        expired_at: Utc::now() + expires_in,
    }
}

pub fn webhook(order_id: &str, status: PaymentStatus) -> WebhookRequest {
    WebhookRequest {
        order_id: order_id.to_string(),
        transaction_id: Some(format!("trx-{}", order_id)),
        transaction_status: status,
        va_numbers: vec![VaNumber {
            bank: "bca".to_string(),
            va_number: "12345".to_string(),
        }],
        acquirer: None,
        payment_type: "bank_transfer".to_string(),
        status_code: None,
        gross_amount: None,
        signature_key: None,
    }
}

pub async fn count(pool: &SqlitePool, table: &str) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(n)
}
