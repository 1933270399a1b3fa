use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub midtrans: MidtransConfig,
    pub storage: StorageConfig,
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub invoice: InvoiceConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// How long a writer waits for SQLite's write lock. Settlements hold it
    /// through the invoice upload, so keep this above the upload timeout.
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Bearer token expected on the non-webhook payment routes.
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MidtransConfig {
    pub server_key: String,
    #[serde(default)]
    pub is_production: bool,
    /// Overrides the sandbox/production host, mostly for local mocks.
    pub base_url: Option<String>,
    #[serde(default)]
    pub verify_signature: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub upload_timeout_secs: u64,
    pub gcs: Option<GcsConfig>,
    pub local: Option<LocalStorageConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GcsConfig {
    pub bucket_name: String,
    /// Path to the service account key JSON file.
    pub credentials_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalStorageConfig {
    pub directory: String,
    pub public_base_url: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            directory: "invoices".to_string(),
            public_base_url: "http://localhost:8001/invoices".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers.
    pub brokers: String,
    pub topic: String,
    pub sender: String,
    /// Upper bound on waiting for a delivery report.
    pub message_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceFormat {
    Pdf,
    Html,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InvoiceConfig {
    #[serde(default = "default_invoice_format")]
    pub format: InvoiceFormat,
    /// Merchant clock for invoice numbers and paid dates, in hours east of UTC.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

fn default_invoice_format() -> InvoiceFormat {
    InvoiceFormat::Pdf
}

fn default_utc_offset_hours() -> i32 {
    crate::invoice::WIB_OFFSET_HOURS
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            format: default_invoice_format(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaymentConfig {
    /// Reject webhook statuses that do not follow Initial -> Pending -> {Settlement, Expired}.
    #[serde(default)]
    pub enforce_transitions: bool,
    /// Acknowledge a webhook without writes when the payment already has the incoming status.
    #[serde(default)]
    pub dedupe_webhooks: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8001)?
            .set_default("database.url", "sqlite://payment.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("database.busy_timeout_secs", 75)?
            .set_default("midtrans.is_production", false)?
            .set_default("midtrans.verify_signature", false)?
            .set_default("storage.backend", "local")?
            .set_default("storage.upload_timeout_secs", 60)?
            .set_default("kafka.brokers", "localhost:9092")?
            .set_default("kafka.sender", "payment-service")?
            .set_default("kafka.message_timeout_ms", 5000)?
            .set_default("invoice.format", "pdf")?
            .set_default("invoice.utc_offset_hours", 7)?
            .set_default("payment.enforce_transitions", false)?
            .set_default("payment.dedupe_webhooks", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with PAYMENT__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("PAYMENT").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8001,
            },
            database: DatabaseConfig {
                url: "sqlite://payment.db?mode=rwc".to_string(),
                max_connections: 10,
                busy_timeout_secs: 75,
            },
            auth: AuthConfig {
                api_key: "change-me-in-production".to_string(),
            },
            midtrans: MidtransConfig {
                server_key: String::new(),
                is_production: false,
                base_url: None,
                verify_signature: false,
            },
            storage: StorageConfig {
                backend: StorageBackend::Local,
                upload_timeout_secs: 60,
                gcs: None,
                local: Some(LocalStorageConfig::default()),
            },
            kafka: KafkaConfig {
                brokers: "localhost:9092".to_string(),
                topic: "payment-service-callback".to_string(),
                sender: "payment-service".to_string(),
                message_timeout_ms: 5000,
            },
            invoice: InvoiceConfig::default(),
            payment: PaymentConfig::default(),
        }
    }
}
