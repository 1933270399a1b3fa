use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Settings,
    domain::*,
    error::{AppError, Result},
    events::EventPublisher,
    invoice::{self, InvoiceRenderer, INVOICE_TEMPLATE},
    payments::{PaymentGateway, PaymentLinkRequest},
    repository::{PaymentHistoryRepository, PaymentRepository, WriteTransaction},
    storage::BlobStorage,
};

const INVOICE_NUMBER_ATTEMPTS: usize = 5;

/// External systems the orchestrator talks to.
#[derive(Clone)]
pub struct PaymentCollaborators {
    pub gateway: Arc<dyn PaymentGateway>,
    pub storage: Arc<dyn BlobStorage>,
    pub renderer: Arc<dyn InvoiceRenderer>,
    pub publisher: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone)]
pub struct PaymentOptions {
    pub topic: String,
    pub sender: String,
    pub upload_timeout: Duration,
    pub enforce_transitions: bool,
    pub dedupe_webhooks: bool,
    /// Merchant clock used for invoice numbers and paid dates.
    pub invoice_offset: FixedOffset,
}

impl Default for PaymentOptions {
    fn default() -> Self {
        Self {
            topic: "payment-service-callback".to_string(),
            sender: "payment-service".to_string(),
            upload_timeout: Duration::from_secs(60),
            enforce_transitions: false,
            dedupe_webhooks: false,
            invoice_offset: invoice::wib(),
        }
    }
}

impl TryFrom<&Settings> for PaymentOptions {
    type Error = AppError;

    fn try_from(settings: &Settings) -> Result<Self> {
        Ok(Self {
            topic: settings.kafka.topic.clone(),
            sender: settings.kafka.sender.clone(),
            upload_timeout: Duration::from_secs(settings.storage.upload_timeout_secs),
            enforce_transitions: settings.payment.enforce_transitions,
            dedupe_webhooks: settings.payment.dedupe_webhooks,
            invoice_offset: invoice::utc_offset(settings.invoice.utc_offset_hours)?,
        })
    }
}

pub struct PaymentService {
    pool: SqlitePool,
    payment_repo: Arc<dyn PaymentRepository>,
    history_repo: Arc<dyn PaymentHistoryRepository>,
    collaborators: PaymentCollaborators,
    options: PaymentOptions,
}

impl PaymentService {
    pub fn new(
        pool: SqlitePool,
        payment_repo: Arc<dyn PaymentRepository>,
        history_repo: Arc<dyn PaymentHistoryRepository>,
        collaborators: PaymentCollaborators,
        options: PaymentOptions,
    ) -> Self {
        Self {
            pool,
            payment_repo,
            history_repo,
            collaborators,
            options,
        }
    }

    /// Opens a hosted payment link and records the payment in `Initial`.
    pub async fn create(&self, request: CreatePaymentRequest) -> Result<PaymentResponse> {
        request.validate()?;

        let now = Utc::now();
        if request.expired_at <= now {
            return Err(AppError::ExpiredAtInvalid);
        }

        let item = request
            .item_details
            .first()
            .cloned()
            .ok_or_else(|| AppError::Validation("item_details must not be empty".to_string()))?;

        let link = self
            .collaborators
            .gateway
            .create_payment_link(PaymentLinkRequest {
                order_id: request.order_id.clone(),
                gross_amount: request.amount,
                customer: request.customer_detail.clone(),
                item,
                expiry: ExpiryWindow::between(now, request.expired_at),
            })
            .await?;

        let new_payment = NewPayment {
            order_id: request.order_id.clone(),
            amount: request.amount,
            status: PaymentStatus::Initial,
            payment_link: link.redirect_url.clone(),
            description: request.description.clone(),
            expired_at: request.expired_at,
        };

        let payment = match self.record_new_payment(new_payment).await {
            Ok(payment) => payment,
            Err(e) => {
                // The gateway already holds an open link for this order.
                tracing::warn!(
                    "Payment link {} for order {} was created but not recorded: {}",
                    link.redirect_url,
                    request.order_id,
                    e
                );
                return Err(e);
            }
        };

        tracing::info!("Created payment {} for order {}", payment.uuid, payment.order_id);
        Ok(PaymentResponse::summary(&payment))
    }

    async fn record_new_payment(&self, new_payment: NewPayment) -> Result<Payment> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        match self.insert_payment(&mut tx, new_payment).await {
            Ok(payment) => {
                tx.commit().await?;
                Ok(payment)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn insert_payment(&self, conn: &mut SqliteConnection, new_payment: NewPayment) -> Result<Payment> {
        let payment = self.payment_repo.create(&mut *conn, new_payment).await?;
        self.history_repo
            .create(conn, payment.id, PaymentStatus::Initial)
            .await?;
        Ok(payment)
    }

    /// Applies a gateway notification. Everything up to and including the
    /// invoice upload commits or rolls back together; the event goes out
    /// only after commit.
    ///
    /// The write lock is taken before the lookup, so concurrent notifications
    /// queue on the database busy timeout rather than failing.
    pub async fn reconcile_webhook(&self, request: WebhookRequest) -> Result<()> {
        request.validate()?;

        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let (payment, paid_at) = match self.apply_webhook(&mut tx, &request).await {
            Ok(Some(applied)) => {
                tx.commit().await?;
                applied
            }
            Ok(None) => {
                rollback(tx).await;
                return Ok(());
            }
            Err(e) => {
                rollback(tx).await;
                return Err(e);
            }
        };

        let next = request.transaction_status;
        tracing::info!("Payment {} for order {} is now {}", payment.uuid, payment.order_id, next);

        self.publish_status(&payment, next, paid_at).await
    }

    /// Returns `None` when the notification is acknowledged without writes.
    async fn apply_webhook(
        &self,
        conn: &mut SqliteConnection,
        request: &WebhookRequest,
    ) -> Result<Option<(Payment, Option<DateTime<Utc>>)>> {
        let next = request.transaction_status;
        let now = Utc::now();

        let current = self
            .payment_repo
            .find_by_order_id(&mut *conn, &request.order_id)
            .await?
            .ok_or(AppError::PaymentNotFound)?;

        if self.options.dedupe_webhooks && current.status == next {
            tracing::info!(
                "Ignoring repeated {} notification for order {}",
                next,
                current.order_id
            );
            return Ok(None);
        }

        if self.options.enforce_transitions && !current.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        let paid_at = (next == PaymentStatus::Settlement).then_some(now);
        let va = request.va_numbers.first();
        let update = UpdatePayment {
            transaction_id: request.transaction_id.clone(),
            status: Some(next),
            va_number: va.map(|v| v.va_number.clone()),
            bank: va.map(|v| v.bank.clone()),
            acquirer: request.acquirer.clone(),
            paid_at,
            ..Default::default()
        };
        self.payment_repo
            .update(&mut *conn, &current.order_id, update)
            .await?;

        let payment = self
            .payment_repo
            .find_by_order_id(&mut *conn, &current.order_id)
            .await?
            .ok_or(AppError::PaymentNotFound)?;

        self.history_repo
            .create(&mut *conn, payment.id, next)
            .await?;

        if let Some(paid_at) = paid_at {
            self.attach_invoice(&mut *conn, &payment, &request.payment_type, paid_at)
                .await?;
        }

        Ok(Some((payment, paid_at)))
    }

    async fn attach_invoice(
        &self,
        conn: &mut SqliteConnection,
        payment: &Payment,
        payment_type: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<()> {
        let local_paid_at = paid_at.with_timezone(&self.options.invoice_offset);
        let invoice_number = self.allocate_invoice_number(conn, local_paid_at).await?;
        let total = invoice::format_rupiah(payment.amount);

        let request = InvoiceRequest {
            invoice_number: invoice_number.clone(),
            data: InvoiceData {
                order_id: payment.order_id.clone(),
                payment_detail: InvoicePaymentDetail {
                    bank_name: payment.bank.clone().unwrap_or_default(),
                    payment_method: payment_type.to_string(),
                    va_number: payment.va_number.clone().unwrap_or_default(),
                    acquirer: payment.acquirer.clone(),
                    date: invoice::format_paid_date(&local_paid_at)?,
                    is_paid: true,
                },
                items: vec![InvoiceItem {
                    description: payment
                        .description
                        .clone()
                        .unwrap_or_else(|| format!("Payment for order {}", payment.order_id)),
                    price: total.clone(),
                }],
                total,
            },
        };

        let renderer = &self.collaborators.renderer;
        let document = renderer.render(INVOICE_TEMPLATE, &request).await?;
        let filename = invoice::invoice_filename(&invoice_number, renderer.file_extension());

        let invoice_link = self
            .collaborators
            .storage
            .upload(&filename, document, self.options.upload_timeout)
            .await?;

        let update = UpdatePayment {
            invoice_link: Some(invoice_link),
            invoice_number: Some(invoice_number),
            ..Default::default()
        };
        self.payment_repo
            .update(conn, &payment.order_id, update)
            .await
    }

    async fn allocate_invoice_number(
        &self,
        conn: &mut SqliteConnection,
        paid_at: DateTime<FixedOffset>,
    ) -> Result<String> {
        for _ in 0..INVOICE_NUMBER_ATTEMPTS {
            let candidate = invoice::generate_invoice_number(paid_at.date_naive(), &mut rand::thread_rng());
            if !self.payment_repo.invoice_number_exists(&mut *conn, &candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!("Invoice number {} already taken, drawing again", candidate);
        }

        Err(AppError::Internal(
            "could not allocate a unique invoice number".to_string(),
        ))
    }

    async fn publish_status(
        &self,
        payment: &Payment,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let message = EventMessage::status_changed(
            payment,
            status,
            paid_at,
            &self.options.sender,
            Utc::now(),
        );
        let bytes = serde_json::to_vec(&message)
            .map_err(|e| AppError::Internal(format!("Failed to encode event: {}", e)))?;

        if let Err(e) = self
            .collaborators
            .publisher
            .produce(&self.options.topic, &bytes)
            .await
        {
            tracing::error!(
                "Payment {} committed as {} but the event was not published: {}",
                payment.order_id,
                status,
                e
            );
            return Err(e);
        }

        Ok(())
    }

    pub async fn list(&self, params: PaymentListParams) -> Result<PaginationResult<PaymentResponse>> {
        params.validate()?;

        let (payments, count) = self.payment_repo.list(&params).await?;
        let data = payments.into_iter().map(PaymentResponse::from).collect();

        Ok(PaginationResult::new(params.page, params.limit, count, data))
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<PaymentResponse> {
        self.payment_repo
            .find_by_uuid(uuid)
            .await?
            .map(PaymentResponse::from)
            .ok_or(AppError::PaymentNotFound)
    }

    pub async fn histories(&self, uuid: Uuid) -> Result<Vec<PaymentHistory>> {
        let payment = self
            .payment_repo
            .find_by_uuid(uuid)
            .await?
            .ok_or(AppError::PaymentNotFound)?;

        self.history_repo.list_by_payment(payment.id).await
    }
}

async fn rollback(tx: WriteTransaction) {
    if let Err(e) = tx.rollback().await {
        tracing::error!("Failed to roll back payment transaction: {}", e);
    }
}
