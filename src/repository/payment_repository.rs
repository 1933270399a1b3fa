use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqliteConnection, SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{NewPayment, Payment, PaymentListParams, PaymentStatus, UpdatePayment},
    error::{AppError, Result},
    repository::PaymentRepository,
};

const PAYMENT_COLUMNS: &str = r#"
    id, uuid, order_id, amount, status, payment_link, invoice_link,
    invoice_number, transaction_id, va_number, bank, acquirer, description,
    paid_at, expired_at, created_at, updated_at
"#;

#[derive(FromRow)]
struct PaymentRow {
    id: i64,
    uuid: String,
    order_id: String,
    amount: i64,
    status: i32,
    payment_link: String,
    invoice_link: Option<String>,
    invoice_number: Option<String>,
    transaction_id: Option<String>,
    va_number: Option<String>,
    bank: Option<String>,
    acquirer: Option<String>,
    description: Option<String>,
    paid_at: Option<NaiveDateTime>,
    expired_at: NaiveDateTime,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: row.id,
            uuid: Uuid::parse_str(&row.uuid).map_err(|e| AppError::Database(e.to_string()))?,
            order_id: row.order_id,
            amount: row.amount,
            status: PaymentStatus::try_from(row.status)
                .map_err(|e| AppError::Database(e.to_string()))?,
            payment_link: row.payment_link,
            invoice_link: row.invoice_link,
            invoice_number: row.invoice_number,
            transaction_id: row.transaction_id,
            va_number: row.va_number,
            bank: row.bank,
            acquirer: row.acquirer,
            description: row.description,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            expired_at: DateTime::from_naive_utc_and_offset(row.expired_at, Utc),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, conn: &mut SqliteConnection, payment: NewPayment) -> Result<Payment> {
        let uuid_str = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                uuid, order_id, amount, status, payment_link, description,
                expired_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(&uuid_str)
        .bind(&payment.order_id)
        .bind(payment.amount)
        .bind(payment.status.code())
        .bind(&payment.payment_link)
        .bind(&payment.description)
        .bind(payment.expired_at.naive_utc())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to retrieve created payment: {}", e)))?;

        Self::row_to_payment(row)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE uuid = ?",
            PAYMENT_COLUMNS
        ))
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None)
        }
    }

    async fn find_by_order_id(&self, conn: &mut SqliteConnection, order_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE order_id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None)
        }
    }

    async fn invoice_number_exists(&self, conn: &mut SqliteConnection, invoice_number: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments WHERE invoice_number = ?"
        )
        .bind(invoice_number)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    async fn update(&self, conn: &mut SqliteConnection, order_id: &str, update: UpdatePayment) -> Result<()> {
        let now = Utc::now().naive_utc();

        // COALESCE keeps the stored value for every field the caller left out,
        // so an invoice link is never cleared once written.
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET transaction_id = COALESCE(?, transaction_id),
                status = COALESCE(?, status),
                va_number = COALESCE(?, va_number),
                bank = COALESCE(?, bank),
                acquirer = COALESCE(?, acquirer),
                paid_at = COALESCE(?, paid_at),
                invoice_link = COALESCE(?, invoice_link),
                invoice_number = COALESCE(?, invoice_number),
                updated_at = ?
            WHERE order_id = ?
            "#
        )
        .bind(&update.transaction_id)
        .bind(update.status.map(PaymentStatus::code))
        .bind(&update.va_number)
        .bind(&update.bank)
        .bind(&update.acquirer)
        .bind(update.paid_at.map(|dt| dt.naive_utc()))
        .bind(&update.invoice_link)
        .bind(&update.invoice_number)
        .bind(now)
        .bind(order_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::PaymentNotFound);
        }

        Ok(())
    }

    async fn list(&self, params: &PaymentListParams) -> Result<(Vec<Payment>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Column and direction come from closed enums, never from raw input.
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments ORDER BY {} {}, id {} LIMIT ? OFFSET ?",
            PAYMENT_COLUMNS,
            params.sort_column.as_sql(),
            params.sort_order.as_sql(),
            params.sort_order.as_sql(),
        ))
        .bind(params.limit)
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let payments = rows.into_iter()
            .map(Self::row_to_payment)
            .collect::<Result<Vec<_>>>()?;

        Ok((payments, total))
    }
}
