use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use rand::Rng;

use crate::{
    domain::InvoiceRequest,
    error::{AppError, Result},
};

pub mod html;
pub mod pdf;

pub use html::HtmlInvoiceRenderer;
pub use pdf::PdfInvoiceRenderer;

pub const INVOICE_TEMPLATE: &str = "invoice";

#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    async fn render(&self, template: &str, invoice: &InvoiceRequest) -> Result<Vec<u8>>;

    /// Extension used for the stored document, without the dot.
    fn file_extension(&self) -> &'static str;
}

const INDONESIAN_MONTHS: [(&str, &str); 12] = [
    ("January", "Januari"),
    ("February", "Februari"),
    ("March", "Maret"),
    ("April", "April"),
    ("May", "Mei"),
    ("June", "Juni"),
    ("July", "Juli"),
    ("August", "Agustus"),
    ("September", "September"),
    ("October", "Oktober"),
    ("November", "November"),
    ("December", "Desember"),
];

pub fn indonesian_month(english: &str) -> Result<&'static str> {
    INDONESIAN_MONTHS
        .iter()
        .find(|(en, _)| *en == english)
        .map(|(_, id)| *id)
        .ok_or_else(|| AppError::Internal(format!("invalid month: {}", english)))
}

/// Western Indonesian Time, the default merchant clock.
pub const WIB_OFFSET_HOURS: i32 = 7;

pub fn wib() -> FixedOffset {
    FixedOffset::east_opt(WIB_OFFSET_HOURS * 3600).expect("UTC+7 is a valid offset")
}

/// Fixed offset east of UTC for invoice dates.
pub fn utc_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| AppError::Internal(format!("invalid invoice UTC offset: {} hours", hours)))
}

/// `05 Maret 2024`, on the clock `paid_at` carries.
pub fn format_paid_date<Tz>(paid_at: &DateTime<Tz>) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let month = indonesian_month(&paid_at.format("%B").to_string())?;
    Ok(format!("{} {} {}", paid_at.format("%d"), month, paid_at.format("%Y")))
}

/// `INV/2024-03-05/ORD/482913`. Uniqueness is checked by the caller.
pub fn generate_invoice_number<R: Rng + ?Sized>(today: NaiveDate, rng: &mut R) -> String {
    let suffix: u32 = rng.gen_range(100_000..=999_999);
    format!("INV/{}/ORD/{}", today.format("%Y-%m-%d"), suffix)
}

/// Object name for an invoice; path separators never reach the store.
pub fn invoice_filename(invoice_number: &str, extension: &str) -> String {
    format!("{}.{}", invoice_number.replace(['/', '\\'], "-"), extension)
}

/// `Rp 1.250.000`
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}
