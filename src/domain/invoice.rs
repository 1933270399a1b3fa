use serde::{Deserialize, Serialize};

/// Everything the invoice template needs, already formatted for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub invoice_number: String,
    pub data: InvoiceData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceData {
    pub order_id: String,
    pub payment_detail: InvoicePaymentDetail,
    pub items: Vec<InvoiceItem>,
    pub total: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePaymentDetail {
    pub bank_name: String,
    pub payment_method: String,
    pub va_number: String,
    pub acquirer: Option<String>,
    pub date: String,
    pub is_paid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub price: String,
}
