use askama::Template;
use async_trait::async_trait;

use crate::{
    domain::InvoiceRequest,
    error::{AppError, Result},
    invoice::{InvoiceRenderer, INVOICE_TEMPLATE},
};

#[derive(Template)]
#[template(path = "invoice.html")]
struct InvoiceTemplate<'a> {
    invoice: &'a InvoiceRequest,
}

/// Renders invoices as standalone HTML documents.
#[derive(Debug, Default, Clone)]
pub struct HtmlInvoiceRenderer;

impl HtmlInvoiceRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InvoiceRenderer for HtmlInvoiceRenderer {
    async fn render(&self, template: &str, invoice: &InvoiceRequest) -> Result<Vec<u8>> {
        let html = match template {
            INVOICE_TEMPLATE => InvoiceTemplate { invoice }.render(),
            other => return Err(AppError::Render(format!("Unknown template: {}", other))),
        };

        html.map(String::into_bytes)
            .map_err(|e| AppError::Render(format!("Failed to render template: {}", e)))
    }

    fn file_extension(&self) -> &'static str {
        "html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InvoiceData, InvoiceItem, InvoicePaymentDetail};

    fn invoice() -> InvoiceRequest {
        InvoiceRequest {
            invoice_number: "INV/2024-03-05/ORD/123456".to_string(),
            data: InvoiceData {
                order_id: "ORD-1".to_string(),
                payment_detail: InvoicePaymentDetail {
                    bank_name: "bca".to_string(),
                    payment_method: "bank_transfer".to_string(),
                    va_number: "12345".to_string(),
                    acquirer: None,
                    date: "05 Maret 2024".to_string(),
                    is_paid: true,
                },
                items: vec![InvoiceItem {
                    description: "Booking <Lapangan A>".to_string(),
                    price: "Rp 50.000".to_string(),
                }],
                total: "Rp 50.000".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn renders_invoice_fields() {
        let bytes = HtmlInvoiceRenderer::new()
            .render(INVOICE_TEMPLATE, &invoice())
            .await
            .unwrap();
        let html = String::from_utf8(bytes).unwrap();

        // askama escapes '/' in HTML output
        assert!(html.contains("INV&#x2f;2024-03-05&#x2f;ORD&#x2f;123456"));
        assert!(html.contains("ORD-1"));
        assert!(html.contains("05 Maret 2024"));
        assert!(html.contains("12345"));
        assert!(html.contains("Rp 50.000"));
        assert!(html.contains("LUNAS"));
        // descriptions are escaped
        assert!(html.contains("Booking &lt;Lapangan A&gt;"));
    }

    #[tokio::test]
    async fn unknown_template_is_rejected() {
        let err = HtmlInvoiceRenderer::new()
            .render("receipt", &invoice())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Render(_)));
    }
}
