use async_trait::async_trait;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::{
    domain::InvoiceRequest,
    error::{AppError, Result},
    invoice::{InvoiceRenderer, INVOICE_TEMPLATE},
};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 7.0;
const BODY_SIZE: f32 = 11.0;
const HEADING_SIZE: f32 = 20.0;

/// Renders invoices as A4 PDF documents using the built-in Helvetica faces.
#[derive(Debug, Default, Clone)]
pub struct PdfInvoiceRenderer;

impl PdfInvoiceRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InvoiceRenderer for PdfInvoiceRenderer {
    async fn render(&self, template: &str, invoice: &InvoiceRequest) -> Result<Vec<u8>> {
        match template {
            INVOICE_TEMPLATE => render_invoice(invoice),
            other => Err(AppError::Render(format!("Unknown template: {}", other))),
        }
    }

    fn file_extension(&self) -> &'static str {
        "pdf"
    }
}

fn render_error(e: printpdf::Error) -> AppError {
    AppError::Render(format!("Failed to build PDF: {}", e))
}

/// Writes lines top to bottom, starting a new page when the margin is reached.
struct Cursor {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl Cursor {
    fn new(title: &str) -> Self {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Invoice");
        let layer = doc.get_page(page).get_layer(layer);
        Self {
            doc,
            layer,
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn line(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef) {
        if self.y < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Invoice");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        self.y -= LINE_HEIGHT * size / BODY_SIZE;
    }

    fn gap(&mut self) {
        self.y -= LINE_HEIGHT;
    }
}

fn render_invoice(invoice: &InvoiceRequest) -> Result<Vec<u8>> {
    let data = &invoice.data;
    let detail = &data.payment_detail;

    let mut cursor = Cursor::new(&invoice.invoice_number);
    let regular = cursor.doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_error)?;
    let bold = cursor.doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_error)?;

    cursor.line("INVOICE", HEADING_SIZE, MARGIN, &bold);
    cursor.line(&invoice.invoice_number, BODY_SIZE, MARGIN, &regular);
    cursor.line(if detail.is_paid { "LUNAS" } else { "BELUM LUNAS" }, BODY_SIZE, MARGIN, &bold);
    cursor.gap();

    cursor.line("Detail Pembayaran", BODY_SIZE, MARGIN, &bold);
    let mut fields = vec![
        ("Order ID", data.order_id.as_str()),
        ("Tanggal", detail.date.as_str()),
        ("Metode", detail.payment_method.as_str()),
        ("Bank", detail.bank_name.as_str()),
        ("No. VA", detail.va_number.as_str()),
    ];
    if let Some(acquirer) = detail.acquirer.as_deref() {
        fields.push(("Acquirer", acquirer));
    }
    for (label, value) in fields {
        let y = cursor.y;
        cursor.layer.use_text(label, BODY_SIZE, Mm(MARGIN), Mm(y), &regular);
        cursor.line(value, BODY_SIZE, MARGIN + 45.0, &regular);
    }
    cursor.gap();

    cursor.line("Rincian", BODY_SIZE, MARGIN, &bold);
    for item in &data.items {
        let y = cursor.y;
        cursor.layer.use_text(&item.description, BODY_SIZE, Mm(MARGIN), Mm(y), &regular);
        cursor.line(&item.price, BODY_SIZE, PAGE_WIDTH - MARGIN - 40.0, &regular);
    }
    cursor.gap();

    let y = cursor.y;
    cursor.layer.use_text("Total", BODY_SIZE, Mm(MARGIN), Mm(y), &bold);
    cursor.line(&data.total, BODY_SIZE, PAGE_WIDTH - MARGIN - 40.0, &bold);

    cursor.doc.save_to_bytes().map_err(render_error)
}
