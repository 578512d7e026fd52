use serde::{Deserialize, Serialize};

/// The stored invoice payload, as produced by the OCR pipeline.
///
/// Every field defaults: a record whose JSON is missing fields, or is not
/// parseable at all, still yields a usable (empty) payload instead of
/// aborting a listing or an export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoicePayload {
    #[serde(default)]
    pub sprzedawca: Party,
    #[serde(default)]
    pub nabywca: Party,
    #[serde(default)]
    pub numer_faktury: String,
    #[serde(default)]
    pub suma_netto: f64,
    #[serde(default)]
    pub suma_vat: f64,
    #[serde(default)]
    pub suma_brutto: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub nazwa: String,
}

impl InvoicePayload {
    /// Defensive extraction: malformed JSON yields the all-default payload.
    pub fn parse(json_data: &str) -> Self {
        serde_json::from_str(json_data).unwrap_or_default()
    }
}

/// What the listing endpoint returns per record.
#[derive(Debug, Serialize)]
pub struct InvoiceSummary {
    pub id: i64,
    pub sprzedawca: String,
    pub nabywca: String,
    pub wartosc_brutto: f64,
    pub numer_faktury: String,
}

/// Classification of an invoice relative to the export run's primary entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceKind {
    Sale,
    Purchase,
    Unclassified,
}

impl InvoiceKind {
    /// Label used in the export document's `typ` attribute.
    pub fn as_export_label(&self) -> &'static str {
        match self {
            InvoiceKind::Sale => "sprzedaz",
            InvoiceKind::Purchase => "zakup",
            InvoiceKind::Unclassified => "nieznany",
        }
    }
}
