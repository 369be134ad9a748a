//! # Raw Document Views
//!
//! Lenient typed views over the JSON documents the POS nodes return.
//!
//! ## Why Lenient?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FIELD DRIFT ACROSS NODES AND CATEGORIES                                │
//! │                                                                         │
//! │  Node "centro":  { "documentNumber": "A-0001", "total": 750.0 }        │
//! │  Node "norte":   { "number": "A-0001", "importe": "750,00" }           │
//! │                                                                         │
//! │  Same logical document, different spellings and value types.           │
//! │  A strict schema would reject half the fleet. Every view here uses     │
//! │  serde defaults + aliases + value-coercing deserializers so a missing  │
//! │  or malformed field means "no match", never a failed run.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The canonicalizer decides what to do with documents whose essential
//! fields (number, date) stay empty after this pass: they are skipped and
//! counted, not errored.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Document Category
// =============================================================================

/// The three upstream document categories fetched per day and node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocCategory {
    /// Sales-side documents: invoices, credit/debit notes, transfers.
    Invoices,
    /// Supplier and service expenses.
    Expenses,
    /// Explicit insurance coverage receipts.
    Insurance,
}

impl DocCategory {
    /// All categories, in fetch order.
    pub const ALL: [DocCategory; 3] = [
        DocCategory::Invoices,
        DocCategory::Expenses,
        DocCategory::Insurance,
    ];

    /// URL path segment for this category.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocCategory::Invoices => "invoices",
            DocCategory::Expenses => "expenses",
            DocCategory::Insurance => "insurance",
        }
    }
}

impl fmt::Display for DocCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Raw Document
// =============================================================================

/// One fetched JSON document, tagged with where it came from.
///
/// The payload stays untyped until the canonicalizer projects it through
/// the category-specific view below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub category: DocCategory,
    /// Node code the document was fetched from.
    pub node: String,
    /// Branch the node belongs to.
    pub branch: String,
    pub payload: Value,
}

// =============================================================================
// Coercing Deserializers
// =============================================================================

/// Accepts strings, numbers and booleans where a string is expected.
/// Some nodes send document numbers as JSON numbers.
fn de_flexible_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Accepts numbers and numeric strings where an amount is expected.
/// Handles both `1234.56` and the comma-decimal spelling `1.234,56`.
fn de_flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_decimal_str(&s),
        _ => 0.0,
    })
}

/// Accepts booleans, 0/1 numbers and truthy strings.
fn de_flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => {
            let lowered = s.trim().to_lowercase();
            matches!(lowered.as_str(), "true" | "1" | "si" | "sí" | "yes")
        }
        _ => false,
    })
}

/// Accepts arrays and null where an array is expected. Some nodes send
/// `"payments": null` instead of an empty list.
fn de_flexible_array<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

/// Parses a decimal string in either dot-decimal or comma-decimal notation.
fn parse_decimal_str(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let normalized = if trimmed.contains(',') && trimmed.contains('.') {
        // "1.234,56" → thousands dots, comma decimal
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.replace(',', ".")
    };
    normalized.parse().unwrap_or(0.0)
}

// =============================================================================
// Date Parsing
// =============================================================================

/// Parses the date spellings observed across the fleet.
///
/// Accepted: RFC3339, naive `YYYY-MM-DDTHH:MM:SS` (space separator too),
/// date-only `YYYY-MM-DD`, and `DD/MM/YYYY`.
///
/// Date-only values, and timestamps that land exactly on midnight, are
/// anchored to 12:00 UTC. A midnight timestamp is a date pretending to be a
/// datetime, and anchoring keeps timezone display math from shifting the
/// document into the neighboring day.
pub fn parse_flexible_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(anchor_midnight(parsed.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(anchor_midnight(Utc.from_utc_datetime(&naive)));
        }
    }

    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            let midday = date.and_hms_opt(12, 0, 0)?;
            return Some(Utc.from_utc_datetime(&midday));
        }
    }

    None
}

fn anchor_midnight(ts: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::Timelike;
    if ts.hour() == 0 && ts.minute() == 0 && ts.second() == 0 && ts.nanosecond() == 0 {
        ts + chrono::Duration::hours(12)
    } else {
        ts
    }
}

// =============================================================================
// Invoice View
// =============================================================================

/// Lenient view of a sales-side document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawInvoice {
    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "documentNumber",
        alias = "voucherNumber",
        alias = "nro",
        alias = "comprobante"
    )]
    pub number: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "documentType",
        alias = "voucherType",
        alias = "type",
        alias = "tipo"
    )]
    pub doc_type: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "issuedAt",
        alias = "emissionDate",
        alias = "issueDate",
        alias = "fecha"
    )]
    pub date: String,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "totalAmount",
        alias = "amount",
        alias = "importe"
    )]
    pub total: f64,

    /// Net amount; zero when the node does not send one (net = gross then).
    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "netAmount",
        alias = "netTotal",
        alias = "neto"
    )]
    pub net: f64,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "salesman",
        alias = "sellerName",
        alias = "vendedor"
    )]
    pub seller: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "customer",
        alias = "customerName",
        alias = "cliente"
    )]
    pub client: String,

    /// Payer entity type; empty means private individual.
    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "clientType",
        alias = "entityType",
        alias = "tipoCliente"
    )]
    pub entity: String,

    /// Payment agreement entries, kept untyped so one malformed entry
    /// cannot sink its siblings.
    #[serde(
        deserialize_with = "de_flexible_array",
        alias = "payments",
        alias = "paymentAgreements",
        alias = "pagos",
        alias = "mediosDePago"
    )]
    pub agreements: Vec<Value>,

    /// Line items, kept untyped for the same reason.
    #[serde(
        deserialize_with = "de_flexible_array",
        alias = "items",
        alias = "details",
        alias = "detalle",
        alias = "renglones"
    )]
    pub lines: Vec<Value>,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "coverageAmount",
        alias = "insuranceCoverage",
        alias = "cobertura"
    )]
    pub coverage: f64,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "institutionName",
        alias = "obraSocial",
        alias = "insurer"
    )]
    pub institution: String,
}

impl RawInvoice {
    /// Projects a JSON value into this view; anything unprojectable becomes
    /// the empty default (and is later skipped for having no number).
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// =============================================================================
// Payment Agreement View
// =============================================================================

/// Lenient view of one payment agreement entry inside an invoice.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAgreement {
    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "paymentType",
        alias = "type",
        alias = "tipo",
        alias = "descripcion"
    )]
    pub type_name: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "typeCode",
        alias = "paymentCode",
        alias = "codigo"
    )]
    pub code: String,

    /// Card sub-type / brand. Wallet brands hide here on some nodes.
    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "cardType",
        alias = "cardBrand",
        alias = "marca"
    )]
    pub sub_type: String,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "value",
        alias = "total",
        alias = "importe",
        alias = "monto"
    )]
    pub amount: f64,

    #[serde(
        deserialize_with = "de_flexible_bool",
        alias = "voided",
        alias = "isCancelled",
        alias = "anulado"
    )]
    pub cancelled: bool,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "state",
        alias = "estado"
    )]
    pub status: String,
}

impl RawAgreement {
    /// Projects a JSON value into this view.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// True when either the boolean flag or the status string marks this
    /// entry as voided.
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled {
            return true;
        }
        let lowered = self.status.to_lowercase();
        lowered.contains("anul") || lowered.contains("cancel") || lowered.contains("void")
    }
}

// =============================================================================
// Line Item View
// =============================================================================

/// Lenient view of one invoice line item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawLineItem {
    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "productName",
        alias = "description",
        alias = "name",
        alias = "producto"
    )]
    pub product: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "ean",
        alias = "codebar",
        alias = "codigoBarras"
    )]
    pub barcode: String,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "qty",
        alias = "units",
        alias = "cantidad"
    )]
    pub quantity: f64,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "price",
        alias = "precioUnitario",
        alias = "precio"
    )]
    pub unit_price: f64,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "lineTotal",
        alias = "subtotal",
        alias = "importe"
    )]
    pub total: f64,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "categoryName",
        alias = "rubro",
        alias = "categoria"
    )]
    pub category: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "labName",
        alias = "laboratory",
        alias = "laboratorio"
    )]
    pub manufacturer: String,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "unitCost",
        alias = "costo"
    )]
    pub cost: f64,
}

impl RawLineItem {
    /// Projects a JSON value into this view.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// A line with neither product name nor barcode cannot be attributed
    /// to anything and is dropped by the canonicalizer.
    pub fn has_identity(&self) -> bool {
        !self.product.trim().is_empty() || !self.barcode.trim().is_empty()
    }
}

// =============================================================================
// Expense View
// =============================================================================

/// Lenient view of an expense document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawExpense {
    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "supplierName",
        alias = "providerName",
        alias = "vendor",
        alias = "proveedor"
    )]
    pub supplier: String,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "total",
        alias = "amountDue",
        alias = "importe",
        alias = "monto"
    )]
    pub amount: f64,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "issuedAt",
        alias = "emissionDate",
        alias = "fecha"
    )]
    pub date: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "dueDate",
        alias = "expiration",
        alias = "vencimiento"
    )]
    pub due: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "state",
        alias = "paymentStatus",
        alias = "estado"
    )]
    pub status: String,

    /// Free-text concept line; helps classify operating services.
    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "description",
        alias = "detail",
        alias = "concepto"
    )]
    pub concept: String,
}

impl RawExpense {
    /// Projects a JSON value into this view.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// =============================================================================
// Insurance Receipt View
// =============================================================================

/// Lenient view of an explicit insurance coverage receipt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawInsurance {
    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "receiptNumber",
        alias = "nro",
        alias = "comprobante"
    )]
    pub number: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "institutionName",
        alias = "insurer",
        alias = "planName",
        alias = "obraSocial"
    )]
    pub institution: String,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "coverageAmount",
        alias = "covered",
        alias = "cobertura"
    )]
    pub coverage: f64,

    #[serde(
        deserialize_with = "de_flexible_f64",
        alias = "copayAmount",
        alias = "patientShare",
        alias = "coseguro"
    )]
    pub copay: f64,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "affiliateNumber",
        alias = "memberId",
        alias = "afiliado"
    )]
    pub affiliate: String,

    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "issuedAt",
        alias = "emissionDate",
        alias = "fecha"
    )]
    pub date: String,

    /// Sales document this receipt belongs to. Used to suppress projected
    /// receipts when the explicit one exists.
    #[serde(
        deserialize_with = "de_flexible_string",
        alias = "invoiceNumber",
        alias = "saleNumber",
        alias = "factura"
    )]
    pub document_number: String,
}

impl RawInsurance {
    /// Projects a JSON value into this view.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
