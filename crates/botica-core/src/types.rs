//! # Domain Types
//!
//! Canonical entities produced by the normalization pipeline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Canonical Entities                               │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Invoice     │   │    SaleLine     │   │  ExpenseRecord  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (derived)   │   │  id (UUID)      │   │  id (derived)   │       │
//! │  │  kind           │   │  invoice_id(FK) │   │  supplier       │       │
//! │  │  gross_cents    │   │  product_name   │   │  status/kind    │       │
//! │  │  5 pay buckets  │   │  line_total     │   │  amount_cents   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │InsuranceReceipt │   │  PayrollEntry   │   │PaymentBreakdown │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  institution    │   │  employee       │   │  cash/card/     │       │
//! │  │  coverage/copay │   │  amount_cents   │   │  wallet/ins/    │       │
//! │  │  origin         │   │  paid_at        │   │  account        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity Pattern
//! - `Invoice.id` / `ExpenseRecord.id`: DERIVED strings, stable across
//!   re-pulls of the same upstream document (re-running a sync replaces
//!   rather than duplicates)
//! - `SaleLine.id` / `PayrollEntry.id`: UUID v4 surrogates (lines are always
//!   replaced together with their owning invoice, so stability is not needed)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Payment Instrument
// =============================================================================

/// The five payment buckets every document amount is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    /// Physical cash, and the default for anything unclassifiable.
    Cash,
    /// Credit or debit card on a terminal.
    Card,
    /// Digital wallet (app-based payment brands).
    Wallet,
    /// Insurance institution coverage.
    Insurance,
    /// Running customer account (institutional credit).
    Account,
}

impl Instrument {
    /// All instruments in tie-break precedence order.
    ///
    /// When two buckets hold the same amount, the earlier instrument in this
    /// order is reported as dominant, so labels are stable across runs.
    pub const ALL: [Instrument; 5] = [
        Instrument::Cash,
        Instrument::Card,
        Instrument::Wallet,
        Instrument::Insurance,
        Instrument::Account,
    ];

    /// Human-readable label used for `Invoice.payment_label`.
    pub const fn label(&self) -> &'static str {
        match self {
            Instrument::Cash => "Cash",
            Instrument::Card => "Card",
            Instrument::Wallet => "Wallet",
            Instrument::Insurance => "Insurance",
            Instrument::Account => "Account",
        }
    }
}

// =============================================================================
// Payment Breakdown
// =============================================================================

/// The classified amounts of one document (or an aggregate of many).
///
/// The conservation invariant for a single unflagged document is:
/// `cash + card + wallet + insurance + account == gross`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentBreakdown {
    pub cash_cents: i64,
    pub card_cents: i64,
    pub wallet_cents: i64,
    pub insurance_cents: i64,
    pub account_cents: i64,
}

impl PaymentBreakdown {
    /// Adds an amount to the bucket for `instrument`.
    pub fn add(&mut self, instrument: Instrument, amount: Money) {
        match instrument {
            Instrument::Cash => self.cash_cents += amount.cents(),
            Instrument::Card => self.card_cents += amount.cents(),
            Instrument::Wallet => self.wallet_cents += amount.cents(),
            Instrument::Insurance => self.insurance_cents += amount.cents(),
            Instrument::Account => self.account_cents += amount.cents(),
        }
    }

    /// Returns the bucket amount for `instrument`.
    pub fn amount(&self, instrument: Instrument) -> Money {
        let cents = match instrument {
            Instrument::Cash => self.cash_cents,
            Instrument::Card => self.card_cents,
            Instrument::Wallet => self.wallet_cents,
            Instrument::Insurance => self.insurance_cents,
            Instrument::Account => self.account_cents,
        };
        Money::from_cents(cents)
    }

    /// Sum of all five buckets.
    pub fn total(&self) -> Money {
        Money::from_cents(
            self.cash_cents
                + self.card_cents
                + self.wallet_cents
                + self.insurance_cents
                + self.account_cents,
        )
    }

    /// True when every bucket is zero.
    pub fn is_zero(&self) -> bool {
        self.total().is_zero()
            && self.cash_cents == 0
            && self.card_cents == 0
            && self.wallet_cents == 0
            && self.insurance_cents == 0
            && self.account_cents == 0
    }

    /// The instrument holding the largest amount.
    ///
    /// Ties resolve to the earlier entry in [`Instrument::ALL`]. An all-zero
    /// breakdown therefore reports `Cash`.
    pub fn dominant(&self) -> Instrument {
        let mut best = Instrument::ALL[0];
        let mut best_amount = self.amount(best);
        for instrument in Instrument::ALL.iter().skip(1) {
            let amount = self.amount(*instrument);
            if amount > best_amount {
                best = *instrument;
                best_amount = amount;
            }
        }
        best
    }

    /// Display label of the dominant instrument.
    pub fn dominant_label(&self) -> &'static str {
        self.dominant().label()
    }

    /// Accumulates another breakdown into this one (rollup aggregation).
    pub fn merge(&mut self, other: &PaymentBreakdown) {
        self.cash_cents += other.cash_cents;
        self.card_cents += other.card_cents;
        self.wallet_cents += other.wallet_cents;
        self.insurance_cents += other.insurance_cents;
        self.account_cents += other.account_cents;
    }
}

// =============================================================================
// Document Kind
// =============================================================================

/// The normalized kind of an upstream document.
///
/// Upstream nodes report free-text type strings ("FACTURA B", "NOTA DE
/// CREDITO A", ...); [`DocumentKind::from_type_name`] collapses them into
/// these four kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Regular sale document (the only kind that contributes revenue).
    Sale,
    /// Credit note / return. Accumulates into credit exposure, never netted.
    CreditNote,
    /// Stock movement between branches. Excluded from every financial total.
    InternalTransfer,
    /// Debit note (charge adjustment).
    DebitNote,
}

/// Type-string fragments that mark an inter-branch movement.
const TRANSFER_KEYWORDS: &[&str] = &["transfer", "traslado", "remito interno", "movimiento interno"];

/// Type-string fragments that mark a credit note or return.
const CREDIT_KEYWORDS: &[&str] = &["credito", "crédito", "credit", "devolucion", "devolución"];

/// Type-string fragments that mark a debit note.
const DEBIT_KEYWORDS: &[&str] = &["debito", "débito", "debit"];

impl DocumentKind {
    /// Classifies a raw document type string.
    ///
    /// Matching is case-insensitive substring containment. Anything that is
    /// not recognizably a credit note, debit note or internal transfer is a
    /// sale: branch operators invent new sale type labels far more often
    /// than new adjustment labels.
    pub fn from_type_name(type_name: &str) -> Self {
        let lowered = type_name.to_lowercase();
        if TRANSFER_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            DocumentKind::InternalTransfer
        } else if CREDIT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            DocumentKind::CreditNote
        } else if DEBIT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            DocumentKind::DebitNote
        } else {
            DocumentKind::Sale
        }
    }

    /// Short tag used as the prefix of derived invoice ids.
    pub const fn tag(&self) -> &'static str {
        match self {
            DocumentKind::Sale => "sale",
            DocumentKind::CreditNote => "credit",
            DocumentKind::InternalTransfer => "transfer",
            DocumentKind::DebitNote => "debit",
        }
    }
}

impl Default for DocumentKind {
    fn default() -> Self {
        DocumentKind::Sale
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A canonical sales-side document (sale, credit note, transfer or debit
/// note) after normalization, classification and reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    /// Derived identity: `<kind-tag>:<normalized document number>`.
    /// Stable across re-pulls, so syncing twice replaces instead of
    /// duplicating.
    pub id: String,

    /// Upstream document number, trimmed and uppercased.
    pub document_number: String,

    /// Normalized document kind.
    pub kind: DocumentKind,

    /// Document timestamp (UTC). Date-only upstream values are anchored to
    /// 12:00 UTC so timezone display shifts cannot move them across days.
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,

    /// Reporting period, `YYYY-MM` of `issued_at`.
    pub period_key: String,

    /// Branch the document belongs to.
    pub branch: String,

    /// Seller name after alias normalization.
    pub seller: String,

    /// Client name as reported upstream.
    pub client: String,

    /// Payer entity. `"Individual"` when upstream omits it; anything else is
    /// treated as an institutional payer by the classifier fallback.
    pub entity: String,

    /// Customer-facing document total in cents.
    pub gross_cents: i64,

    /// Net amount in cents. Equals gross when upstream sends no net figure.
    pub net_cents: i64,

    /// Classified amount paid in cash.
    pub cash_cents: i64,
    /// Classified amount paid by card.
    pub card_cents: i64,
    /// Classified amount paid through a digital wallet.
    pub wallet_cents: i64,
    /// Classified amount covered by an insurance institution.
    pub insurance_cents: i64,
    /// Classified amount charged to a running account.
    pub account_cents: i64,

    /// Display label of the dominant instrument. Never used in math.
    pub payment_label: String,

    /// Sum of the kept line-item totals, for auditing against gross.
    pub line_total_cents: i64,

    /// True when the classified total disagrees with gross beyond the
    /// per-line rounding tolerance.
    pub has_discrepancy: bool,
}

impl Invoice {
    /// Returns the gross total as Money.
    #[inline]
    pub fn gross(&self) -> Money {
        Money::from_cents(self.gross_cents)
    }

    /// Returns the net amount as Money.
    #[inline]
    pub fn net(&self) -> Money {
        Money::from_cents(self.net_cents)
    }

    /// Returns the line-total audit sum as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }

    /// Reassembles the five bucket columns into a [`PaymentBreakdown`].
    pub fn breakdown(&self) -> PaymentBreakdown {
        PaymentBreakdown {
            cash_cents: self.cash_cents,
            card_cents: self.card_cents,
            wallet_cents: self.wallet_cents,
            insurance_cents: self.insurance_cents,
            account_cents: self.account_cents,
        }
    }

    /// Calendar day of the document (UTC).
    #[inline]
    pub fn issued_on(&self) -> NaiveDate {
        self.issued_at.date_naive()
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item of an invoice, enriched from the product master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    /// Surrogate key (UUID v4). Lines are replaced with their invoice.
    pub id: String,

    /// Owning invoice (derived id).
    pub invoice_id: String,

    /// Product display name, trimmed.
    pub product_name: String,

    /// Barcode when upstream provides one.
    pub barcode: Option<String>,

    /// Quantity sold. Fractional units occur (magistral preparations sold
    /// by weight), hence f64 rather than integer.
    pub quantity: f64,

    /// Unit price in cents.
    pub unit_price_cents: i64,

    /// Line total in cents.
    pub line_total_cents: i64,

    /// Product category, from the line itself or the product master.
    pub category: Option<String>,

    /// Manufacturer / laboratory, from the line itself or the product master.
    pub manufacturer: Option<String>,

    /// Unit cost in cents when known (margin analysis).
    pub unit_cost_cents: Option<i64>,
}

impl SaleLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Expense Status
// =============================================================================

/// Payment status of an expense record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    /// Settled. Counts into real outflow.
    Paid,
    /// Owed but not yet settled. Counts into pending outflow.
    Pending,
    /// Voided or explicitly excluded upstream. Counts into nothing.
    Ignored,
    /// Status string was absent or unrecognizable.
    Unknown,
}

impl ExpenseStatus {
    /// Lenient parse of the upstream status string.
    ///
    /// Voided markers are checked before paid markers: several upstream
    /// labels ("anulado pagado") carry both, and a voided expense must never
    /// reach the outflow totals.
    pub fn from_label(label: &str) -> Self {
        let lowered = label.trim().to_lowercase();
        if lowered.is_empty() {
            return ExpenseStatus::Unknown;
        }
        const IGNORED: &[&str] = &["anulad", "ignorad", "descartad", "void"];
        const PENDING: &[&str] = &["pend", "adeud", "abiert", "open", "impag"];
        const PAID: &[&str] = &["pagad", "paid", "abonad", "saldad"];

        if IGNORED.iter().any(|k| lowered.contains(k)) {
            ExpenseStatus::Ignored
        } else if PENDING.iter().any(|k| lowered.contains(k)) {
            ExpenseStatus::Pending
        } else if PAID.iter().any(|k| lowered.contains(k)) {
            ExpenseStatus::Paid
        } else {
            ExpenseStatus::Unknown
        }
    }
}

impl Default for ExpenseStatus {
    fn default() -> Self {
        ExpenseStatus::Unknown
    }
}

// =============================================================================
// Expense Kind
// =============================================================================

/// Whether an expense buys stock or keeps the lights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKind {
    /// Merchandise purchase from a drug supplier. Feeds restock alignment.
    SupplierExpense,
    /// Rent, utilities, services. Outflow only.
    OperatingService,
}

impl Default for ExpenseKind {
    fn default() -> Self {
        ExpenseKind::SupplierExpense
    }
}

// =============================================================================
// Expense Record
// =============================================================================

/// A canonical purchase or service expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ExpenseRecord {
    /// Derived identity: `exp:<branch>:<date>:<supplier>:<cents>`.
    /// Upstream expenses carry no stable number; identical tuples are true
    /// duplicates and intentionally collapse.
    pub id: String,

    /// Supplier or service provider name, trimmed.
    pub supplier: String,

    /// Expense amount in cents.
    pub amount_cents: i64,

    /// Document date (UTC, mid-day anchored when date-only).
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,

    /// Due date when upstream provides one.
    #[ts(as = "Option<String>")]
    pub due_at: Option<DateTime<Utc>>,

    /// Branch the expense belongs to.
    pub branch: String,

    /// Payment status.
    pub status: ExpenseStatus,

    /// Supplier classification from the lookup table.
    pub kind: ExpenseKind,
}

impl ExpenseRecord {
    /// Returns the amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Calendar day of the expense (UTC).
    #[inline]
    pub fn issued_on(&self) -> NaiveDate {
        self.issued_at.date_naive()
    }
}

// =============================================================================
// Insurance Receipt
// =============================================================================

/// How an insurance receipt came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptOrigin {
    /// Fetched as its own document from the insurance category.
    ExplicitReceipt,
    /// Synthesized from an invoice that carried coverage but had no
    /// matching explicit receipt.
    ProjectedFromInvoice,
}

/// A canonical insurance coverage receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InsuranceReceipt {
    /// `ins:<number>` for explicit receipts, `ins:proj:<invoice-id>` for
    /// projected ones.
    pub id: String,

    /// Insurance institution name.
    pub institution: String,

    /// Amount covered by the institution, in cents.
    pub coverage_cents: i64,

    /// Patient share in cents.
    pub copay_cents: i64,

    /// Affiliate / member number when known.
    pub affiliate: Option<String>,

    /// Receipt date (UTC).
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,

    /// Branch the receipt belongs to.
    pub branch: String,

    /// Explicit or projected.
    pub origin: ReceiptOrigin,
}

impl InsuranceReceipt {
    /// Returns the covered amount as Money.
    #[inline]
    pub fn coverage(&self) -> Money {
        Money::from_cents(self.coverage_cents)
    }

    /// Returns the patient share as Money.
    #[inline]
    pub fn copay(&self) -> Money {
        Money::from_cents(self.copay_cents)
    }

    /// Calendar day of the receipt (UTC).
    #[inline]
    pub fn issued_on(&self) -> NaiveDate {
        self.issued_at.date_naive()
    }
}

// =============================================================================
// Payroll Entry
// =============================================================================

/// A salary payment. Written by the payroll screens, read by the rollup
/// engine as part of real outflow. The pipeline never fetches these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PayrollEntry {
    /// Surrogate key (UUID v4).
    pub id: String,

    /// Employee name.
    pub employee: String,

    /// Amount paid in cents.
    pub amount_cents: i64,

    /// Payment date (UTC).
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,

    /// Branch the salary belongs to.
    pub branch: String,
}

impl PayrollEntry {
    /// Returns the amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Calendar day of the payment (UTC).
    #[inline]
    pub fn paid_on(&self) -> NaiveDate {
        self.paid_at.date_naive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_kind_from_type_name() {
        assert_eq!(
            DocumentKind::from_type_name("FACTURA B CONTADO"),
            DocumentKind::Sale
        );
        assert_eq!(
            DocumentKind::from_type_name("NOTA DE CREDITO A"),
            DocumentKind::CreditNote
        );
        assert_eq!(
            DocumentKind::from_type_name("Transferencia entre sucursales"),
            DocumentKind::InternalTransfer
        );
        assert_eq!(
            DocumentKind::from_type_name("NOTA DE DEBITO"),
            DocumentKind::DebitNote
        );
        // Unrecognized strings default to Sale
        assert_eq!(
            DocumentKind::from_type_name("TICKET FISCAL"),
            DocumentKind::Sale
        );
    }

    #[test]
    fn test_expense_status_lenient_parse() {
        assert_eq!(ExpenseStatus::from_label("PAGADO"), ExpenseStatus::Paid);
        assert_eq!(ExpenseStatus::from_label("paid"), ExpenseStatus::Paid);
        assert_eq!(
            ExpenseStatus::from_label("Pendiente de pago"),
            ExpenseStatus::Pending
        );
        assert_eq!(ExpenseStatus::from_label("ANULADO"), ExpenseStatus::Ignored);
        assert_eq!(ExpenseStatus::from_label(""), ExpenseStatus::Unknown);
        assert_eq!(ExpenseStatus::from_label("???"), ExpenseStatus::Unknown);
    }

    #[test]
    fn test_voided_beats_paid_in_combined_labels() {
        assert_eq!(
            ExpenseStatus::from_label("Anulado (pagado)"),
            ExpenseStatus::Ignored
        );
    }

    #[test]
    fn test_breakdown_total_and_dominant() {
        let mut breakdown = PaymentBreakdown::default();
        breakdown.add(Instrument::Cash, Money::from_cents(2_000));
        breakdown.add(Instrument::Wallet, Money::from_cents(50_000));
        breakdown.add(Instrument::Card, Money::from_cents(1_000));

        assert_eq!(breakdown.total().cents(), 53_000);
        assert_eq!(breakdown.dominant(), Instrument::Wallet);
        assert_eq!(breakdown.dominant_label(), "Wallet");
    }

    #[test]
    fn test_breakdown_dominant_tie_uses_fixed_order() {
        let mut breakdown = PaymentBreakdown::default();
        breakdown.add(Instrument::Card, Money::from_cents(500));
        breakdown.add(Instrument::Account, Money::from_cents(500));

        // Card precedes Account in Instrument::ALL
        assert_eq!(breakdown.dominant(), Instrument::Card);
    }

    #[test]
    fn test_zero_breakdown_reports_cash() {
        let breakdown = PaymentBreakdown::default();
        assert!(breakdown.is_zero());
        assert_eq!(breakdown.dominant(), Instrument::Cash);
    }

    #[test]
    fn test_breakdown_merge() {
        let mut a = PaymentBreakdown::default();
        a.add(Instrument::Cash, Money::from_cents(100));
        let mut b = PaymentBreakdown::default();
        b.add(Instrument::Cash, Money::from_cents(50));
        b.add(Instrument::Insurance, Money::from_cents(900));

        a.merge(&b);
        assert_eq!(a.cash_cents, 150);
        assert_eq!(a.insurance_cents, 900);
        assert_eq!(a.total().cents(), 1_050);
    }

    #[test]
    fn test_invoice_breakdown_round_trip() {
        let invoice = Invoice {
            id: "sale:A-0001".to_string(),
            document_number: "A-0001".to_string(),
            kind: DocumentKind::Sale,
            issued_at: Utc::now(),
            period_key: "2024-05".to_string(),
            branch: "Centro".to_string(),
            seller: "Lucia".to_string(),
            client: "Consumidor Final".to_string(),
            entity: "Individual".to_string(),
            gross_cents: 75_000,
            net_cents: 75_000,
            cash_cents: 25_000,
            card_cents: 0,
            wallet_cents: 50_000,
            insurance_cents: 0,
            account_cents: 0,
            payment_label: "Wallet".to_string(),
            line_total_cents: 75_000,
            has_discrepancy: false,
        };

        let breakdown = invoice.breakdown();
        assert_eq!(breakdown.total(), invoice.gross());
        assert_eq!(breakdown.dominant_label(), "Wallet");
    }
}
