//! # Canonicalizer
//!
//! Turns raw fetched documents into canonical entities: derived identities,
//! normalized dates, classified payments, filtered lines, and batch-level
//! deduplication.
//!
//! ## Batch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    build_batch(raw documents)                           │
//! │                                                                         │
//! │  RawDocument ──┬── invoices  ──► invoice_from_raw ──┐                  │
//! │                ├── expenses  ──► expense_from_raw ──┤  keyed by        │
//! │                └── insurance ──► insurance_from_raw─┤  derived id      │
//! │                                                     ▼  (later wins)    │
//! │                                        ┌────────────────────┐          │
//! │                                        │ dedup maps         │          │
//! │                                        └─────────┬──────────┘          │
//! │                                                  ▼                     │
//! │                              project insurance receipts from           │
//! │                              covered invoices w/o explicit receipt     │
//! │                                                  ▼                     │
//! │                                           CanonicalBatch               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unusable documents (no number, no parsable date, placeholder noise) are
//! skipped and counted, never errored: one bad document must not cost a day
//! of data.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::lookup::{ProductMaster, SellerAliasMap, SupplierKindMap};
use crate::money::Money;
use crate::payment::{classify, Classification, ClassifierConfig};
use crate::period::period_key;
use crate::raw::{
    parse_flexible_datetime, DocCategory, RawDocument, RawExpense, RawInsurance, RawInvoice,
    RawLineItem,
};
use crate::types::{
    DocumentKind, ExpenseRecord, ExpenseStatus, Instrument, InsuranceReceipt, Invoice,
    ReceiptOrigin, SaleLine,
};
use crate::{CoreResult, DISCREPANCY_TOLERANCE_PER_LINE_CENTS};

/// Institution label when neither the document nor its agreements name one.
const UNSPECIFIED_INSTITUTION: &str = "(unspecified)";

// =============================================================================
// Identity Derivation
// =============================================================================

/// Derives the stable invoice identity from the document number and kind.
///
/// Same upstream document → same id on every pull, so re-syncing replaces
/// rows instead of duplicating them. The kind tag keeps a credit note from
/// colliding with the sale that shares its number.
pub fn derive_invoice_id(document_number: &str, kind: DocumentKind) -> String {
    format!("{}:{}", kind.tag(), normalize_number(document_number))
}

/// Derives the expense identity from its distinguishing tuple. Upstream
/// expenses carry no stable number; identical tuples are true duplicates
/// and collapse on purpose.
pub fn derive_expense_id(branch: &str, date: NaiveDate, supplier: &str, cents: i64) -> String {
    format!(
        "exp:{}:{}:{}:{}",
        slug(branch),
        date.format("%Y%m%d"),
        slug(supplier),
        cents
    )
}

fn normalize_number(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Lowercase alphanumeric slug with single dashes, for id segments.
fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.trim().to_lowercase().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            out.push(ch);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    out
}

// =============================================================================
// Output Types
// =============================================================================

/// A canonical invoice together with its lines and the institution hint
/// used for insurance projection.
#[derive(Debug, Clone)]
pub struct InvoiceBundle {
    pub invoice: Invoice,
    pub lines: Vec<SaleLine>,
    /// Institution named by the document or its insurance agreement, when
    /// any amount classified as insurance.
    pub institution_hint: Option<String>,
}

/// Everything one run's raw documents canonicalize into.
#[derive(Debug, Clone, Default)]
pub struct CanonicalBatch {
    pub invoices: Vec<Invoice>,
    pub sale_lines: Vec<SaleLine>,
    pub expenses: Vec<ExpenseRecord>,
    pub insurance: Vec<InsuranceReceipt>,
    /// Documents dropped for being unusable or noise.
    pub skipped: usize,
}

// =============================================================================
// Canonicalizer
// =============================================================================

/// Holds the injected configuration and lookup tables and maps raw
/// documents onto canonical entities. Pure: no I/O, no logging.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    cfg: ClassifierConfig,
    sellers: SellerAliasMap,
    suppliers: SupplierKindMap,
    master: ProductMaster,
}

impl Canonicalizer {
    /// Builds a canonicalizer, rejecting unusable classifier configuration.
    pub fn new(
        cfg: ClassifierConfig,
        sellers: SellerAliasMap,
        suppliers: SupplierKindMap,
        master: ProductMaster,
    ) -> CoreResult<Self> {
        cfg.validate()?;
        Ok(Canonicalizer {
            cfg,
            sellers,
            suppliers,
            master,
        })
    }

    /// Default configuration and empty lookup tables.
    pub fn with_defaults() -> Self {
        Canonicalizer {
            cfg: ClassifierConfig::default(),
            sellers: SellerAliasMap::default(),
            suppliers: SupplierKindMap::default(),
            master: ProductMaster::default(),
        }
    }

    /// The classifier configuration in use.
    pub fn config(&self) -> &ClassifierConfig {
        &self.cfg
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    /// Maps one raw sales-side document. `None` means unusable or noise.
    pub fn invoice_from_raw(&self, raw: &RawInvoice, branch: &str) -> Option<InvoiceBundle> {
        let number = raw.number.trim();
        if number.is_empty() {
            return None;
        }
        let issued_at = parse_flexible_datetime(&raw.date)?;
        let kind = DocumentKind::from_type_name(&raw.doc_type);
        let gross = Money::from_major_f64(raw.total);

        // Placeholder documents with no value are billing noise
        if self.cfg.is_noise_type(&raw.doc_type) && gross.is_zero() {
            return None;
        }

        let invoice_id = derive_invoice_id(number, kind);
        let (lines, line_sum) = self.map_lines(&invoice_id, raw, gross);

        let entity = {
            let trimmed = raw.entity.trim();
            if trimmed.is_empty() {
                self.cfg.individual_entity.clone()
            } else {
                trimmed.to_string()
            }
        };

        let agreements: Vec<_> = raw.agreements.iter().map(crate::raw::RawAgreement::from_value).collect();
        let Classification { breakdown, .. } =
            classify(&self.cfg, &agreements, gross, &entity, line_sum);

        let net = {
            let parsed = Money::from_major_f64(raw.net);
            if parsed.is_zero() {
                gross
            } else {
                parsed
            }
        };

        // One cent of rounding slack per line: upstream line totals are
        // rounded per line before summing.
        let tolerance = (lines.len().max(1) as i64) * DISCREPANCY_TOLERANCE_PER_LINE_CENTS;
        let has_discrepancy = (breakdown.total() - gross).abs().cents() > tolerance;

        let institution_hint = if breakdown.insurance_cents > 0 {
            self.institution_hint(raw, &agreements)
        } else {
            None
        };

        let invoice = Invoice {
            id: invoice_id,
            document_number: normalize_number(number),
            kind,
            issued_at,
            period_key: period_key(&issued_at),
            branch: branch.trim().to_string(),
            seller: self.sellers.canonical_name(&raw.seller),
            client: raw.client.trim().to_string(),
            entity,
            gross_cents: gross.cents(),
            net_cents: net.cents(),
            cash_cents: breakdown.cash_cents,
            card_cents: breakdown.card_cents,
            wallet_cents: breakdown.wallet_cents,
            insurance_cents: breakdown.insurance_cents,
            account_cents: breakdown.account_cents,
            payment_label: breakdown.dominant_label().to_string(),
            line_total_cents: line_sum.cents(),
            has_discrepancy,
        };

        Some(InvoiceBundle {
            invoice,
            lines,
            institution_hint,
        })
    }

    /// Parses, filters and enriches the line items of one document.
    ///
    /// Dropped lines: no product name and no barcode (unattributable), and
    /// at most one aggregator row repeating the document total next to the
    /// real lines (some nodes append one; keeping it doubles the audit sum).
    fn map_lines(&self, invoice_id: &str, raw: &RawInvoice, gross: Money) -> (Vec<SaleLine>, Money) {
        let parsed: Vec<RawLineItem> = raw
            .lines
            .iter()
            .map(RawLineItem::from_value)
            .filter(RawLineItem::has_identity)
            .collect();

        let mut with_cents: Vec<(RawLineItem, i64)> = parsed
            .into_iter()
            .map(|line| {
                let total = if line.total != 0.0 {
                    Money::from_major_f64(line.total)
                } else {
                    Money::from_major_f64(line.unit_price * line.quantity)
                };
                (line, total.cents())
            })
            .collect();

        if with_cents.len() > 1 && !gross.is_zero() {
            let sum: i64 = with_cents.iter().map(|(_, c)| c).sum();
            let aggregator = with_cents
                .iter()
                .position(|(_, cents)| *cents == gross.cents() && sum - cents == gross.cents());
            if let Some(idx) = aggregator {
                with_cents.remove(idx);
            }
        }

        let mut line_sum = Money::zero();
        let lines = with_cents
            .into_iter()
            .map(|(line, total_cents)| {
                line_sum += Money::from_cents(total_cents);
                self.build_line(invoice_id, line, total_cents)
            })
            .collect();
        (lines, line_sum)
    }

    fn build_line(&self, invoice_id: &str, line: RawLineItem, total_cents: i64) -> SaleLine {
        let barcode = {
            let trimmed = line.barcode.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };
        let reference = self.master.lookup(barcode.as_deref(), &line.product);

        let product_name = {
            let trimmed = line.product.trim();
            if !trimmed.is_empty() {
                trimmed.to_string()
            } else if let Some(info) = reference {
                info.name.clone()
            } else {
                // Barcode-only line with no master entry
                barcode.clone().unwrap_or_default()
            }
        };

        let category = non_empty(&line.category)
            .or_else(|| reference.and_then(|info| info.category.clone()));
        let manufacturer = non_empty(&line.manufacturer)
            .or_else(|| reference.and_then(|info| info.manufacturer.clone()));
        let unit_cost_cents = if line.cost != 0.0 {
            Some(Money::from_major_f64(line.cost).cents())
        } else {
            reference.and_then(|info| info.unit_cost_cents)
        };

        SaleLine {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            product_name,
            barcode,
            quantity: line.quantity,
            unit_price_cents: Money::from_major_f64(line.unit_price).cents(),
            line_total_cents: total_cents,
            category,
            manufacturer,
            unit_cost_cents,
        }
    }

    fn institution_hint(
        &self,
        raw: &RawInvoice,
        agreements: &[crate::raw::RawAgreement],
    ) -> Option<String> {
        non_empty(&raw.institution).or_else(|| {
            agreements
                .iter()
                .find(|a| self.cfg.keyword_instrument(&a.type_name) == Some(Instrument::Insurance))
                .map(|a| a.type_name.trim().to_string())
        })
    }

    // -------------------------------------------------------------------------
    // Expenses
    // -------------------------------------------------------------------------

    /// Maps one raw expense document. `None` means unusable.
    pub fn expense_from_raw(&self, raw: &RawExpense, branch: &str) -> Option<ExpenseRecord> {
        let supplier = raw.supplier.trim();
        if supplier.is_empty() {
            return None;
        }
        let issued_at = parse_flexible_datetime(&raw.date)?;
        let amount = Money::from_major_f64(raw.amount);
        if amount.is_zero() {
            return None;
        }

        Some(ExpenseRecord {
            id: derive_expense_id(branch, issued_at.date_naive(), supplier, amount.cents()),
            supplier: supplier.to_string(),
            amount_cents: amount.cents(),
            issued_at,
            due_at: parse_flexible_datetime(&raw.due),
            branch: branch.trim().to_string(),
            status: ExpenseStatus::from_label(&raw.status),
            kind: self.suppliers.kind_for(supplier, &raw.concept),
        })
    }

    // -------------------------------------------------------------------------
    // Insurance
    // -------------------------------------------------------------------------

    /// Maps one raw explicit insurance receipt. `None` means unusable.
    pub fn insurance_from_raw(&self, raw: &RawInsurance, branch: &str) -> Option<InsuranceReceipt> {
        let issued_at = parse_flexible_datetime(&raw.date)?;
        let coverage = Money::from_major_f64(raw.coverage);
        let copay = Money::from_major_f64(raw.copay);
        if coverage.is_zero() && copay.is_zero() {
            return None;
        }

        let institution =
            non_empty(&raw.institution).unwrap_or_else(|| UNSPECIFIED_INSTITUTION.to_string());
        let number = raw.number.trim();
        let id = if number.is_empty() {
            format!(
                "ins:{}:{}:{}:{}",
                slug(branch),
                issued_at.date_naive().format("%Y%m%d"),
                slug(&institution),
                coverage.cents()
            )
        } else {
            format!("ins:{}", normalize_number(number))
        };

        Some(InsuranceReceipt {
            id,
            institution,
            coverage_cents: coverage.cents(),
            copay_cents: copay.cents(),
            affiliate: non_empty(&raw.affiliate),
            issued_at,
            branch: branch.trim().to_string(),
            origin: ReceiptOrigin::ExplicitReceipt,
        })
    }

    // -------------------------------------------------------------------------
    // Batch Assembly
    // -------------------------------------------------------------------------

    /// Canonicalizes a whole run of raw documents.
    ///
    /// Deduplication is by derived id with later documents winning, so a
    /// re-pulled day replaces what the earlier pull produced, lines
    /// included. After mapping, insurance receipts are projected from
    /// covered invoices that have no explicit receipt for the same
    /// document number.
    pub fn build_batch(&self, docs: &[RawDocument]) -> CanonicalBatch {
        let mut invoices: BTreeMap<String, InvoiceBundle> = BTreeMap::new();
        let mut expenses: BTreeMap<String, ExpenseRecord> = BTreeMap::new();
        let mut receipts: BTreeMap<String, InsuranceReceipt> = BTreeMap::new();
        let mut explicit_numbers: HashSet<String> = HashSet::new();
        let mut skipped = 0usize;

        for doc in docs {
            match doc.category {
                DocCategory::Invoices => {
                    let raw = RawInvoice::from_value(&doc.payload);
                    match self.invoice_from_raw(&raw, &doc.branch) {
                        Some(bundle) => {
                            invoices.insert(bundle.invoice.id.clone(), bundle);
                        }
                        None => skipped += 1,
                    }
                }
                DocCategory::Expenses => {
                    let raw = RawExpense::from_value(&doc.payload);
                    match self.expense_from_raw(&raw, &doc.branch) {
                        Some(record) => {
                            expenses.insert(record.id.clone(), record);
                        }
                        None => skipped += 1,
                    }
                }
                DocCategory::Insurance => {
                    let raw = RawInsurance::from_value(&doc.payload);
                    let document_number = normalize_number(&raw.document_number);
                    match self.insurance_from_raw(&raw, &doc.branch) {
                        Some(record) => {
                            if !document_number.is_empty() {
                                explicit_numbers.insert(document_number);
                            }
                            receipts.insert(record.id.clone(), record);
                        }
                        None => skipped += 1,
                    }
                }
            }
        }

        // Projection: covered invoices with no explicit receipt
        for bundle in invoices.values() {
            let invoice = &bundle.invoice;
            if invoice.insurance_cents <= 0 {
                continue;
            }
            if explicit_numbers.contains(&invoice.document_number) {
                continue;
            }
            let id = format!("ins:proj:{}", invoice.id);
            let copay = (invoice.gross_cents - invoice.insurance_cents).max(0);
            receipts.insert(
                id.clone(),
                InsuranceReceipt {
                    id,
                    institution: bundle
                        .institution_hint
                        .clone()
                        .unwrap_or_else(|| UNSPECIFIED_INSTITUTION.to_string()),
                    coverage_cents: invoice.insurance_cents,
                    copay_cents: copay,
                    affiliate: None,
                    issued_at: invoice.issued_at,
                    branch: invoice.branch.clone(),
                    origin: ReceiptOrigin::ProjectedFromInvoice,
                },
            );
        }

        let mut out_invoices = Vec::with_capacity(invoices.len());
        let mut out_lines = Vec::new();
        for (_, bundle) in invoices {
            out_invoices.push(bundle.invoice);
            out_lines.extend(bundle.lines);
        }

        CanonicalBatch {
            invoices: out_invoices,
            sale_lines: out_lines,
            expenses: expenses.into_values().collect(),
            insurance: receipts.into_values().collect(),
            skipped,
        }
    }

    // -------------------------------------------------------------------------
    // Catalog Repair
    // -------------------------------------------------------------------------

    /// Re-derives category and manufacturer for already-canonical lines
    /// after a product master update. Amounts are never touched. Returns
    /// the number of lines that changed.
    pub fn repair_lines(&self, lines: &mut [SaleLine]) -> usize {
        let mut changed = 0;
        for line in lines.iter_mut() {
            let Some(info) = self.master.lookup(line.barcode.as_deref(), &line.product_name)
            else {
                continue;
            };
            let mut touched = false;
            if let Some(category) = &info.category {
                if line.category.as_deref() != Some(category.as_str()) {
                    line.category = Some(category.clone());
                    touched = true;
                }
            }
            if let Some(manufacturer) = &info.manufacturer {
                if line.manufacturer.as_deref() != Some(manufacturer.as_str()) {
                    line.manufacturer = Some(manufacturer.clone());
                    touched = true;
                }
            }
            if touched {
                changed += 1;
            }
        }
        changed
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
