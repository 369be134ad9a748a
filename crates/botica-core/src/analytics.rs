//! # Basket & Ranking Analytics
//!
//! Product co-occurrence ("customers who bought X also bought…") and
//! ABC/Pareto revenue classification. Both are linear passes over the
//! filtered canonical rows, recomputed per filter context so a stale
//! matrix can never outlive the rows behind it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{DocumentKind, Invoice, SaleLine};

/// Counterparts returned by a related-products query when the caller
/// does not ask for a specific limit.
pub const DEFAULT_RELATED_LIMIT: usize = 5;

/// Key label for lines without a category.
const UNCATEGORIZED: &str = "(uncategorized)";

// =============================================================================
// Co-occurrence Matrix
// =============================================================================

/// One counterpart of a related-products query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RelatedProduct {
    pub product: String,
    pub count: u64,
}

/// Ordered-pair co-occurrence counts over sale baskets.
///
/// A basket is the distinct product names of one sale invoice, in the
/// order its lines were encountered. Every ordered pair of distinct
/// names counts once per basket, so `count(A,B)` and `count(B,A)` move
/// together for a basket containing both, but may diverge across
/// documents with repeated products.
#[derive(Debug, Clone, Default)]
pub struct BasketMatrix {
    counts: HashMap<(String, String), u64>,
    /// Global first-encounter rank per product, the deterministic
    /// tie-break for equal counts.
    first_seen: HashMap<String, usize>,
}

impl BasketMatrix {
    /// Builds the matrix from canonical rows. Lines of non-sale
    /// documents are skipped: a credit note is not a purchase basket.
    pub fn build(invoices: &[Invoice], lines: &[SaleLine]) -> Self {
        let sale_ids: HashSet<&str> = invoices
            .iter()
            .filter(|i| i.kind == DocumentKind::Sale)
            .map(|i| i.id.as_str())
            .collect();

        let mut first_seen: HashMap<String, usize> = HashMap::new();
        let mut baskets: HashMap<&str, Vec<String>> = HashMap::new();
        let mut basket_order: Vec<&str> = Vec::new();

        for line in lines {
            if !sale_ids.contains(line.invoice_id.as_str()) {
                continue;
            }
            let name = line.product_name.trim();
            if name.is_empty() {
                continue;
            }
            let next_rank = first_seen.len();
            first_seen.entry(name.to_string()).or_insert(next_rank);

            let basket = baskets.entry(line.invoice_id.as_str()).or_insert_with(|| {
                basket_order.push(line.invoice_id.as_str());
                Vec::new()
            });
            if !basket.iter().any(|existing| existing == name) {
                basket.push(name.to_string());
            }
        }

        let mut counts: HashMap<(String, String), u64> = HashMap::new();
        for invoice_id in basket_order {
            let basket = &baskets[invoice_id];
            if basket.len() < 2 {
                continue;
            }
            for a in basket {
                for b in basket {
                    if a != b {
                        *counts.entry((a.clone(), b.clone())).or_default() += 1;
                    }
                }
            }
        }

        BasketMatrix { counts, first_seen }
    }

    /// Times `b` appeared in a basket alongside `a`, directional.
    pub fn pair_count(&self, a: &str, b: &str) -> u64 {
        self.counts
            .get(&(a.to_string(), b.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// True when no basket produced any pair.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Top-`k` counterparts for a product: count descending, first-seen
    /// ascending on ties.
    pub fn related_products(&self, product: &str, k: usize) -> Vec<RelatedProduct> {
        let mut counterparts: Vec<(&str, u64)> = self
            .counts
            .iter()
            .filter(|((a, _), _)| a == product)
            .map(|((_, b), count)| (b.as_str(), *count))
            .collect();

        counterparts.sort_by(|(name_a, count_a), (name_b, count_b)| {
            count_b.cmp(count_a).then_with(|| {
                let rank_a = self.first_seen.get(*name_a).copied().unwrap_or(usize::MAX);
                let rank_b = self.first_seen.get(*name_b).copied().unwrap_or(usize::MAX);
                rank_a.cmp(&rank_b)
            })
        });
        counterparts.truncate(k);

        counterparts
            .into_iter()
            .map(|(name, count)| RelatedProduct {
                product: name.to_string(),
                count,
            })
            .collect()
    }
}

// =============================================================================
// ABC / Pareto Classification
// =============================================================================

/// Revenue tier: A while cumulative share stays within 70%, B within
/// 90%, C for the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum AbcClass {
    A,
    B,
    C,
}

/// What the ranking groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum AbcDimension {
    Product,
    Category,
}

/// One ranked row of the ABC report.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AbcEntry {
    pub name: String,
    pub revenue_cents: i64,
    /// Running share of total revenue after this row, in `[0, 1]`.
    pub cumulative_share: f64,
    pub class: AbcClass,
}

/// Ranks products or categories by revenue with cumulative-share tiers.
///
/// The caller passes lines already scoped to the filter context.
/// Boundary rows classify by integer comparison against the 70/90
/// cutoffs, so a row landing exactly on a cutoff is always the last of
/// its tier regardless of float rounding. Equal revenues order by name.
pub fn abc_ranking(lines: &[SaleLine], dimension: AbcDimension) -> Vec<AbcEntry> {
    let mut revenue: HashMap<String, i64> = HashMap::new();
    for line in lines {
        let key = match dimension {
            AbcDimension::Product => line.product_name.trim().to_string(),
            AbcDimension::Category => line
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(UNCATEGORIZED)
                .to_string(),
        };
        if key.is_empty() {
            continue;
        }
        *revenue.entry(key).or_default() += line.line_total_cents;
    }

    let mut rows: Vec<(String, i64)> = revenue
        .into_iter()
        .filter(|(_, cents)| *cents > 0)
        .collect();
    rows.sort_by(|(name_a, cents_a), (name_b, cents_b)| {
        cents_b.cmp(cents_a).then_with(|| name_a.cmp(name_b))
    });

    let total: i128 = rows.iter().map(|(_, cents)| *cents as i128).sum();
    if total == 0 {
        return Vec::new();
    }

    let mut cumulative: i128 = 0;
    rows.into_iter()
        .map(|(name, cents)| {
            cumulative += cents as i128;
            let class = if cumulative * 100 <= total * 70 {
                AbcClass::A
            } else if cumulative * 100 <= total * 90 {
                AbcClass::B
            } else {
                AbcClass::C
            };
            AbcEntry {
                name,
                revenue_cents: cents,
                cumulative_share: cumulative as f64 / total as f64,
                class,
            }
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn invoice(id: &str, kind: DocumentKind) -> Invoice {
        Invoice {
            id: id.to_string(),
            document_number: id.to_uppercase(),
            kind,
            issued_at: Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
            period_key: "2024-05".to_string(),
            branch: "Centro".to_string(),
            seller: String::new(),
            client: String::new(),
            entity: "Individual".to_string(),
            gross_cents: 0,
            net_cents: 0,
            cash_cents: 0,
            card_cents: 0,
            wallet_cents: 0,
            insurance_cents: 0,
            account_cents: 0,
            payment_label: "Cash".to_string(),
            line_total_cents: 0,
            has_discrepancy: false,
        }
    }

    fn line(invoice_id: &str, product: &str, total_cents: i64) -> SaleLine {
        SaleLine {
            id: format!("{invoice_id}:{product}"),
            invoice_id: invoice_id.to_string(),
            product_name: product.to_string(),
            barcode: None,
            quantity: 1.0,
            unit_price_cents: total_cents,
            line_total_cents: total_cents,
            category: None,
            manufacturer: None,
            unit_cost_cents: None,
        }
    }

    fn categorized(invoice_id: &str, product: &str, category: &str, cents: i64) -> SaleLine {
        let mut l = line(invoice_id, product, cents);
        l.category = Some(category.to_string());
        l
    }

    #[test]
    fn test_three_basket_co_purchase_counts() {
        let invoices = vec![
            invoice("sale:1", DocumentKind::Sale),
            invoice("sale:2", DocumentKind::Sale),
            invoice("sale:3", DocumentKind::Sale),
        ];
        let lines = vec![
            // basket 1: ibuprofeno + vitamina
            line("sale:1", "Ibuprofeno", 100),
            line("sale:1", "Vitamina C", 100),
            // basket 2: ibuprofeno + vitamina + alcohol
            line("sale:2", "Ibuprofeno", 100),
            line("sale:2", "Vitamina C", 100),
            line("sale:2", "Alcohol", 100),
            // basket 3: ibuprofeno alone, no pairs
            line("sale:3", "Ibuprofeno", 100),
        ];

        let matrix = BasketMatrix::build(&invoices, &lines);
        assert_eq!(matrix.pair_count("Ibuprofeno", "Vitamina C"), 2);
        // Directional counts move together when both appear once per basket
        assert_eq!(
            matrix.pair_count("Ibuprofeno", "Vitamina C"),
            matrix.pair_count("Vitamina C", "Ibuprofeno")
        );
        assert_eq!(matrix.pair_count("Alcohol", "Ibuprofeno"), 1);
        assert_eq!(matrix.pair_count("Ibuprofeno", "Ibuprofeno"), 0);
    }

    #[test]
    fn test_duplicate_product_in_one_basket_counts_once() {
        let invoices = vec![invoice("sale:1", DocumentKind::Sale)];
        let lines = vec![
            line("sale:1", "Ibuprofeno", 100),
            line("sale:1", "Ibuprofeno", 100),
            line("sale:1", "Vitamina C", 100),
        ];

        let matrix = BasketMatrix::build(&invoices, &lines);
        assert_eq!(matrix.pair_count("Ibuprofeno", "Vitamina C"), 1);
    }

    #[test]
    fn test_non_sale_documents_contribute_no_pairs() {
        let invoices = vec![invoice("credit:1", DocumentKind::CreditNote)];
        let lines = vec![
            line("credit:1", "Ibuprofeno", 100),
            line("credit:1", "Vitamina C", 100),
        ];

        let matrix = BasketMatrix::build(&invoices, &lines);
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_related_products_orders_by_count_then_first_seen() {
        let invoices = vec![
            invoice("sale:1", DocumentKind::Sale),
            invoice("sale:2", DocumentKind::Sale),
            invoice("sale:3", DocumentKind::Sale),
        ];
        let lines = vec![
            // "Gasa" seen before "Curitas"; both end up with count 1 next to Alcohol
            line("sale:1", "Alcohol", 100),
            line("sale:1", "Gasa", 100),
            line("sale:2", "Alcohol", 100),
            line("sale:2", "Curitas", 100),
            // Algodón pairs with Alcohol twice, outranking both
            line("sale:3", "Alcohol", 100),
            line("sale:3", "Algodón", 100),
            line("sale:2", "Algodón", 100),
        ];

        let matrix = BasketMatrix::build(&invoices, &lines);
        let related = matrix.related_products("Alcohol", DEFAULT_RELATED_LIMIT);

        assert_eq!(related.len(), 3);
        assert_eq!(related[0].product, "Algodón");
        assert_eq!(related[0].count, 2);
        assert_eq!(related[1].product, "Gasa");
        assert_eq!(related[2].product, "Curitas");
    }

    #[test]
    fn test_related_products_truncates_to_k() {
        let invoices = vec![invoice("sale:1", DocumentKind::Sale)];
        let lines = vec![
            line("sale:1", "A", 100),
            line("sale:1", "B", 100),
            line("sale:1", "C", 100),
            line("sale:1", "D", 100),
        ];

        let matrix = BasketMatrix::build(&invoices, &lines);
        assert_eq!(matrix.related_products("A", 2).len(), 2);
    }

    #[test]
    fn test_abc_boundary_rows_close_their_tier() {
        // 70 / 20 / 10: cumulative shares land exactly on both cutoffs
        let lines = vec![
            line("sale:1", "Lider", 7_000),
            line("sale:1", "Medio", 2_000),
            line("sale:1", "Cola", 1_000),
        ];

        let ranking = abc_ranking(&lines, AbcDimension::Product);
        assert_eq!(ranking.len(), 3);
        assert_eq!(ranking[0].class, AbcClass::A);
        assert_eq!(ranking[1].class, AbcClass::B);
        assert_eq!(ranking[2].class, AbcClass::C);
        assert!((ranking[0].cumulative_share - 0.70).abs() < 1e-9);
        assert!((ranking[2].cumulative_share - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_abc_equal_revenue_orders_by_name() {
        let lines = vec![
            line("sale:1", "Zeta", 1_000),
            line("sale:1", "Alfa", 1_000),
        ];

        let ranking = abc_ranking(&lines, AbcDimension::Product);
        assert_eq!(ranking[0].name, "Alfa");
        assert_eq!(ranking[1].name, "Zeta");
    }

    #[test]
    fn test_abc_aggregates_repeated_products() {
        let lines = vec![
            line("sale:1", "Ibuprofeno", 4_000),
            line("sale:2", "Ibuprofeno", 3_000),
            line("sale:2", "Vitamina C", 1_000),
        ];

        let ranking = abc_ranking(&lines, AbcDimension::Product);
        assert_eq!(ranking[0].name, "Ibuprofeno");
        assert_eq!(ranking[0].revenue_cents, 7_000);
    }

    #[test]
    fn test_abc_category_dimension_buckets_uncategorized() {
        let lines = vec![
            categorized("sale:1", "Ibuprofeno", "Analgésicos", 5_000),
            categorized("sale:1", "Paracetamol", "Analgésicos", 3_000),
            line("sale:1", "Mixture", 2_000),
        ];

        let ranking = abc_ranking(&lines, AbcDimension::Category);
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].name, "Analgésicos");
        assert_eq!(ranking[0].revenue_cents, 8_000);
        assert_eq!(ranking[1].name, UNCATEGORIZED);
    }

    #[test]
    fn test_abc_drops_non_positive_revenue() {
        let lines = vec![
            line("sale:1", "Normal", 5_000),
            line("sale:2", "Refunded", -2_000),
        ];

        let ranking = abc_ranking(&lines, AbcDimension::Product);
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].name, "Normal");
    }

    #[test]
    fn test_abc_empty_input_is_empty() {
        assert!(abc_ranking(&[], AbcDimension::Product).is_empty());
    }
}
