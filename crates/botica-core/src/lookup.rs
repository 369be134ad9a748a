//! # Lookup Tables
//!
//! Injected reference data the canonicalizer resolves against: seller
//! aliases, supplier classification, and the product master.
//!
//! All three are plain serde structs so callers can load them from config
//! files or build them in code. None of them is fetched by the pipeline;
//! they are maintained by the operators of the surrounding system and
//! handed in at construction time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::ExpenseKind;

// =============================================================================
// Seller Aliases
// =============================================================================

/// Maps the name variants branch operators type for the same seller onto
/// one canonical spelling ("lu", "Lucia P." → "Lucia Perez").
///
/// Lookup is case-insensitive on the trimmed raw name. Unknown names pass
/// through trimmed, so a missing alias degrades to inconsistent grouping,
/// never to data loss.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SellerAliasMap {
    #[serde(default)]
    aliases: HashMap<String, String>,
}

impl SellerAliasMap {
    /// Builds the map from `(variant, canonical)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let aliases = pairs
            .into_iter()
            .map(|(variant, canonical)| (variant.trim().to_lowercase(), canonical))
            .collect();
        SellerAliasMap { aliases }
    }

    /// Resolves a raw seller name to its canonical spelling.
    pub fn canonical_name(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self.aliases.get(&trimmed.to_lowercase()) {
            Some(canonical) => canonical.clone(),
            None => trimmed.to_string(),
        }
    }

    /// Number of known variants.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// True when no aliases are registered.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

// =============================================================================
// Supplier Classification
// =============================================================================

/// Classifies expense suppliers into merchandise purchases vs operating
/// services.
///
/// Resolution order:
/// 1. exact supplier override (case-insensitive)
/// 2. service keyword found in the supplier name or the expense concept
/// 3. default: supplier expense (drug wholesalers dominate the ledger)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplierKindMap {
    /// Exact-name overrides.
    overrides: HashMap<String, ExpenseKind>,
    /// Lowercase fragments marking an operating service.
    service_keywords: Vec<String>,
}

impl Default for SupplierKindMap {
    fn default() -> Self {
        SupplierKindMap {
            overrides: HashMap::new(),
            service_keywords: [
                "alquiler", "luz", "electric", "agua", "gas", "internet", "telefon",
                "limpieza", "seguridad", "contador", "honorarios", "municipal",
                "impuesto", "software", "mantenimiento",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}

impl SupplierKindMap {
    /// Registers an exact-name override.
    pub fn set_override(&mut self, supplier: &str, kind: ExpenseKind) {
        self.overrides
            .insert(supplier.trim().to_lowercase(), kind);
    }

    /// Classifies a supplier given the expense's free-text concept.
    pub fn kind_for(&self, supplier: &str, concept: &str) -> ExpenseKind {
        let key = supplier.trim().to_lowercase();
        if let Some(kind) = self.overrides.get(&key) {
            return *kind;
        }
        let haystack = format!("{} {}", key, concept.trim().to_lowercase());
        if self
            .service_keywords
            .iter()
            .any(|k| !k.is_empty() && haystack.contains(k.as_str()))
        {
            ExpenseKind::OperatingService
        } else {
            ExpenseKind::SupplierExpense
        }
    }
}

// =============================================================================
// Product Master
// =============================================================================

/// Reference data for one product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub unit_cost_cents: Option<i64>,
}

/// The product master: category, manufacturer and cost reference data,
/// indexed by barcode and by normalized name.
///
/// Line items frequently arrive without category or manufacturer; the
/// canonicalizer backfills them from here, and the repair pass re-derives
/// them for already-stored lines after the master is updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductMaster {
    #[serde(default)]
    by_barcode: HashMap<String, ProductInfo>,
    #[serde(default)]
    by_name: HashMap<String, ProductInfo>,
}

impl ProductMaster {
    /// Registers a product under its barcode and name.
    pub fn insert(&mut self, barcode: Option<&str>, info: ProductInfo) {
        if let Some(code) = barcode {
            let code = code.trim();
            if !code.is_empty() {
                self.by_barcode.insert(code.to_string(), info.clone());
            }
        }
        let name_key = info.name.trim().to_lowercase();
        if !name_key.is_empty() {
            self.by_name.insert(name_key, info);
        }
    }

    /// Looks a line item up, barcode first, then normalized name.
    pub fn lookup(&self, barcode: Option<&str>, name: &str) -> Option<&ProductInfo> {
        if let Some(code) = barcode {
            let code = code.trim();
            if !code.is_empty() {
                if let Some(info) = self.by_barcode.get(code) {
                    return Some(info);
                }
            }
        }
        self.by_name.get(&name.trim().to_lowercase())
    }

    /// Number of distinct name entries.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when the master holds nothing.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty() && self.by_barcode.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seller_alias_resolution() {
        let sellers = SellerAliasMap::from_pairs([
            ("lu".to_string(), "Lucia Perez".to_string()),
            ("Lucia P.".to_string(), "Lucia Perez".to_string()),
        ]);

        assert_eq!(sellers.canonical_name("LU"), "Lucia Perez");
        assert_eq!(sellers.canonical_name("  lucia p. "), "Lucia Perez");
        // Unknown names pass through trimmed
        assert_eq!(sellers.canonical_name(" Marta "), "Marta");
    }

    #[test]
    fn test_supplier_kind_default_is_merchandise() {
        let suppliers = SupplierKindMap::default();
        assert_eq!(
            suppliers.kind_for("Droguería del Sud", ""),
            ExpenseKind::SupplierExpense
        );
    }

    #[test]
    fn test_supplier_kind_service_keywords() {
        let suppliers = SupplierKindMap::default();
        assert_eq!(
            suppliers.kind_for("EDESUR ELECTRICIDAD", ""),
            ExpenseKind::OperatingService
        );
        // Keyword may also live in the concept line
        assert_eq!(
            suppliers.kind_for("Gomez SRL", "alquiler local mayo"),
            ExpenseKind::OperatingService
        );
    }

    #[test]
    fn test_supplier_kind_override_wins() {
        let mut suppliers = SupplierKindMap::default();
        suppliers.set_override("EDESUR ELECTRICIDAD", ExpenseKind::SupplierExpense);
        assert_eq!(
            suppliers.kind_for("edesur electricidad", ""),
            ExpenseKind::SupplierExpense
        );
    }

    #[test]
    fn test_product_master_lookup_precedence() {
        let mut master = ProductMaster::default();
        master.insert(
            Some("7791234567890"),
            ProductInfo {
                name: "Ibuprofeno 600".to_string(),
                category: Some("Analgésicos".to_string()),
                manufacturer: Some("Lab Andina".to_string()),
                unit_cost_cents: Some(850),
            },
        );

        // Barcode hit
        let by_code = master.lookup(Some("7791234567890"), "whatever").unwrap();
        assert_eq!(by_code.category.as_deref(), Some("Analgésicos"));

        // Name hit, case-insensitive
        let by_name = master.lookup(None, "IBUPROFENO 600").unwrap();
        assert_eq!(by_name.manufacturer.as_deref(), Some("Lab Andina"));

        assert!(master.lookup(None, "unknown").is_none());
    }
}
