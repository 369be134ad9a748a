//! # Payment Classification Engine
//!
//! Buckets every document amount into the five payment instruments.
//!
//! ## Classification Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two-Pass Classification                              │
//! │                                                                         │
//! │  agreements ──► PASS 1: provisional buckets                            │
//! │                   skip cancelled / zero entries                        │
//! │                   explicit code ──► keyword sets ──► default Cash      │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                 PASS 2: wallet override                                │
//! │                   card/cash entries whose sub-type or type name        │
//! │                   names a wallet brand move to the Wallet bucket       │
//! │                        │                                                │
//! │          all zero?     ▼                                                │
//! │        ┌──────────────────────────────────────────────┐                │
//! │        │ FALLBACK A: institutional payer + gross > 0  │──► Account     │
//! │        │ FALLBACK B: line sum, else gross             │──► Cash        │
//! │        │ still zero                                   │──► Empty       │
//! │        └──────────────────────────────────────────────┘                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pass 2 exists because several nodes report wallet payments as a card
//! (or cash) agreement whose brand field carries the wallet name. A single
//! merged pass would need the brand check inside every branch of pass 1;
//! two passes keep the precedence rules independent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::raw::RawAgreement;
use crate::types::{Instrument, PaymentBreakdown};

// =============================================================================
// Classifier Configuration
// =============================================================================

/// Keyword sets and code maps driving the classifier.
///
/// These are injected data, not constants: institutions differ per country
/// and the branches sign up with new wallet brands without notice. The
/// defaults cover the fleet as deployed today.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Explicit payment type code → instrument. Highest precedence.
    /// Keys are matched uppercase-trimmed.
    pub code_map: HashMap<String, Instrument>,

    /// Type-name fragments naming an insurance institution.
    pub insurance_keywords: Vec<String>,

    /// Type-name fragments naming a running account.
    pub account_keywords: Vec<String>,

    /// Type-name fragments naming a card payment.
    pub card_keywords: Vec<String>,

    /// Wallet brand names, checked in pass 2 against the sub-type and the
    /// full type name.
    pub wallet_brands: Vec<String>,

    /// Type-string fragments marking a billing placeholder document.
    /// Placeholder + zero gross = noise, discarded by the canonicalizer.
    pub noise_markers: Vec<String>,

    /// The entity value meaning "private individual". Anything else is an
    /// institutional payer for fallback A.
    pub individual_entity: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        fn owned(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        let mut code_map = HashMap::new();
        code_map.insert("EF".to_string(), Instrument::Cash);
        code_map.insert("TC".to_string(), Instrument::Card);
        code_map.insert("TD".to_string(), Instrument::Card);
        code_map.insert("MP".to_string(), Instrument::Wallet);
        code_map.insert("OS".to_string(), Instrument::Insurance);
        code_map.insert("CC".to_string(), Instrument::Account);

        ClassifierConfig {
            code_map,
            insurance_keywords: owned(&[
                "obra social",
                "prepaga",
                "mutual",
                "pami",
                "ioma",
                "osde",
                "swiss medical",
                "galeno",
                "seguro",
            ]),
            account_keywords: owned(&[
                "cuenta corriente",
                "cta cte",
                "cta. cte",
                "a cuenta",
                "haberes",
            ]),
            card_keywords: owned(&[
                "tarjeta",
                "card",
                "visa",
                "master",
                "amex",
                "naranja",
                "cabal",
                "debito",
                "débito",
                "credito",
                "crédito",
            ]),
            wallet_brands: owned(&[
                "mercado pago",
                "mercadopago",
                "modo",
                "uala",
                "ualá",
                "cuenta dni",
                "billetera",
            ]),
            noise_markers: owned(&[
                "factura pendiente",
                "comprobante pendiente",
                "sin comprobante",
                "placeholder",
            ]),
            individual_entity: "Individual".to_string(),
        }
    }
}

impl ClassifierConfig {
    /// Rejects configurations that would silently classify nothing.
    pub fn validate(&self) -> CoreResult<()> {
        if self.individual_entity.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "individual_entity".to_string(),
            }
            .into());
        }
        for (name, list) in [
            ("insurance_keywords", &self.insurance_keywords),
            ("account_keywords", &self.account_keywords),
            ("card_keywords", &self.card_keywords),
            ("wallet_brands", &self.wallet_brands),
            ("noise_markers", &self.noise_markers),
        ] {
            if list.iter().any(|k| k.trim().is_empty()) {
                return Err(ValidationError::InvalidFormat {
                    field: name.to_string(),
                    reason: "blank keyword".to_string(),
                }
                .into());
            }
        }
        if self.code_map.keys().any(|k| k.trim().is_empty()) {
            return Err(ValidationError::InvalidFormat {
                field: "code_map".to_string(),
                reason: "blank key".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Explicit code lookup (uppercase-trimmed).
    fn code_instrument(&self, code: &str) -> Option<Instrument> {
        let key = code.trim().to_uppercase();
        if key.is_empty() {
            return None;
        }
        self.code_map.get(&key).copied()
    }

    /// Keyword classification of a type name. Insurance fragments win over
    /// account fragments, which win over card fragments: institution names
    /// are the most specific and card words the most generic.
    pub(crate) fn keyword_instrument(&self, type_name: &str) -> Option<Instrument> {
        let lowered = type_name.to_lowercase();
        if contains_any(&lowered, &self.insurance_keywords) {
            Some(Instrument::Insurance)
        } else if contains_any(&lowered, &self.account_keywords) {
            Some(Instrument::Account)
        } else if contains_any(&lowered, &self.card_keywords) {
            Some(Instrument::Card)
        } else {
            None
        }
    }

    /// True when the text names a wallet brand.
    fn names_wallet_brand(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), &self.wallet_brands)
    }

    /// True when the document type string is a billing placeholder.
    pub fn is_noise_type(&self, doc_type: &str) -> bool {
        contains_any(&doc_type.to_lowercase(), &self.noise_markers)
    }

    /// True when the payer entity is institutional (fallback A prefilter).
    pub fn is_institutional_entity(&self, entity: &str) -> bool {
        let trimmed = entity.trim();
        !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(&self.individual_entity)
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|n| !n.is_empty() && haystack.contains(n.as_str()))
}

// =============================================================================
// Classification Result
// =============================================================================

/// How the breakdown of a document was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationOutcome {
    /// At least one agreement entry classified; buckets are itemized.
    Itemized,
    /// Nothing classified; whole gross went to the running account because
    /// the payer is institutional.
    InstitutionFallback,
    /// Nothing classified; line sum (or gross) went to cash.
    TotalFallback,
    /// Nothing classified and no amount to fall back on.
    Empty,
}

/// The classified buckets of one document plus how they were produced.
#[derive(Debug, Clone)]
pub struct Classification {
    pub breakdown: PaymentBreakdown,
    pub outcome: ClassificationOutcome,
}

// =============================================================================
// Classifier
// =============================================================================

/// Classifies one document's payment agreements into instrument buckets.
///
/// `gross` is the document header total, `entity` the payer entity after
/// defaulting, and `line_sum` the sum of kept line items (fallback B).
pub fn classify(
    cfg: &ClassifierConfig,
    agreements: &[RawAgreement],
    gross: Money,
    entity: &str,
    line_sum: Money,
) -> Classification {
    let mut breakdown = PaymentBreakdown::default();

    // Pass 1: provisional bucket per live entry
    let mut provisional: Vec<(Instrument, Money, &RawAgreement)> = Vec::new();
    for agreement in agreements {
        if agreement.is_cancelled() {
            continue;
        }
        let amount = Money::from_major_f64(agreement.amount);
        if amount.is_zero() {
            continue;
        }
        let instrument = cfg
            .code_instrument(&agreement.code)
            .or_else(|| cfg.keyword_instrument(&agreement.type_name))
            .unwrap_or(Instrument::Cash);
        provisional.push((instrument, amount, agreement));
    }

    // Pass 2: wallet brands override provisional card/cash buckets
    for (instrument, amount, agreement) in provisional {
        let final_instrument = match instrument {
            Instrument::Cash | Instrument::Card
                if cfg.names_wallet_brand(&agreement.sub_type)
                    || cfg.names_wallet_brand(&agreement.type_name) =>
            {
                Instrument::Wallet
            }
            other => other,
        };
        breakdown.add(final_instrument, amount);
    }

    if !breakdown.is_zero() {
        return Classification {
            breakdown,
            outcome: ClassificationOutcome::Itemized,
        };
    }

    // Fallback A: institutional payer, whole gross to the running account
    if cfg.is_institutional_entity(entity) && !gross.is_zero() {
        breakdown.add(Instrument::Account, gross);
        return Classification {
            breakdown,
            outcome: ClassificationOutcome::InstitutionFallback,
        };
    }

    // Fallback B: cash equivalent, line sum preferred over gross
    let fallback = if line_sum.is_zero() { gross } else { line_sum };
    if fallback.is_zero() {
        return Classification {
            breakdown,
            outcome: ClassificationOutcome::Empty,
        };
    }
    breakdown.add(Instrument::Cash, fallback);
    Classification {
        breakdown,
        outcome: ClassificationOutcome::TotalFallback,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agreement(value: serde_json::Value) -> RawAgreement {
        RawAgreement::from_value(&value)
    }

    #[test]
    fn test_wallet_brand_in_card_subtype_moves_to_wallet() {
        let cfg = ClassifierConfig::default();
        let agreements = vec![agreement(json!({
            "typeName": "TARJETA",
            "typeCode": "TC",
            "cardType": "MERCADO PAGO",
            "amount": 500.0,
        }))];

        let result = classify(
            &cfg,
            &agreements,
            Money::from_major_f64(500.0),
            "Individual",
            Money::zero(),
        );

        assert_eq!(result.outcome, ClassificationOutcome::Itemized);
        assert_eq!(result.breakdown.wallet_cents, 50_000);
        assert_eq!(result.breakdown.card_cents, 0);
        assert_eq!(result.breakdown.dominant_label(), "Wallet");
    }

    #[test]
    fn test_wallet_brand_in_type_name_of_cash_default() {
        let cfg = ClassifierConfig::default();
        // No code, no card keyword: pass 1 defaults to cash, pass 2 rescues
        let agreements = vec![agreement(json!({
            "typeName": "MODO",
            "amount": 120.0,
        }))];

        let result = classify(
            &cfg,
            &agreements,
            Money::from_major_f64(120.0),
            "Individual",
            Money::zero(),
        );

        assert_eq!(result.breakdown.wallet_cents, 12_000);
        assert_eq!(result.breakdown.cash_cents, 0);
    }

    #[test]
    fn test_insurance_bucket_never_rerouted_by_wallet_brand() {
        let cfg = ClassifierConfig::default();
        let agreements = vec![agreement(json!({
            "typeName": "OBRA SOCIAL OSDE",
            "cardType": "MERCADO PAGO",
            "amount": 300.0,
        }))];

        let result = classify(
            &cfg,
            &agreements,
            Money::from_major_f64(300.0),
            "Individual",
            Money::zero(),
        );

        // Pass 2 only touches cash/card buckets
        assert_eq!(result.breakdown.insurance_cents, 30_000);
        assert_eq!(result.breakdown.wallet_cents, 0);
    }

    #[test]
    fn test_explicit_code_beats_keywords() {
        let cfg = ClassifierConfig::default();
        let agreements = vec![agreement(json!({
            "typeName": "TARJETA VISA",
            "typeCode": "OS",
            "amount": 100.0,
        }))];

        let result = classify(
            &cfg,
            &agreements,
            Money::from_major_f64(100.0),
            "Individual",
            Money::zero(),
        );

        assert_eq!(result.breakdown.insurance_cents, 10_000);
        assert_eq!(result.breakdown.card_cents, 0);
    }

    #[test]
    fn test_cancelled_and_zero_entries_are_skipped() {
        let cfg = ClassifierConfig::default();
        let agreements = vec![
            agreement(json!({ "typeName": "EFECTIVO", "amount": 0.0 })),
            agreement(json!({ "typeName": "TARJETA", "amount": 200.0, "anulado": true })),
            agreement(json!({ "typeName": "EFECTIVO", "amount": 50.0 })),
        ];

        let result = classify(
            &cfg,
            &agreements,
            Money::from_major_f64(250.0),
            "Individual",
            Money::zero(),
        );

        assert_eq!(result.breakdown.cash_cents, 5_000);
        assert_eq!(result.breakdown.card_cents, 0);
    }

    #[test]
    fn test_unknown_type_defaults_to_cash() {
        let cfg = ClassifierConfig::default();
        let agreements = vec![agreement(json!({ "typeName": "ZZZ", "amount": 10.0 }))];

        let result = classify(
            &cfg,
            &agreements,
            Money::from_major_f64(10.0),
            "Individual",
            Money::zero(),
        );

        assert_eq!(result.breakdown.cash_cents, 1_000);
    }

    #[test]
    fn test_institutional_fallback_routes_gross_to_account() {
        let cfg = ClassifierConfig::default();

        let result = classify(
            &cfg,
            &[],
            Money::from_major_f64(750.0),
            "PAMI",
            Money::zero(),
        );

        assert_eq!(result.outcome, ClassificationOutcome::InstitutionFallback);
        assert_eq!(result.breakdown.account_cents, 75_000);
        assert_eq!(result.breakdown.total().cents(), 75_000);
    }

    #[test]
    fn test_individual_payer_does_not_hit_institution_fallback() {
        let cfg = ClassifierConfig::default();

        let result = classify(
            &cfg,
            &[],
            Money::from_major_f64(750.0),
            "Individual",
            Money::zero(),
        );

        assert_eq!(result.outcome, ClassificationOutcome::TotalFallback);
        assert_eq!(result.breakdown.cash_cents, 75_000);
        assert_eq!(result.breakdown.account_cents, 0);
    }

    #[test]
    fn test_total_fallback_prefers_line_sum() {
        let cfg = ClassifierConfig::default();

        let result = classify(
            &cfg,
            &[],
            Money::from_cents(10_000),
            "Individual",
            Money::from_cents(3_000),
        );

        assert_eq!(result.outcome, ClassificationOutcome::TotalFallback);
        assert_eq!(result.breakdown.cash_cents, 3_000);
    }

    #[test]
    fn test_worthless_document_is_empty() {
        let cfg = ClassifierConfig::default();

        let result = classify(&cfg, &[], Money::zero(), "Individual", Money::zero());

        assert_eq!(result.outcome, ClassificationOutcome::Empty);
        assert!(result.breakdown.is_zero());
    }

    #[test]
    fn test_split_tender_itemizes_all_buckets() {
        let cfg = ClassifierConfig::default();
        let agreements = vec![
            agreement(json!({ "typeName": "EFECTIVO", "amount": 20.0 })),
            agreement(json!({ "typeName": "TARJETA VISA", "amount": 30.0 })),
            agreement(json!({ "typeName": "CUENTA CORRIENTE", "amount": 50.0 })),
        ];

        let result = classify(
            &cfg,
            &agreements,
            Money::from_major_f64(100.0),
            "Individual",
            Money::zero(),
        );

        assert_eq!(result.breakdown.cash_cents, 2_000);
        assert_eq!(result.breakdown.card_cents, 3_000);
        assert_eq!(result.breakdown.account_cents, 5_000);
        assert_eq!(result.breakdown.total().cents(), 10_000);
    }

    #[test]
    fn test_noise_type_detection() {
        let cfg = ClassifierConfig::default();
        assert!(cfg.is_noise_type("FACTURA PENDIENTE DE CAE"));
        assert!(!cfg.is_noise_type("FACTURA B"));
    }

    #[test]
    fn test_validate_rejects_blank_keyword() {
        let mut cfg = ClassifierConfig::default();
        cfg.wallet_brands.push("  ".to_string());
        assert!(cfg.validate().is_err());

        let cfg = ClassifierConfig::default();
        assert!(cfg.validate().is_ok());
    }
}
