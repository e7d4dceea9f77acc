use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tessera_shared::{pct_of, Amount, ProductType};

/// Tagged price adjustment, evaluated against the running subtotal by a
/// single ordered pipeline instead of per-product conditionals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum Modifier {
    Surcharge { pct: f64 },
    FixedFee { amount: Amount },
    PercentDiscount { pct: f64 },
    FixedDiscount { amount: Amount },
}

impl Modifier {
    /// Signed delta this modifier contributes on top of `subtotal`.
    pub fn apply(&self, subtotal: Amount) -> Amount {
        match self {
            Modifier::Surcharge { pct } => pct_of(subtotal, *pct),
            Modifier::FixedFee { amount } => *amount,
            Modifier::PercentDiscount { pct } => -pct_of(subtotal, *pct),
            Modifier::FixedDiscount { amount } => -amount,
        }
    }
}

/// A redeemable discount code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountRule {
    pub code: String,
    pub modifier: Modifier,
    pub valid_until: Option<DateTime<Utc>>,
}

impl DiscountRule {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map_or(true, |until| now <= until)
    }
}

/// Fee applied to a product family (or all of them when `applies_to` is None)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeRule {
    pub name: String,
    pub applies_to: Option<ProductType>,
    pub modifier: Modifier,
}

/// Tax applied to a product family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxRule {
    pub name: String,
    pub applies_to: Option<ProductType>,
    pub modifier: Modifier,
}

fn applies(applies_to: &Option<ProductType>, product_type: ProductType) -> bool {
    applies_to.map_or(true, |pt| pt == product_type)
}

/// Rule resolution seam. The pricing engine evaluates whatever rule set this
/// provider hands back; business rules live with the collaborator, not here.
#[async_trait]
pub trait RuleProvider: Send + Sync {
    async fn resolve_discount(&self, code: &str) -> Option<DiscountRule>;

    async fn fees_for(&self, product_type: ProductType) -> Vec<FeeRule>;

    async fn taxes_for(&self, product_type: ProductType) -> Vec<TaxRule>;
}

/// In-memory rule set for tests and the demo binary
pub struct InMemoryRules {
    discounts: RwLock<HashMap<String, DiscountRule>>,
    fees: RwLock<Vec<FeeRule>>,
    taxes: RwLock<Vec<TaxRule>>,
}

impl InMemoryRules {
    pub fn new() -> Self {
        Self {
            discounts: RwLock::new(HashMap::new()),
            fees: RwLock::new(Vec::new()),
            taxes: RwLock::new(Vec::new()),
        }
    }

    /// Flat booking fee plus percentage tax across all product families,
    /// fed from configuration.
    pub fn standard(booking_fee: Amount, tax_pct: f64) -> Self {
        let rules = Self::new();
        if booking_fee > 0 {
            rules.add_fee(FeeRule {
                name: "booking_fee".to_string(),
                applies_to: None,
                modifier: Modifier::FixedFee {
                    amount: booking_fee,
                },
            });
        }
        if tax_pct > 0.0 {
            rules.add_tax(TaxRule {
                name: "sales_tax".to_string(),
                applies_to: None,
                modifier: Modifier::Surcharge { pct: tax_pct },
            });
        }
        rules
    }

    pub fn add_discount(&self, rule: DiscountRule) {
        self.discounts
            .write()
            .unwrap()
            .insert(rule.code.clone(), rule);
    }

    pub fn add_fee(&self, rule: FeeRule) {
        self.fees.write().unwrap().push(rule);
    }

    pub fn add_tax(&self, rule: TaxRule) {
        self.taxes.write().unwrap().push(rule);
    }
}

impl Default for InMemoryRules {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleProvider for InMemoryRules {
    async fn resolve_discount(&self, code: &str) -> Option<DiscountRule> {
        self.discounts.read().unwrap().get(code).cloned()
    }

    async fn fees_for(&self, product_type: ProductType) -> Vec<FeeRule> {
        self.fees
            .read()
            .unwrap()
            .iter()
            .filter(|rule| applies(&rule.applies_to, product_type))
            .cloned()
            .collect()
    }

    async fn taxes_for(&self, product_type: ProductType) -> Vec<TaxRule> {
        self.taxes
            .read()
            .unwrap()
            .iter()
            .filter(|rule| applies(&rule.applies_to, product_type))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_deltas() {
        assert_eq!(Modifier::Surcharge { pct: 10.0 }.apply(10000), 1000);
        assert_eq!(Modifier::FixedFee { amount: 250 }.apply(10000), 250);
        assert_eq!(Modifier::PercentDiscount { pct: 20.0 }.apply(10000), -2000);
        assert_eq!(Modifier::FixedDiscount { amount: 500 }.apply(10000), -500);
    }

    #[test]
    fn test_discount_validity_window() {
        let rule = DiscountRule {
            code: "SUMMER".to_string(),
            modifier: Modifier::PercentDiscount { pct: 10.0 },
            valid_until: Some(Utc::now() - chrono::Duration::days(1)),
        };
        assert!(!rule.is_valid_at(Utc::now()));

        let open_ended = DiscountRule {
            valid_until: None,
            ..rule
        };
        assert!(open_ended.is_valid_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_fee_scoping_by_product() {
        let rules = InMemoryRules::new();
        rules.add_fee(FeeRule {
            name: "venue_fee".to_string(),
            applies_to: Some(ProductType::Event),
            modifier: Modifier::FixedFee { amount: 300 },
        });
        rules.add_fee(FeeRule {
            name: "booking_fee".to_string(),
            applies_to: None,
            modifier: Modifier::FixedFee { amount: 100 },
        });

        assert_eq!(rules.fees_for(ProductType::Event).await.len(), 2);
        assert_eq!(rules.fees_for(ProductType::Tour).await.len(), 1);
    }
}
