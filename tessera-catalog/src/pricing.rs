use crate::catalog::{CatalogProvider, UnitPricing, VehicleClass};
use crate::inventory::{CapacityLedger, InventoryUnit};
use crate::rules::{Modifier, RuleProvider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_shared::{pct_of, Amount, ProductType, TripType};
use uuid::Uuid;

/// Which sellable cell to price
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitSelector {
    Unit {
        unit_id: Uuid,
    },
    Route {
        route_id: Uuid,
        vehicle: VehicleClass,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    pub selector: UnitSelector,
    pub quantity: u32,
    #[serde(default)]
    pub trip_type: TripType,
    /// Hour-of-day of the outbound leg, for surcharge brackets
    pub outbound_hour: Option<u8>,
    /// Hour-of-day of the return leg, round trips only
    pub return_hour: Option<u8>,
    #[serde(default)]
    pub selected_options: BTreeMap<Uuid, u32>,
    pub discount_code: Option<String>,
}

/// Named signed delta inside a breakdown
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModifierLine {
    pub name: String,
    pub amount: Amount,
}

/// Canonical, product-type-agnostic price computation result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingBreakdown {
    pub unit_id: Uuid,
    pub base_price: Amount,
    pub modifiers: Vec<ModifierLine>,
    pub options_total: Amount,
    pub discount_total: Amount,
    pub fees_total: Amount,
    pub taxes_total: Amount,
    pub subtotal: Amount,
    pub final_price: Amount,
    pub currency: String,
    /// Set when a negative total was clamped to zero
    pub clamped: bool,
    pub calculated_at: DateTime<Utc>,
}

impl PricingBreakdown {
    /// Breakdown arithmetic invariant:
    /// final == base + Σmodifiers + options − discount + fees + taxes,
    /// unless the total went negative and was clamped to zero.
    pub fn verify(&self) -> bool {
        let modifier_sum: Amount = self.modifiers.iter().map(|m| m.amount).sum();
        let expected = self.base_price + modifier_sum + self.options_total - self.discount_total
            + self.fees_total
            + self.taxes_total;
        if self.clamped {
            self.final_price == 0 && expected < 0
        } else {
            self.final_price == expected && self.final_price >= 0
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    #[error("Unknown unit: {0}")]
    UnknownUnit(Uuid),

    #[error("No {vehicle:?} unit on route {route_id}")]
    UnknownRoute { route_id: Uuid, vehicle: VehicleClass },

    #[error("Insufficient capacity on unit {unit_id}: requested {requested}, available {available}")]
    InsufficientCapacity {
        unit_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Unknown option: {0}")]
    UnknownOption(Uuid),

    #[error("Option {option_id} quantity {requested} exceeds maximum {max}")]
    OptionQuantityExceeded {
        option_id: Uuid,
        requested: u32,
        max: u32,
    },

    #[error("Invalid or expired discount code: {0}")]
    InvalidDiscount(String),
}

/// Computes the authoritative price breakdown for a product selection.
/// Pure read-then-compute: any number of calculations may run concurrently.
pub struct PricingEngine {
    ledger: Arc<CapacityLedger>,
    catalog: Arc<dyn CatalogProvider>,
    rules: Arc<dyn RuleProvider>,
}

impl PricingEngine {
    pub fn new(
        ledger: Arc<CapacityLedger>,
        catalog: Arc<dyn CatalogProvider>,
        rules: Arc<dyn RuleProvider>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            rules,
        }
    }

    pub async fn calculate(
        &self,
        request: &PricingRequest,
    ) -> Result<PricingBreakdown, PricingError> {
        if request.quantity == 0 {
            return Err(PricingError::InvalidQuantity(request.quantity));
        }

        let unit_id = self.resolve_unit_id(&request.selector).await?;
        let unit = self
            .ledger
            .get(unit_id)
            .map_err(|_| PricingError::UnknownUnit(unit_id))?;

        // Transfers price per vehicle: one cell regardless of passengers.
        let capacity_needed = match unit.product_type {
            ProductType::Transfer => 1,
            _ => request.quantity,
        };
        if capacity_needed > unit.available_capacity() {
            return Err(PricingError::InsufficientCapacity {
                unit_id,
                requested: capacity_needed,
                available: unit.available_capacity(),
            });
        }

        let pricing = self
            .catalog
            .pricing_for(unit_id)
            .await
            .map_err(|_| PricingError::UnknownUnit(unit_id))?;

        let (mut base_price, mut modifiers) = per_unit_lines(&unit, &pricing, request);

        // Quantity multiplies everything priced per person; transfers are
        // already priced per vehicle.
        if unit.product_type != ProductType::Transfer {
            let qty = request.quantity as Amount;
            base_price *= qty;
            for line in &mut modifiers {
                line.amount *= qty;
            }
        }

        let options_total = self.options_total(unit_id, request).await?;

        let modifier_sum: Amount = modifiers.iter().map(|m| m.amount).sum();
        let subtotal = base_price + modifier_sum + options_total;

        let discount_total = match &request.discount_code {
            Some(code) => {
                let rule = self
                    .rules
                    .resolve_discount(code)
                    .await
                    .filter(|r| r.is_valid_at(Utc::now()))
                    .ok_or_else(|| PricingError::InvalidDiscount(code.clone()))?;
                -rule.modifier.apply(subtotal)
            }
            None => 0,
        };

        let mut fees_total = 0;
        for fee in self.rules.fees_for(unit.product_type).await {
            fees_total += fee.modifier.apply(subtotal);
        }
        let mut taxes_total = 0;
        for tax in self.rules.taxes_for(unit.product_type).await {
            taxes_total += tax.modifier.apply(subtotal);
        }

        let raw_total = subtotal - discount_total + fees_total + taxes_total;
        let clamped = raw_total < 0;
        let final_price = raw_total.max(0);

        if clamped {
            tracing::warn!(
                unit_id = %unit_id,
                raw_total,
                "negative price total clamped to zero"
            );
        }

        Ok(PricingBreakdown {
            unit_id,
            base_price,
            modifiers,
            options_total,
            discount_total,
            fees_total,
            taxes_total,
            subtotal,
            final_price,
            currency: unit.currency,
            clamped,
            calculated_at: Utc::now(),
        })
    }

    async fn resolve_unit_id(&self, selector: &UnitSelector) -> Result<Uuid, PricingError> {
        match selector {
            UnitSelector::Unit { unit_id } => Ok(*unit_id),
            UnitSelector::Route { route_id, vehicle } => self
                .catalog
                .resolve_transfer_unit(*route_id, *vehicle)
                .await
                .map_err(|_| PricingError::UnknownRoute {
                    route_id: *route_id,
                    vehicle: *vehicle,
                }),
        }
    }

    async fn options_total(
        &self,
        unit_id: Uuid,
        request: &PricingRequest,
    ) -> Result<Amount, PricingError> {
        if request.selected_options.is_empty() {
            return Ok(0);
        }
        let defs = self
            .catalog
            .options_for(unit_id)
            .await
            .map_err(|_| PricingError::UnknownUnit(unit_id))?;

        let mut total = 0;
        for (&option_id, &qty) in &request.selected_options {
            if qty == 0 {
                continue;
            }
            let def = defs
                .iter()
                .find(|d| d.option_id == option_id)
                .ok_or(PricingError::UnknownOption(option_id))?;
            if qty > def.max_quantity {
                return Err(PricingError::OptionQuantityExceeded {
                    option_id,
                    requested: qty,
                    max: def.max_quantity,
                });
            }
            total += def.price * qty as Amount;
        }
        Ok(total)
    }
}

/// Base price and named modifier lines for a single unit, before the
/// quantity multiplier. Surcharges are applied first; the round-trip
/// discount is computed on the surcharged two-leg subtotal.
fn per_unit_lines(
    unit: &InventoryUnit,
    pricing: &UnitPricing,
    request: &PricingRequest,
) -> (Amount, Vec<ModifierLine>) {
    let list_price = unit.unit_price;
    let mut lines = Vec::new();

    match pricing {
        UnitPricing::Event { ticket_modifier } => {
            let adjusted = (list_price as f64 * ticket_modifier).round() as Amount;
            if adjusted != list_price {
                lines.push(ModifierLine {
                    name: "price_modifier".to_string(),
                    amount: adjusted - list_price,
                });
            }
            (list_price, lines)
        }
        UnitPricing::Transfer {
            brackets,
            round_trip_discount_pct,
        } => {
            let bracket_pct = |hour: Option<u8>| -> f64 {
                hour.and_then(|h| brackets.iter().find(|b| b.covers(h)))
                    .map(|b| b.surcharge_pct)
                    .unwrap_or(0.0)
            };

            let outbound_surcharge = pct_of(list_price, bracket_pct(request.outbound_hour));
            if outbound_surcharge != 0 {
                lines.push(ModifierLine {
                    name: "outbound_surcharge".to_string(),
                    amount: outbound_surcharge,
                });
            }

            if request.trip_type == TripType::RoundTrip {
                // Both legs carry the list price; the return leg gets its
                // own bracket surcharge.
                let return_surcharge = pct_of(list_price, bracket_pct(request.return_hour));
                if return_surcharge != 0 {
                    lines.push(ModifierLine {
                        name: "return_surcharge".to_string(),
                        amount: return_surcharge,
                    });
                }
                let combined = list_price * 2 + outbound_surcharge + return_surcharge;
                let discount = pct_of(combined, *round_trip_discount_pct);
                if discount != 0 {
                    lines.push(ModifierLine {
                        name: "round_trip_discount".to_string(),
                        amount: -discount,
                    });
                }
                (list_price * 2, lines)
            } else {
                (list_price, lines)
            }
        }
        UnitPricing::Tour => (list_price, lines),
    }
}
