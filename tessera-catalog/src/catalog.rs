use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tessera_shared::Amount;
use uuid::Uuid;

/// Vehicle classes offered on transfer routes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleClass {
    Sedan,
    Van,
    Minibus,
    Coach,
}

/// Time-of-day bracket with a directional surcharge percentage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeBracket {
    pub start_hour: u8,
    pub end_hour: u8,
    pub surcharge_pct: f64,
}

impl TimeBracket {
    /// Inclusive hour match, wrapping past midnight when start > end.
    pub fn covers(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour <= self.end_hour
        } else {
            hour >= self.start_hour || hour <= self.end_hour
        }
    }
}

/// Bookable extra attached to a unit (audio guide, child seat, meal...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionDef {
    pub option_id: Uuid,
    pub name: String,
    pub price: Amount,
    pub max_quantity: u32,
}

/// How a unit's list price is turned into a base price, per product family.
/// The list price itself lives on the `InventoryUnit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "product")]
pub enum UnitPricing {
    /// Section list price scaled by the ticket type's modifier
    Event { ticket_modifier: f64 },
    /// Route list price plus directional surcharges and round-trip discount
    Transfer {
        brackets: Vec<TimeBracket>,
        round_trip_discount_pct: f64,
    },
    /// Variant list price as-is
    Tour,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown unit: {0}")]
    UnknownUnit(Uuid),

    #[error("No {vehicle:?} unit on route {route_id}")]
    UnknownRoute { route_id: Uuid, vehicle: VehicleClass },
}

/// Read-only reference data resolved from the external catalog/schedule
/// service. The core never mutates what it reads through this seam.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn pricing_for(&self, unit_id: Uuid) -> Result<UnitPricing, CatalogError>;

    async fn options_for(&self, unit_id: Uuid) -> Result<Vec<OptionDef>, CatalogError>;

    /// Resolve a route + vehicle class to the sellable cell backing it.
    async fn resolve_transfer_unit(
        &self,
        route_id: Uuid,
        vehicle: VehicleClass,
    ) -> Result<Uuid, CatalogError>;
}

struct UnitEntry {
    pricing: UnitPricing,
    options: Vec<OptionDef>,
}

/// In-memory catalog backing tests and the demo binary
pub struct InMemoryCatalog {
    units: RwLock<HashMap<Uuid, UnitEntry>>,
    routes: RwLock<HashMap<(Uuid, VehicleClass), Uuid>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_unit(&self, unit_id: Uuid, pricing: UnitPricing, options: Vec<OptionDef>) {
        self.units
            .write()
            .unwrap()
            .insert(unit_id, UnitEntry { pricing, options });
    }

    pub fn register_transfer_route(&self, route_id: Uuid, vehicle: VehicleClass, unit_id: Uuid) {
        self.routes
            .write()
            .unwrap()
            .insert((route_id, vehicle), unit_id);
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn pricing_for(&self, unit_id: Uuid) -> Result<UnitPricing, CatalogError> {
        self.units
            .read()
            .unwrap()
            .get(&unit_id)
            .map(|e| e.pricing.clone())
            .ok_or(CatalogError::UnknownUnit(unit_id))
    }

    async fn options_for(&self, unit_id: Uuid) -> Result<Vec<OptionDef>, CatalogError> {
        self.units
            .read()
            .unwrap()
            .get(&unit_id)
            .map(|e| e.options.clone())
            .ok_or(CatalogError::UnknownUnit(unit_id))
    }

    async fn resolve_transfer_unit(
        &self,
        route_id: Uuid,
        vehicle: VehicleClass,
    ) -> Result<Uuid, CatalogError> {
        self.routes
            .read()
            .unwrap()
            .get(&(route_id, vehicle))
            .copied()
            .ok_or(CatalogError::UnknownRoute { route_id, vehicle })
    }
}
