use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tessera_shared::{Amount, ProductType};
use uuid::Uuid;

/// The smallest sellable capacity cell: an event section × ticket type, a
/// vehicle class on a route, or a tour variant on a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub unit_id: Uuid,
    pub product_type: ProductType,
    /// Performance, route or schedule this cell belongs to
    pub parent_id: Uuid,
    pub total_capacity: u32,
    pub reserved_capacity: u32,
    pub sold_capacity: u32,
    /// List price per unit, in minor units
    pub unit_price: Amount,
    pub currency: String,
    pub is_premium: bool,
    pub is_accessible: bool,
    /// Bumped on every successful adjustment
    pub version: u64,
}

impl InventoryUnit {
    pub fn available_capacity(&self) -> u32 {
        self.total_capacity - self.reserved_capacity - self.sold_capacity
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CapacityError {
    #[error("Unit not found: {0}")]
    NotFound(Uuid),

    #[error("Insufficient capacity on unit {unit_id}: requested {requested}, available {available}")]
    Insufficient {
        unit_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Adjustment on unit {unit_id} would drive reserved/sold counts negative")]
    InvalidAdjustment { unit_id: Uuid },
}

/// Sole mutator of capacity counts. Adjustments are serialized per unit and
/// each successful one bumps the unit's version counter.
pub struct CapacityLedger {
    units: RwLock<HashMap<Uuid, Arc<Mutex<InventoryUnit>>>>,
}

impl CapacityLedger {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(HashMap::new()),
        }
    }

    /// Seed or replace a unit definition. Counts start from whatever the
    /// caller provides so re-seeding reference data keeps live reservations.
    pub fn insert_unit(&self, unit: InventoryUnit) {
        self.units
            .write()
            .unwrap()
            .insert(unit.unit_id, Arc::new(Mutex::new(unit)));
    }

    pub fn get(&self, unit_id: Uuid) -> Result<InventoryUnit, CapacityError> {
        let cell = self.cell(unit_id)?;
        let unit = cell.lock().unwrap();
        Ok(unit.clone())
    }

    /// Atomically shift reserved/sold counts. The capacity invariant
    /// (reserved + sold <= total, nothing negative) is checked before any
    /// field is written; concurrent adjustments on the same unit serialize
    /// on its lock.
    pub fn try_adjust(
        &self,
        unit_id: Uuid,
        delta_reserved: i64,
        delta_sold: i64,
    ) -> Result<InventoryUnit, CapacityError> {
        let cell = self.cell(unit_id)?;
        let mut unit = cell.lock().unwrap();

        let reserved = unit.reserved_capacity as i64 + delta_reserved;
        let sold = unit.sold_capacity as i64 + delta_sold;

        if reserved < 0 || sold < 0 {
            return Err(CapacityError::InvalidAdjustment { unit_id });
        }
        if reserved + sold > unit.total_capacity as i64 {
            return Err(CapacityError::Insufficient {
                unit_id,
                requested: delta_reserved.max(0) as u32 + delta_sold.max(0) as u32,
                available: unit.available_capacity(),
            });
        }

        unit.reserved_capacity = reserved as u32;
        unit.sold_capacity = sold as u32;
        unit.version += 1;
        tracing::debug!(
            unit_id = %unit_id,
            reserved = unit.reserved_capacity,
            sold = unit.sold_capacity,
            version = unit.version,
            "capacity adjusted"
        );
        Ok(unit.clone())
    }

    fn cell(&self, unit_id: Uuid) -> Result<Arc<Mutex<InventoryUnit>>, CapacityError> {
        self.units
            .read()
            .unwrap()
            .get(&unit_id)
            .cloned()
            .ok_or(CapacityError::NotFound(unit_id))
    }
}

impl Default for CapacityLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn test_unit(total: u32, price: Amount) -> InventoryUnit {
    InventoryUnit {
        unit_id: Uuid::new_v4(),
        product_type: ProductType::Event,
        parent_id: Uuid::new_v4(),
        total_capacity: total,
        reserved_capacity: 0,
        sold_capacity: 0,
        unit_price: price,
        currency: "USD".to_string(),
        is_premium: false,
        is_accessible: false,
        version: 0,
    }
}
