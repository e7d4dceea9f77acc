pub mod catalog;
pub mod inventory;
pub mod pricing;
pub mod rules;

pub use catalog::{CatalogError, CatalogProvider, InMemoryCatalog, OptionDef, TimeBracket, UnitPricing, VehicleClass};
pub use inventory::{CapacityError, CapacityLedger, InventoryUnit};
pub use pricing::{PricingBreakdown, PricingEngine, PricingError, PricingRequest, UnitSelector};
pub use rules::{DiscountRule, FeeRule, InMemoryRules, Modifier, RuleProvider, TaxRule};
