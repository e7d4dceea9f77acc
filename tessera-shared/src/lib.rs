pub mod events;
pub mod money;
pub mod product;

pub use events::HoldEvent;
pub use money::{pct_of, Amount};
pub use product::{ProductType, TripType};
