pub mod expiry;
pub mod manager;
pub mod models;

pub use manager::{HoldError, HoldManager};
pub use models::{Hold, HoldStatus, ReleaseReceipt};
