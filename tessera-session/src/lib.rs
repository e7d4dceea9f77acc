pub mod machine;
pub mod models;
pub mod reconcile;

pub use machine::{SessionError, SessionManager};
pub use models::{
    BookingSession, CheckoutPayload, ContactInfo, PriceDrift, SelectionPatch, SessionSnapshot,
    SessionStep,
};
pub use reconcile::Reconciler;
