use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_catalog::PricingBreakdown;
use tessera_shared::{Amount, ProductType, TripType};
use uuid::Uuid;

/// Ordered step pipeline of a booking flow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStep {
    SelectingProduct,
    SelectingSchedule,
    SelectingQuantityOrSeats,
    SelectingOptions,
    EnteringContact,
    ReviewingSummary,
}

impl SessionStep {
    pub fn next(self) -> Option<SessionStep> {
        use SessionStep::*;
        match self {
            SelectingProduct => Some(SelectingSchedule),
            SelectingSchedule => Some(SelectingQuantityOrSeats),
            SelectingQuantityOrSeats => Some(SelectingOptions),
            SelectingOptions => Some(EnteringContact),
            EnteringContact => Some(ReviewingSummary),
            ReviewingSummary => None,
        }
    }

    pub fn prev(self) -> Option<SessionStep> {
        use SessionStep::*;
        match self {
            SelectingProduct => None,
            SelectingSchedule => Some(SelectingProduct),
            SelectingQuantityOrSeats => Some(SelectingSchedule),
            SelectingOptions => Some(SelectingQuantityOrSeats),
            EnteringContact => Some(SelectingOptions),
            ReviewingSummary => Some(EnteringContact),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactInfo {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Gap between what the client estimated and what the pricing engine
/// computed. Surfaced, never adopted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceDrift {
    pub client_estimate: Amount,
    pub authoritative: Amount,
    pub delta: Amount,
}

/// One selection mutation. Patches touching unit identity force the active
/// hold to be released before anything else happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "field", content = "value")]
pub enum SelectionPatch {
    Product(ProductType),
    /// Performance, route or schedule
    Parent(Uuid),
    /// Sellable cell (section × ticket type, vehicle on route, variant)
    Unit(Uuid),
    TripType(TripType),
    TimeOfDay {
        outbound_hour: Option<u8>,
        return_hour: Option<u8>,
    },
    Quantity(u32),
    /// Seat-level selection: unit -> quantity per seat cell
    Seats(BTreeMap<Uuid, u32>),
    Options(BTreeMap<Uuid, u32>),
    DiscountCode(Option<String>),
    Contact(ContactInfo),
    ClientEstimate(Option<Amount>),
}

impl SelectionPatch {
    /// Does this patch change which units the active hold refers to?
    pub fn invalidates_hold(&self) -> bool {
        matches!(
            self,
            SelectionPatch::Product(_)
                | SelectionPatch::Parent(_)
                | SelectionPatch::Unit(_)
                | SelectionPatch::TripType(_)
                | SelectionPatch::Quantity(_)
                | SelectionPatch::Seats(_)
        )
    }

    /// Does this patch re-request capacity (as opposed to only invalidating)?
    pub fn requests_capacity(&self) -> bool {
        matches!(self, SelectionPatch::Quantity(_) | SelectionPatch::Seats(_))
    }
}

/// The in-progress, single-owner selection state driving the step pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSession {
    pub session_id: Uuid,
    pub owner_token: String,
    pub product_type: Option<ProductType>,
    pub parent_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub trip_type: TripType,
    pub outbound_hour: Option<u8>,
    pub return_hour: Option<u8>,
    pub quantity: u32,
    pub seat_refs: BTreeMap<Uuid, u32>,
    pub selected_options: BTreeMap<Uuid, u32>,
    pub discount_code: Option<String>,
    pub contact: Option<ContactInfo>,
    pub client_estimate: Option<Amount>,
    pub current_step: SessionStep,
    pub active_hold_id: Option<Uuid>,
    pub last_breakdown: Option<PricingBreakdown>,
    pub price_drift: Option<PriceDrift>,
    pub errors: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingSession {
    pub fn new(owner_token: String) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            owner_token,
            product_type: None,
            parent_id: None,
            unit_id: None,
            trip_type: TripType::OneWay,
            outbound_hour: None,
            return_hour: None,
            quantity: 0,
            seat_refs: BTreeMap::new(),
            selected_options: BTreeMap::new(),
            discount_code: None,
            contact: None,
            client_estimate: None,
            current_step: SessionStep::SelectingProduct,
            active_hold_id: None,
            last_breakdown: None,
            price_drift: None,
            errors: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Unit quantities the hold should cover for the current selection.
    /// Seat-level picks win; otherwise the selected cell with the session
    /// quantity (one vehicle for transfers, priced per vehicle).
    pub fn desired_refs(&self) -> BTreeMap<Uuid, u32> {
        if !self.seat_refs.is_empty() {
            return self.seat_refs.clone();
        }
        match self.unit_id {
            Some(unit_id) => {
                let qty = match self.product_type {
                    Some(ProductType::Transfer) => 1,
                    _ => self.quantity,
                };
                if qty == 0 {
                    BTreeMap::new()
                } else {
                    [(unit_id, qty)].into_iter().collect()
                }
            }
            None => BTreeMap::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Owned copy of the session state returned by every state-machine
/// operation; callers never hold a reference into the live session.
pub type SessionSnapshot = BookingSession;

/// Handed to the external Order/Cart collaborator on terminal success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutPayload {
    pub session_id: Uuid,
    pub hold_id: Uuid,
    pub unit_refs: BTreeMap<Uuid, u32>,
    pub breakdown: PricingBreakdown,
}
