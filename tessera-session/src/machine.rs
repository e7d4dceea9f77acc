use crate::models::{
    BookingSession, CheckoutPayload, SelectionPatch, SessionSnapshot, SessionStep,
};
use crate::reconcile::Reconciler;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tessera_hold::HoldError;
use tessera_catalog::PricingError;
use tessera_shared::ProductType;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot advance from {step:?}: missing {missing:?}")]
    InvalidTransition {
        step: SessionStep,
        missing: Vec<String>,
    },

    #[error("Active hold is missing, stale or expired")]
    StaleHold,

    #[error(transparent)]
    Hold(#[from] HoldError),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Drives booking sessions through the step pipeline. Transitions on one
/// session serialize on its lock; distinct sessions proceed independently
/// while hold and pricing calls are awaited.
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<BookingSession>>>>,
    reconciler: Reconciler,
}

impl SessionManager {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            reconciler,
        }
    }

    pub fn create(&self, owner_token: &str) -> SessionSnapshot {
        let session = BookingSession::new(owner_token.to_string());
        self.sessions
            .write()
            .unwrap()
            .insert(session.session_id, Arc::new(Mutex::new(session.clone())));
        tracing::info!(session_id = %session.session_id, "booking session created");
        session
    }

    pub async fn get(&self, session_id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let cell = self.cell(session_id)?;
        let session = cell.lock().await;
        Ok(session.clone())
    }

    /// Move forward one step, if the current step's requirements are met.
    /// Gate failures leave every committed field untouched and report the
    /// missing fields both in the error and the session's error map.
    pub async fn advance(&self, session_id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let cell = self.cell(session_id)?;
        let mut session = cell.lock().await;

        let step = session.current_step;
        let next = match step.next() {
            Some(next) => next,
            None => {
                return Err(SessionError::InvalidTransition {
                    step,
                    missing: vec!["checkout".to_string()],
                })
            }
        };

        let missing = missing_fields(&session);
        if !missing.is_empty() {
            session.errors = missing
                .iter()
                .map(|field| (field.clone(), field_message(field)))
                .collect();
            return Err(SessionError::InvalidTransition { step, missing });
        }

        // Seat/quantity selections only move forward backed by a live hold.
        if step == SessionStep::SelectingQuantityOrSeats {
            self.verify_active_hold(&session)?;
        }
        // The summary must show a fresh, authoritative breakdown.
        if next == SessionStep::ReviewingSummary {
            self.reconciler.reconcile(&mut session, true).await?;
            self.verify_active_hold(&session)?;
        }

        session.errors.clear();
        session.current_step = next;
        session.touch();
        tracing::debug!(session_id = %session_id, step = ?next, "session advanced");
        Ok(session.clone())
    }

    /// Move backward one step. Always allowed; stepping back to schedule
    /// selection or earlier releases the active hold, since downstream
    /// selections are no longer guaranteed available.
    pub async fn retreat(&self, session_id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let cell = self.cell(session_id)?;
        let mut session = cell.lock().await;

        if let Some(prev) = session.current_step.prev() {
            session.current_step = prev;
            if prev <= SessionStep::SelectingSchedule {
                self.reconciler.release_active(&mut session);
            }
            session.touch();
            tracing::debug!(session_id = %session_id, step = ?prev, "session retreated");
        }
        Ok(session.clone())
    }

    /// Apply one selection patch, then reconcile holds and pricing. Identity
    /// patches release the prior hold up front (its unit refs are stale the
    /// moment the field changes); if the subsequent acquire or calculate
    /// fails, no field mutation is committed.
    pub async fn mutate_selection(
        &self,
        session_id: Uuid,
        patch: SelectionPatch,
    ) -> Result<SessionSnapshot, SessionError> {
        let cell = self.cell(session_id)?;
        let mut session = cell.lock().await;

        if patch.invalidates_hold() {
            self.reconciler.release_active(&mut session);
        }

        let mut draft = session.clone();
        apply_patch(&mut draft, patch.clone());
        self.reconciler
            .reconcile(&mut draft, patch.requests_capacity())
            .await?;
        draft.errors.clear();
        draft.touch();
        *session = draft;
        Ok(session.clone())
    }

    /// Terminal success from the summary step: consume the hold, hand the
    /// breakdown and unit refs to the Order/Cart collaborator, drop the
    /// session.
    pub async fn checkout(&self, session_id: Uuid) -> Result<CheckoutPayload, SessionError> {
        let cell = self.cell(session_id)?;
        let mut session = cell.lock().await;

        if session.current_step != SessionStep::ReviewingSummary {
            return Err(SessionError::InvalidTransition {
                step: session.current_step,
                missing: vec!["reviewing_summary".to_string()],
            });
        }
        let payload = self.reconciler.checkout(&mut session).await?;
        drop(session);
        self.sessions.write().unwrap().remove(&session_id);
        Ok(payload)
    }

    /// Terminal failure/abandon from any step: release the hold, drop the
    /// session.
    pub async fn abandon(&self, session_id: Uuid) -> Result<(), SessionError> {
        let cell = self.cell(session_id)?;
        let mut session = cell.lock().await;
        self.reconciler.release_active(&mut session);
        tracing::info!(session_id = %session_id, "booking session abandoned");
        drop(session);
        self.sessions.write().unwrap().remove(&session_id);
        Ok(())
    }

    fn verify_active_hold(&self, session: &BookingSession) -> Result<(), SessionError> {
        let hold_id = session.active_hold_id.ok_or(SessionError::StaleHold)?;
        let hold = self
            .reconciler
            .holds()
            .get(hold_id)
            .map_err(|_| SessionError::StaleHold)?;
        if !hold.is_active_at(Utc::now()) || hold.unit_refs != session.desired_refs() {
            return Err(SessionError::StaleHold);
        }
        Ok(())
    }

    fn cell(&self, session_id: Uuid) -> Result<Arc<Mutex<BookingSession>>, SessionError> {
        self.sessions
            .read()
            .unwrap()
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::NotFound(session_id))
    }
}

/// Fields the current step requires before the next one opens up
fn missing_fields(session: &BookingSession) -> Vec<String> {
    let mut missing = Vec::new();
    match session.current_step {
        SessionStep::SelectingProduct => {
            if session.product_type.is_none() {
                missing.push("product_type".to_string());
            }
        }
        SessionStep::SelectingSchedule => {
            if session.parent_id.is_none() {
                missing.push("parent_id".to_string());
            }
            if session.product_type == Some(ProductType::Transfer)
                && session.outbound_hour.is_none()
            {
                missing.push("outbound_hour".to_string());
            }
            if session.trip_type == tessera_shared::TripType::RoundTrip
                && session.return_hour.is_none()
            {
                missing.push("return_hour".to_string());
            }
        }
        SessionStep::SelectingQuantityOrSeats => {
            if session.unit_id.is_none() {
                missing.push("unit_id".to_string());
            }
            if session.quantity == 0 && session.seat_refs.is_empty() {
                missing.push("quantity".to_string());
            }
        }
        SessionStep::SelectingOptions => {}
        SessionStep::EnteringContact => {
            if session.contact.is_none() {
                missing.push("contact".to_string());
            }
        }
        SessionStep::ReviewingSummary => {}
    }
    missing
}

fn field_message(field: &str) -> String {
    match field {
        "product_type" => "select a product to continue".to_string(),
        "parent_id" => "select a performance, route or schedule".to_string(),
        "outbound_hour" => "select a pickup time".to_string(),
        "return_hour" => "select a return time for the round trip".to_string(),
        "unit_id" => "select a section, vehicle or variant".to_string(),
        "quantity" => "select at least one seat or passenger".to_string(),
        "contact" => "enter contact details".to_string(),
        other => format!("{other} is required"),
    }
}

/// Write the patched field, clearing whatever downstream state it
/// invalidates.
fn apply_patch(session: &mut BookingSession, patch: SelectionPatch) {
    match patch {
        SelectionPatch::Product(product_type) => {
            session.product_type = Some(product_type);
            session.parent_id = None;
            session.unit_id = None;
            session.quantity = 0;
            session.seat_refs.clear();
            session.selected_options.clear();
            session.last_breakdown = None;
            session.price_drift = None;
        }
        SelectionPatch::Parent(parent_id) => {
            session.parent_id = Some(parent_id);
            session.unit_id = None;
            session.seat_refs.clear();
            session.selected_options.clear();
            session.last_breakdown = None;
            session.price_drift = None;
        }
        SelectionPatch::Unit(unit_id) => {
            session.unit_id = Some(unit_id);
            session.seat_refs.clear();
            session.selected_options.clear();
        }
        SelectionPatch::TripType(trip_type) => {
            session.trip_type = trip_type;
        }
        SelectionPatch::TimeOfDay {
            outbound_hour,
            return_hour,
        } => {
            session.outbound_hour = outbound_hour;
            session.return_hour = return_hour;
        }
        SelectionPatch::Quantity(quantity) => {
            session.quantity = quantity;
            session.seat_refs.clear();
        }
        SelectionPatch::Seats(seat_refs) => {
            session.seat_refs = seat_refs;
            session.quantity = 0;
        }
        SelectionPatch::Options(options) => {
            session.selected_options = options;
        }
        SelectionPatch::DiscountCode(code) => {
            session.discount_code = code;
        }
        SelectionPatch::Contact(contact) => {
            session.contact = Some(contact);
        }
        SelectionPatch::ClientEstimate(estimate) => {
            session.client_estimate = estimate;
        }
    }
}
