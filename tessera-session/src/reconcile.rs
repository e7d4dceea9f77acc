use crate::machine::SessionError;
use crate::models::{BookingSession, CheckoutPayload, PriceDrift};
use chrono::Utc;
use std::sync::Arc;
use tessera_catalog::{PricingEngine, PricingRequest, UnitSelector};
use tessera_hold::{HoldError, HoldManager};

/// Keeps a session's hold and price breakdown in step with its selections.
/// Every material change funnels through here so the session never carries
/// client-side arithmetic: the ledger and the pricing engine are the only
/// sources of truth.
pub struct Reconciler {
    holds: Arc<HoldManager>,
    pricing: Arc<PricingEngine>,
}

impl Reconciler {
    pub fn new(holds: Arc<HoldManager>, pricing: Arc<PricingEngine>) -> Self {
        Self { holds, pricing }
    }

    pub fn holds(&self) -> &HoldManager {
        &self.holds
    }

    /// Release the session's active hold, if any. Releasing twice is
    /// harmless, so this is safe to call on every invalidating mutation.
    pub fn release_active(&self, session: &mut BookingSession) {
        if let Some(hold_id) = session.active_hold_id.take() {
            match self.holds.release(hold_id) {
                Ok(receipt) => {
                    tracing::debug!(
                        session_id = %session.session_id,
                        hold_id = %hold_id,
                        released = receipt.released_count,
                        "stale hold released"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        session_id = %session.session_id,
                        hold_id = %hold_id,
                        error = %err,
                        "failed to release stale hold"
                    );
                }
            }
        }
    }

    /// Bring hold and breakdown in line with the current selections.
    /// With `acquire` set, capacity is (re-)requested for the desired unit
    /// refs; the previous hold is released first whenever it no longer
    /// matches. Afterwards the authoritative breakdown is recomputed and
    /// client-estimate drift recorded.
    pub async fn reconcile(
        &self,
        session: &mut BookingSession,
        acquire: bool,
    ) -> Result<(), SessionError> {
        if acquire {
            let desired = session.desired_refs();
            if !desired.is_empty() {
                let now = Utc::now();
                if let Some(hold_id) = session.active_hold_id {
                    let matches = self
                        .holds
                        .get(hold_id)
                        .map(|h| h.is_active_at(now) && h.unit_refs == desired)
                        .unwrap_or(false);
                    if !matches {
                        self.release_active(session);
                    }
                }
                let hold = self
                    .holds
                    .acquire(&session.owner_token, desired, None)?;
                session.active_hold_id = Some(hold.hold_id);
            }
        }

        if let Some(request) = pricing_request(session) {
            let breakdown = self.pricing.calculate(&request).await?;
            session.price_drift = match session.client_estimate {
                Some(estimate) if estimate != breakdown.final_price => {
                    tracing::warn!(
                        session_id = %session.session_id,
                        estimate,
                        authoritative = breakdown.final_price,
                        "client price estimate drifted from authoritative breakdown"
                    );
                    Some(PriceDrift {
                        client_estimate: estimate,
                        authoritative: breakdown.final_price,
                        delta: breakdown.final_price - estimate,
                    })
                }
                _ => None,
            };
            session.last_breakdown = Some(breakdown);
        }
        Ok(())
    }

    /// Terminal success: refresh the breakdown, consume the hold and build
    /// the payload the external Order/Cart collaborator materializes.
    pub async fn checkout(
        &self,
        session: &mut BookingSession,
    ) -> Result<CheckoutPayload, SessionError> {
        self.reconcile(session, true).await?;

        let hold_id = session.active_hold_id.ok_or(SessionError::StaleHold)?;
        let hold = self
            .holds
            .consume_owned(hold_id, &session.owner_token)
            .map_err(|err| match err {
                HoldError::AlreadyExpired(_) | HoldError::NotFound(_) => SessionError::StaleHold,
                other => SessionError::Hold(other),
            })?;
        let breakdown = session
            .last_breakdown
            .clone()
            .ok_or(SessionError::StaleHold)?;

        tracing::info!(
            session_id = %session.session_id,
            hold_id = %hold_id,
            final_price = breakdown.final_price,
            "session checked out"
        );
        Ok(CheckoutPayload {
            session_id: session.session_id,
            hold_id,
            unit_refs: hold.unit_refs,
            breakdown,
        })
    }
}

/// Build the authoritative pricing request once the selection is priceable.
/// Seat-level picks price the selected cell with the summed seat quantity.
fn pricing_request(session: &BookingSession) -> Option<PricingRequest> {
    let unit_id = session.unit_id?;
    let quantity = if session.seat_refs.is_empty() {
        session.quantity
    } else {
        session.seat_refs.values().sum()
    };
    if quantity == 0 {
        return None;
    }
    Some(PricingRequest {
        selector: UnitSelector::Unit { unit_id },
        quantity,
        trip_type: session.trip_type,
        outbound_hour: session.outbound_hour,
        return_hour: session.return_hour,
        selected_options: session.selected_options.clone(),
        discount_code: session.discount_code.clone(),
    })
}
