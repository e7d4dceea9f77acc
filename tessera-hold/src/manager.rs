use crate::models::{Hold, HoldStatus, ReleaseReceipt};
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use tessera_catalog::{CapacityError, CapacityLedger};
use tessera_shared::HoldEvent;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum HoldError {
    #[error("Hold not found: {0}")]
    NotFound(Uuid),

    #[error("Hold already expired or finished: {0}")]
    AlreadyExpired(Uuid),

    #[error("Unit {unit_id} unavailable: requested {requested}, available {available}")]
    PartiallyUnavailable {
        unit_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Hold {0} belongs to another owner")]
    OwnerMismatch(Uuid),

    #[error("Unknown unit: {0}")]
    UnknownUnit(Uuid),

    #[error("Invalid hold request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

/// Issues, renews and retires soft locks against the capacity ledger.
/// Exactly one of release/consume/expire compensates capacity for a given
/// hold; the per-hold lock makes the status transition the linearization
/// point.
pub struct HoldManager {
    ledger: Arc<CapacityLedger>,
    holds: RwLock<HashMap<Uuid, Arc<Mutex<Hold>>>>,
    events: broadcast::Sender<HoldEvent>,
    default_ttl: Duration,
}

impl HoldManager {
    pub fn new(ledger: Arc<CapacityLedger>, default_ttl_seconds: i64) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            ledger,
            holds: RwLock::new(HashMap::new()),
            events,
            default_ttl: Duration::seconds(default_ttl_seconds),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HoldEvent> {
        self.events.subscribe()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Reserve quantity on every referenced unit, all or nothing. On partial
    /// failure every already-reserved unit is compensated before the error
    /// is returned. Re-acquiring an identical ref set for the same owner
    /// renews the existing hold instead of double-counting.
    pub fn acquire(
        &self,
        owner_token: &str,
        unit_refs: BTreeMap<Uuid, u32>,
        ttl: Option<Duration>,
    ) -> Result<Hold, HoldError> {
        if unit_refs.is_empty() {
            return Err(HoldError::InvalidRequest(
                "hold must reference at least one unit".to_string(),
            ));
        }
        if unit_refs.values().any(|&qty| qty == 0) {
            return Err(HoldError::InvalidRequest(
                "unit quantities must be positive".to_string(),
            ));
        }

        let ttl = ttl.unwrap_or(self.default_ttl);

        if let Some(existing) = self.find_owner_hold(owner_token, &unit_refs) {
            tracing::debug!(hold_id = %existing, owner = owner_token, "re-acquire treated as renew");
            return self.renew(existing, Some(ttl));
        }

        let mut reserved: Vec<(Uuid, u32)> = Vec::with_capacity(unit_refs.len());
        for (&unit_id, &qty) in &unit_refs {
            match self.ledger.try_adjust(unit_id, qty as i64, 0) {
                Ok(_) => reserved.push((unit_id, qty)),
                Err(err) => {
                    for &(done_unit, done_qty) in &reserved {
                        if let Err(rollback_err) =
                            self.ledger.try_adjust(done_unit, -(done_qty as i64), 0)
                        {
                            tracing::error!(
                                unit_id = %done_unit,
                                error = %rollback_err,
                                "rollback failed after partial acquire"
                            );
                        }
                    }
                    return Err(match err {
                        CapacityError::Insufficient {
                            unit_id,
                            requested,
                            available,
                        } => HoldError::PartiallyUnavailable {
                            unit_id,
                            requested,
                            available,
                        },
                        CapacityError::NotFound(id) => HoldError::UnknownUnit(id),
                        other => HoldError::Capacity(other),
                    });
                }
            }
        }

        let now = Utc::now();
        let hold = Hold {
            hold_id: Uuid::new_v4(),
            owner_token: owner_token.to_string(),
            unit_refs,
            created_at: now,
            expires_at: now + ttl,
            status: HoldStatus::Active,
        };
        self.holds
            .write()
            .unwrap()
            .insert(hold.hold_id, Arc::new(Mutex::new(hold.clone())));

        tracing::info!(
            hold_id = %hold.hold_id,
            owner = owner_token,
            units = hold.unit_refs.len(),
            quantity = hold.total_quantity(),
            expires_at = %hold.expires_at,
            "hold acquired"
        );
        let _ = self.events.send(HoldEvent::Acquired {
            hold_id: hold.hold_id,
            unit_refs: hold.unit_refs.clone(),
            expires_at: hold.expires_at,
        });
        Ok(hold)
    }

    /// Extend a hold's expiry. Fails once the hold has expired or finished.
    pub fn renew(&self, hold_id: Uuid, ttl: Option<Duration>) -> Result<Hold, HoldError> {
        let cell = self.cell(hold_id)?;
        let mut hold = cell.lock().unwrap();

        let now = Utc::now();
        if self.expire_if_due(&mut hold, now) {
            return Err(HoldError::AlreadyExpired(hold_id));
        }
        if hold.status != HoldStatus::Active {
            return Err(HoldError::AlreadyExpired(hold_id));
        }

        hold.expires_at = now + ttl.unwrap_or(self.default_ttl);
        tracing::debug!(hold_id = %hold_id, expires_at = %hold.expires_at, "hold renewed");
        Ok(hold.clone())
    }

    pub fn renew_owned(
        &self,
        hold_id: Uuid,
        owner_token: &str,
        ttl: Option<Duration>,
    ) -> Result<Hold, HoldError> {
        self.check_owner(hold_id, owner_token)?;
        self.renew(hold_id, ttl)
    }

    /// Idempotent release. Whatever quantity is still reserved is returned
    /// to the ledger; a hold that already expired or was released reports
    /// `released_count = 0` so retries and release-after-expiry stay safe.
    pub fn release(&self, hold_id: Uuid) -> Result<ReleaseReceipt, HoldError> {
        let cell = self.cell(hold_id)?;
        let mut hold = cell.lock().unwrap();

        let now = Utc::now();
        self.expire_if_due(&mut hold, now);
        if hold.status != HoldStatus::Active {
            return Ok(ReleaseReceipt {
                hold_id,
                released_count: 0,
            });
        }

        self.compensate(&hold);
        hold.status = HoldStatus::Released;
        tracing::info!(hold_id = %hold_id, quantity = hold.total_quantity(), "hold released");
        let _ = self.events.send(HoldEvent::Released {
            hold_id,
            unit_refs: hold.unit_refs.clone(),
        });
        Ok(ReleaseReceipt {
            hold_id,
            released_count: hold.total_quantity(),
        })
    }

    pub fn release_owned(
        &self,
        hold_id: Uuid,
        owner_token: &str,
    ) -> Result<ReleaseReceipt, HoldError> {
        self.check_owner(hold_id, owner_token)?;
        self.release(hold_id)
    }

    /// Convert the hold's reserved quantity into sold quantity, atomically
    /// per unit and net-zero against total committed capacity.
    pub fn consume(&self, hold_id: Uuid) -> Result<Hold, HoldError> {
        let cell = self.cell(hold_id)?;
        let mut hold = cell.lock().unwrap();

        let now = Utc::now();
        if self.expire_if_due(&mut hold, now) || hold.status != HoldStatus::Active {
            return Err(HoldError::AlreadyExpired(hold_id));
        }

        for (&unit_id, &qty) in &hold.unit_refs {
            self.ledger.try_adjust(unit_id, -(qty as i64), qty as i64)?;
        }
        hold.status = HoldStatus::Consumed;
        tracing::info!(hold_id = %hold_id, quantity = hold.total_quantity(), "hold consumed");
        let _ = self.events.send(HoldEvent::Consumed {
            hold_id,
            unit_refs: hold.unit_refs.clone(),
        });
        Ok(hold.clone())
    }

    pub fn consume_owned(&self, hold_id: Uuid, owner_token: &str) -> Result<Hold, HoldError> {
        self.check_owner(hold_id, owner_token)?;
        self.consume(hold_id)
    }

    pub fn get(&self, hold_id: Uuid) -> Result<Hold, HoldError> {
        let cell = self.cell(hold_id)?;
        let hold = cell.lock().unwrap();
        Ok(hold.clone())
    }

    /// Expire the hold in place when its TTL has lapsed, compensating
    /// capacity exactly once. Caller must hold the hold's lock.
    pub(crate) fn expire_if_due(&self, hold: &mut Hold, now: chrono::DateTime<Utc>) -> bool {
        if hold.status != HoldStatus::Active || !hold.is_expired_at(now) {
            return false;
        }
        self.compensate(hold);
        hold.status = HoldStatus::Expired;
        tracing::info!(hold_id = %hold.hold_id, "hold expired");
        let _ = self.events.send(HoldEvent::Expired {
            hold_id: hold.hold_id,
            unit_refs: hold.unit_refs.clone(),
        });
        true
    }

    pub(crate) fn hold_cells(&self) -> Vec<Arc<Mutex<Hold>>> {
        self.holds.read().unwrap().values().cloned().collect()
    }

    fn compensate(&self, hold: &Hold) {
        for (&unit_id, &qty) in &hold.unit_refs {
            if let Err(err) = self.ledger.try_adjust(unit_id, -(qty as i64), 0) {
                tracing::error!(
                    hold_id = %hold.hold_id,
                    unit_id = %unit_id,
                    error = %err,
                    "capacity compensation failed"
                );
            }
        }
    }

    fn find_owner_hold(&self, owner_token: &str, unit_refs: &BTreeMap<Uuid, u32>) -> Option<Uuid> {
        let now = Utc::now();
        for cell in self.hold_cells() {
            let hold = cell.lock().unwrap();
            if hold.owner_token == owner_token
                && hold.is_active_at(now)
                && &hold.unit_refs == unit_refs
            {
                return Some(hold.hold_id);
            }
        }
        None
    }

    fn check_owner(&self, hold_id: Uuid, owner_token: &str) -> Result<(), HoldError> {
        let cell = self.cell(hold_id)?;
        let hold = cell.lock().unwrap();
        if hold.owner_token != owner_token {
            return Err(HoldError::OwnerMismatch(hold_id));
        }
        Ok(())
    }

    fn cell(&self, hold_id: Uuid) -> Result<Arc<Mutex<Hold>>, HoldError> {
        self.holds
            .read()
            .unwrap()
            .get(&hold_id)
            .cloned()
            .ok_or(HoldError::NotFound(hold_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_catalog::InventoryUnit;
    use tessera_shared::ProductType;

    fn seeded_ledger(units: &[(Uuid, u32)]) -> Arc<CapacityLedger> {
        let ledger = Arc::new(CapacityLedger::new());
        for &(unit_id, total) in units {
            ledger.insert_unit(InventoryUnit {
                unit_id,
                product_type: ProductType::Event,
                parent_id: Uuid::new_v4(),
                total_capacity: total,
                reserved_capacity: 0,
                sold_capacity: 0,
                unit_price: 5000,
                currency: "USD".to_string(),
                is_premium: false,
                is_accessible: false,
                version: 0,
            });
        }
        ledger
    }

    fn refs(pairs: &[(Uuid, u32)]) -> BTreeMap<Uuid, u32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_acquire_release_lifecycle() {
        let unit_id = Uuid::new_v4();
        let ledger = seeded_ledger(&[(unit_id, 3)]);
        let manager = HoldManager::new(ledger.clone(), 600);

        let hold = manager
            .acquire("session-1", refs(&[(unit_id, 2)]), None)
            .unwrap();
        assert_eq!(ledger.get(unit_id).unwrap().available_capacity(), 1);

        let receipt = manager.release(hold.hold_id).unwrap();
        assert_eq!(receipt.released_count, 2);
        assert_eq!(ledger.get(unit_id).unwrap().available_capacity(), 3);
    }

    #[test]
    fn test_release_is_idempotent() {
        let unit_id = Uuid::new_v4();
        let ledger = seeded_ledger(&[(unit_id, 3)]);
        let manager = HoldManager::new(ledger.clone(), 600);

        let hold = manager
            .acquire("session-1", refs(&[(unit_id, 2)]), None)
            .unwrap();
        manager.release(hold.hold_id).unwrap();

        let second = manager.release(hold.hold_id).unwrap();
        assert_eq!(second.released_count, 0);
        assert_eq!(ledger.get(unit_id).unwrap().available_capacity(), 3);
    }

    #[test]
    fn test_partial_failure_rolls_back() {
        let unit_a = Uuid::new_v4();
        let unit_b = Uuid::new_v4();
        let ledger = seeded_ledger(&[(unit_a, 10), (unit_b, 1)]);
        let manager = HoldManager::new(ledger.clone(), 600);

        let err = manager
            .acquire("session-1", refs(&[(unit_a, 2), (unit_b, 5)]), None)
            .unwrap_err();
        match err {
            HoldError::PartiallyUnavailable {
                unit_id, available, ..
            } => {
                assert_eq!(unit_id, unit_b);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // unit A's reservation was compensated
        assert_eq!(ledger.get(unit_a).unwrap().available_capacity(), 10);
        assert_eq!(ledger.get(unit_b).unwrap().available_capacity(), 1);
    }

    #[test]
    fn test_reacquire_same_refs_renews() {
        let unit_id = Uuid::new_v4();
        let ledger = seeded_ledger(&[(unit_id, 3)]);
        let manager = HoldManager::new(ledger.clone(), 600);

        let first = manager
            .acquire("session-1", refs(&[(unit_id, 2)]), None)
            .unwrap();
        let second = manager
            .acquire("session-1", refs(&[(unit_id, 2)]), None)
            .unwrap();

        assert_eq!(first.hold_id, second.hold_id);
        assert!(second.expires_at >= first.expires_at);
        // no double reservation
        assert_eq!(ledger.get(unit_id).unwrap().available_capacity(), 1);
    }

    #[test]
    fn test_consume_moves_reserved_to_sold() {
        let unit_id = Uuid::new_v4();
        let ledger = seeded_ledger(&[(unit_id, 3)]);
        let manager = HoldManager::new(ledger.clone(), 600);

        let hold = manager
            .acquire("session-1", refs(&[(unit_id, 2)]), None)
            .unwrap();
        manager.consume(hold.hold_id).unwrap();

        let unit = ledger.get(unit_id).unwrap();
        assert_eq!(unit.reserved_capacity, 0);
        assert_eq!(unit.sold_capacity, 2);
        assert_eq!(unit.available_capacity(), 1);

        // a consumed hold cannot be released back
        let receipt = manager.release(hold.hold_id).unwrap();
        assert_eq!(receipt.released_count, 0);
        assert_eq!(ledger.get(unit_id).unwrap().sold_capacity, 2);
    }

    #[test]
    fn test_expired_hold_rejects_consume_and_renew() {
        let unit_id = Uuid::new_v4();
        let ledger = seeded_ledger(&[(unit_id, 3)]);
        let manager = HoldManager::new(ledger.clone(), 600);

        let hold = manager
            .acquire("session-1", refs(&[(unit_id, 2)]), Some(Duration::seconds(-1)))
            .unwrap();

        let err = manager.consume(hold.hold_id).unwrap_err();
        assert!(matches!(err, HoldError::AlreadyExpired(_)));
        let err = manager.renew(hold.hold_id, None).unwrap_err();
        assert!(matches!(err, HoldError::AlreadyExpired(_)));
        // lazy expiry compensated exactly once
        assert_eq!(ledger.get(unit_id).unwrap().available_capacity(), 3);
    }

    #[test]
    fn test_owner_mismatch() {
        let unit_id = Uuid::new_v4();
        let ledger = seeded_ledger(&[(unit_id, 3)]);
        let manager = HoldManager::new(ledger, 600);

        let hold = manager
            .acquire("session-1", refs(&[(unit_id, 1)]), None)
            .unwrap();
        let err = manager.release_owned(hold.hold_id, "someone-else").unwrap_err();
        assert!(matches!(err, HoldError::OwnerMismatch(_)));

        manager.release_owned(hold.hold_id, "session-1").unwrap();
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let ledger = seeded_ledger(&[]);
        let manager = HoldManager::new(ledger, 600);

        let err = manager
            .acquire("session-1", refs(&[(Uuid::new_v4(), 1)]), None)
            .unwrap_err();
        assert!(matches!(err, HoldError::UnknownUnit(_)));
    }

    #[test]
    fn test_empty_request_rejected() {
        let ledger = seeded_ledger(&[]);
        let manager = HoldManager::new(ledger, 600);
        let err = manager.acquire("session-1", BTreeMap::new(), None).unwrap_err();
        assert!(matches!(err, HoldError::InvalidRequest(_)));
    }
}
