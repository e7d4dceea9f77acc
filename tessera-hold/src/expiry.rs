use crate::manager::HoldManager;
use chrono::Utc;

impl HoldManager {
    /// Transition every lapsed hold to Expired and return capacity to the
    /// ledger. Returns how many holds were reclaimed. Safe to run
    /// concurrently with release/consume on the same holds: the per-hold
    /// status transition guarantees a single compensation.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut reclaimed = 0;
        for cell in self.hold_cells() {
            let mut hold = cell.lock().unwrap();
            if self.expire_if_due(&mut hold, now) {
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            tracing::info!(reclaimed, "expiry sweep reclaimed holds");
        }
        reclaimed
    }
}
