use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Hold lifecycle notifications, broadcast so availability views can react
/// without polling the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum HoldEvent {
    Acquired {
        hold_id: Uuid,
        unit_refs: BTreeMap<Uuid, u32>,
        expires_at: DateTime<Utc>,
    },
    Released {
        hold_id: Uuid,
        unit_refs: BTreeMap<Uuid, u32>,
    },
    Expired {
        hold_id: Uuid,
        unit_refs: BTreeMap<Uuid, u32>,
    },
    Consumed {
        hold_id: Uuid,
        unit_refs: BTreeMap<Uuid, u32>,
    },
}

impl HoldEvent {
    /// Units touched by this event, used for per-unit stream filtering.
    pub fn unit_ids(&self) -> impl Iterator<Item = &Uuid> {
        match self {
            HoldEvent::Acquired { unit_refs, .. }
            | HoldEvent::Released { unit_refs, .. }
            | HoldEvent::Expired { unit_refs, .. }
            | HoldEvent::Consumed { unit_refs, .. } => unit_refs.keys(),
        }
    }
}
