use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldStatus {
    Active,
    Released,
    Expired,
    Consumed,
}

/// A time-bounded soft lock reserving quantity against one or more
/// inventory units. Owned by exactly one booking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub hold_id: Uuid,
    pub owner_token: String,
    pub unit_refs: BTreeMap<Uuid, u32>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: HoldStatus,
}

impl Hold {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == HoldStatus::Active && !self.is_expired_at(now)
    }

    /// Total quantity reserved across all unit refs
    pub fn total_quantity(&self) -> u32 {
        self.unit_refs.values().sum()
    }
}

/// Outcome of a release call. `released_count` is zero when the hold had
/// already been released or expired, so client retries stay harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReceipt {
    pub hold_id: Uuid,
    pub released_count: u32,
}
