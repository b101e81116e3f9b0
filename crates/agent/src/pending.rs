//! Per-user pending-action slots.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{Duration, Utc};

use greencart_core::{PendingAction, PendingSlot};

/// At most one outstanding multi-step action per user. Expiry is lazy: an
/// expired slot is dropped the next time that user is looked up.
pub struct PendingStore {
    ttl: Duration,
    slots: Mutex<HashMap<String, PendingSlot>>,
}

impl PendingStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs.min(i64::MAX as u64) as i64),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, user_id: &str) -> Option<PendingAction> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = slots
            .get(user_id)
            .is_some_and(|slot| slot.is_expired(self.ttl, Utc::now()));
        if expired {
            slots.remove(user_id);
        }
        slots.get(user_id).map(|slot| slot.action.clone())
    }

    /// Replaces any existing slot for the user.
    pub fn set(&self, user_id: &str, action: PendingAction) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(user_id.to_string(), PendingSlot::new(action, Utc::now()));
    }

    pub fn clear(&self, user_id: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(user_id);
    }
}
