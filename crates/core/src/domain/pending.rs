use chrono::{DateTime, Duration, Utc};

/// The single outstanding multi-step action for one user. Created when a
/// handler defers completion, cleared on completion, explicit cancellation,
/// or expiry. The terminal state is always "no pending action".
#[derive(Clone, Debug, PartialEq)]
pub enum PendingAction {
    /// Checkout reported a total and is waiting for a coupon code or a skip.
    AwaitingCoupon { cart_total: f64 },
    /// An order cancellation is waiting for a yes/no confirmation.
    AwaitingConfirmation { order_id: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PendingSlot {
    pub action: PendingAction,
    pub created_at: DateTime<Utc>,
}

impl PendingSlot {
    pub fn new(action: PendingAction, now: DateTime<Utc>) -> Self {
        Self { action, created_at: now }
    }

    /// Lazy expiry check; there is no background sweep.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }
}
