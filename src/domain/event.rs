use super::identity::UserId;
use super::order::OrderId;
use serde::Serialize;

/// Lifecycle events handed to the notification boundary.
///
/// The set is closed so a delivery system can match every case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    OrderCreated {
        order_id: OrderId,
        owner_id: UserId,
    },
    ApplicationReceived {
        order_id: OrderId,
        owner_id: UserId,
        maid_id: UserId,
    },
    ApplicationAccepted {
        order_id: OrderId,
        owner_id: UserId,
        maid_id: UserId,
    },
    ApplicationRejected {
        order_id: OrderId,
        maid_id: UserId,
    },
    OrderCancelled {
        order_id: OrderId,
        cancelled_by: UserId,
        owner_id: UserId,
        maid_id: Option<UserId>,
    },
    OrderCompleted {
        order_id: OrderId,
        owner_id: UserId,
        maid_id: UserId,
    },
    RatingReceived {
        order_id: OrderId,
        rater_id: UserId,
        receiver_id: UserId,
        score: u8,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "order_created",
            Self::ApplicationReceived { .. } => "application_received",
            Self::ApplicationAccepted { .. } => "application_accepted",
            Self::ApplicationRejected { .. } => "application_rejected",
            Self::OrderCancelled { .. } => "order_cancelled",
            Self::OrderCompleted { .. } => "order_completed",
            Self::RatingReceived { .. } => "rating_received",
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            Self::OrderCreated { order_id, .. }
            | Self::ApplicationReceived { order_id, .. }
            | Self::ApplicationAccepted { order_id, .. }
            | Self::ApplicationRejected { order_id, .. }
            | Self::OrderCancelled { order_id, .. }
            | Self::OrderCompleted { order_id, .. }
            | Self::RatingReceived { order_id, .. } => *order_id,
        }
    }
}
