use super::identity::UserId;
use super::order::{Order, OrderId, OrderStatus, StatusUpdate};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Which side opened the application.
///
/// A maid applying to an open order and an owner requesting a specific maid
/// both produce an application; they differ only in who may confirm it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationOrigin {
    MaidApplied,
    OwnerRequest,
}

/// A maid's standing interest in one order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Application {
    pub order_id: OrderId,
    pub maid_id: UserId,
    pub origin: ApplicationOrigin,
    pub applied_at: DateTime<Utc>,
    pub status: ApplicationStatus,
}

impl Application {
    pub fn new(order_id: OrderId, maid_id: UserId, origin: ApplicationOrigin) -> Self {
        Self {
            order_id,
            maid_id,
            origin,
            applied_at: Utc::now(),
            status: ApplicationStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }
}

/// Result of appending to the ledger: either a fresh application or the one
/// already on file for the same `(order, maid)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Appended {
    New(Application),
    Existing(Application),
}

impl Appended {
    pub fn is_new(&self) -> bool {
        matches!(self, Appended::New(_))
    }

    pub fn into_inner(self) -> Application {
        match self {
            Appended::New(app) | Appended::Existing(app) => app,
        }
    }
}

/// What acceptance arbitration changed in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Arbitration {
    pub accepted: Application,
    pub rejected: Vec<Application>,
}

/// A committed acceptance: the order as stored afterwards and how its
/// applications were resolved.
///
/// `newly_assigned` is false when the maid was already assigned and the call
/// only re-ran arbitration.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub order: Order,
    pub arbitration: Arbitration,
    pub newly_assigned: bool,
}

/// Accepts `winner` among one order's applications and rejects every other
/// pending one.
///
/// The winner must be pending, or already accepted when an acceptance is
/// retried. A rejected winner is `InvalidState`; another accepted application
/// is `Conflict`.
pub fn arbitrate(
    mut entries: Vec<Application>,
    winner: &UserId,
) -> Result<(Vec<Application>, Arbitration)> {
    if let Some(other) = entries
        .iter()
        .find(|a| a.status == ApplicationStatus::Accepted && &a.maid_id != winner)
    {
        return Err(EngineError::Conflict(format!(
            "Order {} already accepted {}",
            other.order_id, other.maid_id
        )));
    }

    let mut accepted = None;
    let mut rejected = Vec::new();
    for app in entries.iter_mut() {
        if &app.maid_id == winner {
            if app.status == ApplicationStatus::Rejected {
                return Err(EngineError::InvalidState(format!(
                    "Application of {} on order {} was already rejected",
                    app.maid_id, app.order_id
                )));
            }
            app.status = ApplicationStatus::Accepted;
            accepted = Some(app.clone());
        } else if app.is_pending() {
            app.status = ApplicationStatus::Rejected;
            rejected.push(app.clone());
        }
    }

    let accepted = accepted.ok_or_else(|| EngineError::not_found("application", winner))?;
    Ok((entries, Arbitration { accepted, rejected }))
}

/// Plans the whole acceptance against one snapshot of an order and its
/// applications. Stores commit the returned entries and `Assignment::order`
/// together, or nothing.
///
/// A pending order moves to `in_progress`. An order already assigned to
/// `winner` is kept and re-arbitrated. Any other state is `Conflict`.
pub fn assign(
    order: &Order,
    entries: Vec<Application>,
    winner: &UserId,
) -> Result<(Vec<Application>, Assignment)> {
    let (order, newly_assigned) = match order.status {
        OrderStatus::Pending => {
            let mut updated = order.clone();
            updated.apply_update(&StatusUpdate::assign(winner.clone()))?;
            (updated, true)
        }
        OrderStatus::InProgress if order.is_assigned_to(winner) => (order.clone(), false),
        OrderStatus::InProgress => {
            return Err(EngineError::Conflict(format!(
                "Order {} is already assigned to {}",
                order.id,
                order
                    .assigned_maid_id
                    .as_ref()
                    .map_or("another maid", |m| m.as_str())
            )));
        }
        status => {
            return Err(EngineError::Conflict(format!(
                "Order {} is {} and no longer pending",
                order.id, status
            )));
        }
    };

    let (entries, arbitration) = arbitrate(entries, winner)?;
    Ok((
        entries,
        Assignment {
            order,
            arbitration,
            newly_assigned,
        },
    ))
}
