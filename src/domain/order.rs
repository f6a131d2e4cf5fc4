use super::identity::{Caller, Role, UserId};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-allocated identifier of an order. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The price offered for a job. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Charges(Decimal);

impl Charges {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::Validation(
                "Charges must be a positive number".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Charges {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    latitude: f64,
    longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(EngineError::Validation(format!(
                "Latitude {latitude} is not a valid coordinate"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(EngineError::Validation(format!(
                "Longitude {longitude} is not a valid coordinate"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Service terms supplied by the homeowner when posting an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTerms {
    pub job_type: String,
    pub duration: String,
    pub charges: Charges,
    pub location: Location,
}

impl JobTerms {
    /// Validates raw terms. Job type must be non-blank; charges and location
    /// are checked by their own constructors.
    pub fn new(
        job_type: impl Into<String>,
        duration: impl Into<String>,
        charges: Decimal,
        location: (f64, f64),
    ) -> Result<Self> {
        let job_type = job_type.into().trim().to_string();
        if job_type.is_empty() {
            return Err(EngineError::Validation(
                "Job type must not be empty".to_string(),
            ));
        }
        Ok(Self {
            job_type,
            duration: duration.into().trim().to_string(),
            charges: Charges::new(charges)?,
            location: Location::new(location.0, location.1)?,
        })
    }
}

/// Unvalidated order terms as received from a homeowner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderRequest {
    pub job_type: String,
    pub duration: String,
    pub charges: Decimal,
    pub latitude: f64,
    pub longitude: f64,
}

impl TryFrom<OrderRequest> for JobTerms {
    type Error = EngineError;

    fn try_from(request: OrderRequest) -> Result<Self> {
        JobTerms::new(
            request.job_type,
            request.duration,
            request.charges,
            (request.latitude, request.longitude),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transition.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Cancelled)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service request posted by a homeowner.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub owner_id: UserId,
    pub terms: JobTerms,
    pub status: OrderStatus,
    /// Set exactly once, on acceptance. Kept after cancellation for audit.
    pub assigned_maid_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: OrderId, owner_id: UserId, terms: JobTerms) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            terms,
            status: OrderStatus::Pending,
            assigned_maid_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.owner_id == user_id
    }

    pub fn is_assigned_to(&self, user_id: &UserId) -> bool {
        self.assigned_maid_id.as_ref() == Some(user_id)
    }

    /// The side the caller acts for on this order, if any: the owner acting
    /// as homeowner, or the assigned maid acting as maid.
    pub fn party_role(&self, caller: &Caller) -> Option<Role> {
        match caller.role {
            Role::Homeowner if self.is_owned_by(&caller.user_id) => Some(Role::Homeowner),
            Role::Maid if self.is_assigned_to(&caller.user_id) => Some(Role::Maid),
            _ => None,
        }
    }

    /// Ratings open once a maid is assigned and stay open after completion.
    pub fn ensure_rateable(&self) -> Result<()> {
        match self.status {
            OrderStatus::InProgress | OrderStatus::Completed => Ok(()),
            status => Err(EngineError::InvalidState(format!(
                "Order {} is {}, ratings open once a maid is assigned",
                self.id, status
            ))),
        }
    }

    /// Applies a status update in place. The caller is responsible for having
    /// matched the expected prior status.
    pub fn apply_update(&mut self, update: &StatusUpdate) -> Result<()> {
        if !self.status.can_transition_to(update.status) {
            return Err(EngineError::InvalidState(format!(
                "Order {} cannot move from {} to {}",
                self.id, self.status, update.status
            )));
        }
        if let Some(maid) = &update.assign_maid {
            if let Some(existing) = &self.assigned_maid_id {
                return Err(EngineError::Conflict(format!(
                    "Order {} is already assigned to {}",
                    self.id, existing
                )));
            }
            self.assigned_maid_id = Some(maid.clone());
        }
        self.status = update.status;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// The mutation half of the store's compare-and-swap primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub assign_maid: Option<UserId>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            assign_maid: None,
        }
    }

    pub fn assign(maid_id: UserId) -> Self {
        Self {
            status: OrderStatus::InProgress,
            assign_maid: Some(maid_id),
        }
    }
}
