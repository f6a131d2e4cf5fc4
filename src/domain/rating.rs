use super::identity::{Role, UserId};
use super::order::OrderId;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A rating score between 1 and 5 inclusive. Out-of-range values are
/// rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(EngineError::Validation(format!(
                "Score must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// A post-assignment rating from one party of an order about the other.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Rating {
    pub order_id: OrderId,
    pub rater_id: UserId,
    pub rater_role: Role,
    pub receiver_id: UserId,
    pub receiver_role: Role,
    pub score: Score,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Running aggregate of the ratings a user has received.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Reputation {
    pub user_id: UserId,
    pub rating_count: u64,
    pub rating_sum: u64,
}

impl Reputation {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            rating_count: 0,
            rating_sum: 0,
        }
    }

    /// Folds one more score into the aggregate.
    pub fn record(&mut self, score: Score) {
        self.rating_count += 1;
        self.rating_sum += u64::from(score.value());
    }

    /// Mean score rounded to two decimal places, or `None` while unrated.
    pub fn average(&self) -> Option<Decimal> {
        if self.rating_count == 0 {
            return None;
        }
        let avg = Decimal::from(self.rating_sum) / Decimal::from(self.rating_count);
        Some(avg.round_dp(2).normalize())
    }
}
