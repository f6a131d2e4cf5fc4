use super::applicant::{Application, ApplicationOrigin, Appended, Assignment};
use super::event::LifecycleEvent;
use super::identity::UserId;
use super::order::{JobTerms, Order, OrderId, OrderStatus, StatusUpdate};
use super::rating::{Rating, Reputation};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Allocates an id and persists a new `pending` order.
    async fn create(&self, owner_id: UserId, terms: JobTerms) -> Result<Order>;

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Compare-and-swap on the order status.
    ///
    /// Must run as one atomic read-modify-write: fails with `Conflict` when the
    /// stored status differs from `expected` at the moment of mutation, and
    /// with `NotFound` when the order does not exist.
    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        update: StatusUpdate,
    ) -> Result<Order>;

    async fn get_all(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait ApplicationLedger: Send + Sync {
    /// Appends an application unless one exists for `(order_id, maid_id)`.
    async fn append(
        &self,
        order_id: OrderId,
        maid_id: UserId,
        origin: ApplicationOrigin,
    ) -> Result<Appended>;

    async fn get(&self, order_id: OrderId, maid_id: &UserId) -> Result<Option<Application>>;

    /// Applications for one order, in arrival order.
    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Application>>;

    async fn for_maid(&self, maid_id: &UserId) -> Result<Vec<Application>>;

    /// Marks a pending application rejected. Returns the application as stored
    /// afterwards, or `None` when it does not exist.
    async fn reject_if_pending(
        &self,
        order_id: OrderId,
        maid_id: &UserId,
    ) -> Result<Option<Application>>;
}

#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn get(&self, order_id: OrderId, rater_id: &UserId) -> Result<Option<Rating>>;

    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Rating>>;

    /// Zero-valued reputation for users never rated.
    async fn reputation(&self, user_id: &UserId) -> Result<Reputation>;

    async fn all_reputations(&self) -> Result<Vec<Reputation>>;
}

/// Writes that span the order, its applications and its ratings, each
/// committed in one atomic step against the order's state at that moment.
#[async_trait]
pub trait OrderCoordinator: Send + Sync {
    /// Assigns `maid_id` to a pending order and resolves every application of
    /// the order together with it. Nothing is written when any part fails.
    async fn assign(&self, order_id: OrderId, maid_id: &UserId) -> Result<Assignment>;

    /// Inserts the rating and folds its score into the receiver's reputation,
    /// provided the order still accepts ratings. Fails with `Duplicate` if the
    /// rater already rated the order.
    async fn record_rating(&self, rating: Rating) -> Result<Reputation>;
}

/// Outbound boundary to whatever delivers notifications.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: LifecycleEvent);
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type ApplicationLedgerRef = Arc<dyn ApplicationLedger>;
pub type RatingStoreRef = Arc<dyn RatingStore>;
pub type OrderCoordinatorRef = Arc<dyn OrderCoordinator>;
pub type EventEmitterRef = Arc<dyn EventEmitter>;
