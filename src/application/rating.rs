use crate::domain::event::LifecycleEvent;
use crate::domain::identity::{Caller, Role, UserId};
use crate::domain::order::OrderId;
use crate::domain::ports::{EventEmitterRef, OrderCoordinatorRef, OrderStoreRef, RatingStoreRef};
use crate::domain::rating::{Rating, Reputation, Score};
use crate::error::{EngineError, Result};
use chrono::Utc;
use tracing::{info, instrument};

/// Records ratings between the two parties of an order and maintains each
/// user's reputation aggregate.
pub struct RatingService {
    orders: OrderStoreRef,
    ratings: RatingStoreRef,
    coordinator: OrderCoordinatorRef,
    emitter: EventEmitterRef,
}

impl RatingService {
    pub fn new(
        orders: OrderStoreRef,
        ratings: RatingStoreRef,
        coordinator: OrderCoordinatorRef,
        emitter: EventEmitterRef,
    ) -> Self {
        Self {
            orders,
            ratings,
            coordinator,
            emitter,
        }
    }

    /// Rates the other party of `order_id`.
    ///
    /// Accepted once the order is `in_progress` or `completed`. The receiver is
    /// derived from the order, never supplied by the rater.
    #[instrument(level = "debug", skip(self, comment))]
    pub async fn submit_rating(
        &self,
        caller: &Caller,
        order_id: OrderId,
        score: i64,
        comment: impl Into<String> + Send,
    ) -> Result<Rating> {
        let score = Score::new(score)?;
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))?;

        order.ensure_rateable()?;

        let rater_role = order.party_role(caller).ok_or_else(|| {
            EngineError::Forbidden(format!(
                "{} is not a party to order {}",
                caller.user_id, order_id
            ))
        })?;
        let (receiver_id, receiver_role) = match rater_role {
            Role::Homeowner => {
                let maid = order.assigned_maid_id.clone().ok_or_else(|| {
                    EngineError::InvalidState(format!("Order {order_id} has no assigned maid"))
                })?;
                (maid, Role::Maid)
            }
            Role::Maid => (order.owner_id.clone(), Role::Homeowner),
        };

        let rating = Rating {
            order_id,
            rater_id: caller.user_id.clone(),
            rater_role,
            receiver_id,
            receiver_role,
            score,
            comment: comment.into(),
            created_at: Utc::now(),
        };
        // The order status is re-checked together with the insert.
        let reputation = self.coordinator.record_rating(rating.clone()).await?;

        info!(
            order_id = %order_id,
            rater = %rating.rater_id,
            receiver = %rating.receiver_id,
            score = score.value(),
            ratings = reputation.rating_count,
            "rating recorded"
        );
        self.emitter
            .emit(LifecycleEvent::RatingReceived {
                order_id,
                rater_id: rating.rater_id.clone(),
                receiver_id: rating.receiver_id.clone(),
                score: score.value(),
            })
            .await;
        Ok(rating)
    }

    pub async fn reputation(&self, user_id: &UserId) -> Result<Reputation> {
        self.ratings.reputation(user_id).await
    }

    /// The rating `rater_id` left on `order_id`, if any.
    pub async fn rating_by(&self, order_id: OrderId, rater_id: &UserId) -> Result<Option<Rating>> {
        self.ratings.get(order_id, rater_id).await
    }

    pub async fn ratings_for(&self, order_id: OrderId) -> Result<Vec<Rating>> {
        self.ratings.for_order(order_id).await
    }

    pub async fn all_reputations(&self) -> Result<Vec<Reputation>> {
        self.ratings.all_reputations().await
    }
}
