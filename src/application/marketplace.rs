use super::engine::LifecycleEngine;
use super::rating::RatingService;
use crate::domain::applicant::Application;
use crate::domain::identity::{Caller, UserId};
use crate::domain::order::{Order, OrderId, OrderRequest};
use crate::domain::ports::{
    ApplicationLedgerRef, EventEmitterRef, OrderCoordinatorRef, OrderStoreRef, RatingStoreRef,
};
use crate::domain::rating::{Rating, Reputation};
use crate::error::Result;
use crate::infrastructure::in_memory::{
    InMemoryApplicationLedger, InMemoryCoordinator, InMemoryOrderStore, InMemoryRatingStore,
};
use std::sync::Arc;

/// One authenticated request to the marketplace.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateOrder {
        caller: Caller,
        request: OrderRequest,
    },
    Apply {
        caller: Caller,
        order_id: OrderId,
    },
    RequestMaid {
        caller: Caller,
        order_id: OrderId,
        maid_id: UserId,
    },
    AcceptApplicant {
        caller: Caller,
        order_id: OrderId,
        maid_id: UserId,
    },
    AcceptRequest {
        caller: Caller,
        order_id: OrderId,
    },
    Decline {
        caller: Caller,
        order_id: OrderId,
        maid_id: UserId,
    },
    Cancel {
        caller: Caller,
        order_id: OrderId,
    },
    Complete {
        caller: Caller,
        order_id: OrderId,
    },
    Rate {
        caller: Caller,
        order_id: OrderId,
        score: i64,
        comment: String,
    },
}

/// What a successfully processed command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Order(Order),
    Application(Application),
    Rating(Rating),
}

/// Entry point that wires the lifecycle engine and the rating service over a
/// shared set of stores.
pub struct Marketplace {
    engine: LifecycleEngine,
    ratings: RatingService,
}

impl Marketplace {
    pub fn new(
        orders: OrderStoreRef,
        applications: ApplicationLedgerRef,
        ratings: RatingStoreRef,
        coordinator: OrderCoordinatorRef,
        emitter: EventEmitterRef,
    ) -> Self {
        Self {
            engine: LifecycleEngine::new(
                orders.clone(),
                applications,
                coordinator.clone(),
                emitter.clone(),
            ),
            ratings: RatingService::new(orders, ratings, coordinator, emitter),
        }
    }

    /// A marketplace backed entirely by in-memory stores.
    pub fn in_memory(emitter: EventEmitterRef) -> Self {
        let orders = InMemoryOrderStore::new();
        let applications = InMemoryApplicationLedger::new();
        let ratings = InMemoryRatingStore::new();
        let coordinator = InMemoryCoordinator::new(&orders, &applications, &ratings);
        Self::new(
            Arc::new(orders),
            Arc::new(applications),
            Arc::new(ratings),
            Arc::new(coordinator),
            emitter,
        )
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    pub fn ratings(&self) -> &RatingService {
        &self.ratings
    }

    /// Dispatches a command to the engine or the rating service.
    pub async fn process(&self, command: Command) -> Result<Outcome> {
        let engine = &self.engine;
        let outcome = match command {
            Command::CreateOrder { caller, request } => {
                Outcome::Order(engine.create_order(&caller, request).await?)
            }
            Command::Apply { caller, order_id } => {
                Outcome::Application(engine.apply(&caller, order_id).await?)
            }
            Command::RequestMaid {
                caller,
                order_id,
                maid_id,
            } => Outcome::Application(engine.request_maid(&caller, order_id, maid_id).await?),
            Command::AcceptApplicant {
                caller,
                order_id,
                maid_id,
            } => Outcome::Order(engine.accept_applicant(&caller, order_id, maid_id).await?),
            Command::AcceptRequest { caller, order_id } => {
                Outcome::Order(engine.accept_request(&caller, order_id).await?)
            }
            Command::Decline {
                caller,
                order_id,
                maid_id,
            } => Outcome::Application(engine.decline(&caller, order_id, maid_id).await?),
            Command::Cancel { caller, order_id } => {
                Outcome::Order(engine.cancel(&caller, order_id).await?)
            }
            Command::Complete { caller, order_id } => {
                Outcome::Order(engine.complete(&caller, order_id).await?)
            }
            Command::Rate {
                caller,
                order_id,
                score,
                comment,
            } => Outcome::Rating(
                self.ratings
                    .submit_rating(&caller, order_id, score, comment)
                    .await?,
            ),
        };
        Ok(outcome)
    }

    /// Every order currently on file, by id.
    pub async fn orders(&self) -> Result<Vec<Order>> {
        self.engine.all_orders().await
    }

    pub async fn reputations(&self) -> Result<Vec<Reputation>> {
        self.ratings.all_reputations().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::error::EngineError;
    use crate::infrastructure::notify::TracingEmitter;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_process_dispatches_full_lifecycle() {
        let market = Marketplace::in_memory(Arc::new(TracingEmitter));
        let owner = Caller::homeowner("o1");

        let Outcome::Order(order) = market
            .process(Command::CreateOrder {
                caller: owner.clone(),
                request: OrderRequest {
                    job_type: "Babysitting".to_string(),
                    duration: "1 day".to_string(),
                    charges: dec!(1500),
                    latitude: 31.5,
                    longitude: 74.3,
                },
            })
            .await
            .unwrap()
        else {
            panic!("expected an order");
        };

        market
            .process(Command::Apply {
                caller: Caller::maid("M1"),
                order_id: order.id,
            })
            .await
            .unwrap();
        market
            .process(Command::AcceptApplicant {
                caller: owner.clone(),
                order_id: order.id,
                maid_id: UserId::new("M1"),
            })
            .await
            .unwrap();
        market
            .process(Command::Rate {
                caller: owner.clone(),
                order_id: order.id,
                score: 4,
                comment: "on time".to_string(),
            })
            .await
            .unwrap();
        market
            .process(Command::Complete {
                caller: owner,
                order_id: order.id,
            })
            .await
            .unwrap();

        let orders = market.orders().await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Completed);
        let reps = market.reputations().await.unwrap();
        assert_eq!(reps.len(), 1);
        assert_eq!(reps[0].user_id, UserId::new("M1"));
    }

    #[tokio::test]
    async fn test_process_surfaces_errors() {
        let market = Marketplace::in_memory(Arc::new(TracingEmitter));
        let result = market
            .process(Command::Cancel {
                caller: Caller::homeowner("o1"),
                order_id: OrderId::new(5),
            })
            .await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }
}
