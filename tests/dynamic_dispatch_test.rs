use chrono::Utc;
use maidlink::domain::applicant::{ApplicationOrigin, ApplicationStatus};
use maidlink::domain::identity::{Role, UserId};
use maidlink::domain::order::{JobTerms, OrderId, OrderStatus};
use maidlink::domain::ports::{
    ApplicationLedgerRef, OrderCoordinatorRef, OrderStoreRef, RatingStoreRef,
};
use maidlink::domain::rating::{Rating, Score};
use maidlink::infrastructure::in_memory::{
    InMemoryApplicationLedger, InMemoryCoordinator, InMemoryOrderStore, InMemoryRatingStore,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let orders = InMemoryOrderStore::new();
    let applications = InMemoryApplicationLedger::new();
    let ratings = InMemoryRatingStore::new();
    let coordinator: OrderCoordinatorRef =
        Arc::new(InMemoryCoordinator::new(&orders, &applications, &ratings));
    let order_store: OrderStoreRef = Arc::new(orders);
    let ledger: ApplicationLedgerRef = Arc::new(applications);
    let rating_store: RatingStoreRef = Arc::new(ratings);

    let terms = JobTerms::new("Cooking", "2 hours", dec!(250), (31.52, 74.35)).unwrap();

    // Verify Send + Sync by spawning tasks
    let os_handle = tokio::spawn(async move {
        let order = order_store.create(UserId::new("o1"), terms).await.unwrap();
        order_store.get(order.id).await.unwrap().unwrap()
    });
    let retrieved_order = os_handle.await.unwrap();
    assert_eq!(retrieved_order.id, OrderId::new(1));

    let ledger_handle = tokio::spawn(async move {
        ledger
            .append(OrderId::new(1), UserId::new("M1"), ApplicationOrigin::MaidApplied)
            .await
            .unwrap();
        ledger
            .append(OrderId::new(1), UserId::new("M2"), ApplicationOrigin::MaidApplied)
            .await
            .unwrap();
        ledger
    });
    let ledger = ledger_handle.await.unwrap();

    let assign_coordinator = coordinator.clone();
    let assign_handle = tokio::spawn(async move {
        assign_coordinator
            .assign(OrderId::new(1), &UserId::new("M1"))
            .await
            .unwrap()
    });
    let assignment = assign_handle.await.unwrap();
    assert!(assignment.newly_assigned);
    assert_eq!(assignment.order.status, OrderStatus::InProgress);
    assert_eq!(assignment.arbitration.accepted.status, ApplicationStatus::Accepted);
    assert_eq!(assignment.arbitration.rejected.len(), 1);
    assert!(ledger
        .for_order(OrderId::new(1))
        .await
        .unwrap()
        .iter()
        .all(|a| !a.is_pending()));

    let rs_handle = tokio::spawn(async move {
        coordinator
            .record_rating(Rating {
                order_id: OrderId::new(1),
                rater_id: UserId::new("o1"),
                rater_role: Role::Homeowner,
                receiver_id: UserId::new("M1"),
                receiver_role: Role::Maid,
                score: Score::new(4).unwrap(),
                comment: String::new(),
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    });

    let reputation = rs_handle.await.unwrap();
    assert_eq!(reputation.user_id, UserId::new("M1"));
    assert_eq!(reputation.rating_count, 1);
    assert_eq!(
        rating_store.reputation(&UserId::new("M1")).await.unwrap(),
        reputation
    );
}
