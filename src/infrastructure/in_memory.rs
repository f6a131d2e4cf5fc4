use crate::domain::applicant::{
    self, Application, ApplicationOrigin, ApplicationStatus, Appended, Assignment,
};
use crate::domain::identity::UserId;
use crate::domain::order::{JobTerms, Order, OrderId, OrderStatus, StatusUpdate};
use crate::domain::ports::{ApplicationLedger, OrderCoordinator, OrderStore, RatingStore};
use crate::domain::rating::{Rating, Reputation};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct OrderTable {
    last_id: u64,
    orders: BTreeMap<OrderId, Order>,
}

/// A thread-safe in-memory order store.
///
/// Every mutation happens under a single write guard, so `update_status` is a
/// true compare-and-swap with respect to concurrent callers.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    table: Arc<RwLock<OrderTable>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, owner_id: UserId, terms: JobTerms) -> Result<Order> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let order = Order::new(OrderId::new(table.last_id), owner_id, terms);
        table.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let table = self.table.read().await;
        Ok(table.orders.get(&order_id).cloned())
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        update: StatusUpdate,
    ) -> Result<Order> {
        let mut table = self.table.write().await;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| EngineError::not_found("order", order_id))?;

        if order.status != expected {
            return Err(EngineError::Conflict(format!(
                "Order {} is {}, expected {}",
                order_id, order.status, expected
            )));
        }

        // Work on a copy so a rejected update leaves the stored order intact.
        let mut updated = order.clone();
        updated.apply_update(&update)?;
        *order = updated.clone();
        Ok(updated)
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        let table = self.table.read().await;
        Ok(table.orders.values().cloned().collect())
    }
}

/// A thread-safe in-memory application ledger.
///
/// Applications are kept per order in arrival order.
#[derive(Default, Clone)]
pub struct InMemoryApplicationLedger {
    applications: Arc<RwLock<HashMap<OrderId, Vec<Application>>>>,
}

impl InMemoryApplicationLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationLedger for InMemoryApplicationLedger {
    async fn append(
        &self,
        order_id: OrderId,
        maid_id: UserId,
        origin: ApplicationOrigin,
    ) -> Result<Appended> {
        let mut applications = self.applications.write().await;
        let entries = applications.entry(order_id).or_default();
        if let Some(existing) = entries.iter().find(|a| a.maid_id == maid_id) {
            return Ok(Appended::Existing(existing.clone()));
        }
        let app = Application::new(order_id, maid_id, origin);
        entries.push(app.clone());
        Ok(Appended::New(app))
    }

    async fn get(&self, order_id: OrderId, maid_id: &UserId) -> Result<Option<Application>> {
        let applications = self.applications.read().await;
        Ok(applications
            .get(&order_id)
            .and_then(|entries| entries.iter().find(|a| &a.maid_id == maid_id))
            .cloned())
    }

    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Application>> {
        let applications = self.applications.read().await;
        Ok(applications.get(&order_id).cloned().unwrap_or_default())
    }

    async fn for_maid(&self, maid_id: &UserId) -> Result<Vec<Application>> {
        let applications = self.applications.read().await;
        let mut found: Vec<Application> = applications
            .values()
            .flatten()
            .filter(|a| &a.maid_id == maid_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.order_id);
        Ok(found)
    }

    async fn reject_if_pending(
        &self,
        order_id: OrderId,
        maid_id: &UserId,
    ) -> Result<Option<Application>> {
        let mut applications = self.applications.write().await;
        let Some(app) = applications
            .get_mut(&order_id)
            .and_then(|entries| entries.iter_mut().find(|a| &a.maid_id == maid_id))
        else {
            return Ok(None);
        };
        if app.is_pending() {
            app.status = ApplicationStatus::Rejected;
        }
        Ok(Some(app.clone()))
    }
}

#[derive(Default)]
struct RatingTable {
    ratings: BTreeMap<(OrderId, UserId), Rating>,
    reputations: BTreeMap<UserId, Reputation>,
}

impl RatingTable {
    fn insert(&mut self, rating: Rating) -> Result<Reputation> {
        let key = (rating.order_id, rating.rater_id.clone());
        if self.ratings.contains_key(&key) {
            return Err(EngineError::Duplicate(format!(
                "{} already rated order {}",
                rating.rater_id, rating.order_id
            )));
        }

        let reputation = self
            .reputations
            .entry(rating.receiver_id.clone())
            .or_insert_with(|| Reputation::new(rating.receiver_id.clone()));
        reputation.record(rating.score);
        let reputation = reputation.clone();

        self.ratings.insert(key, rating);
        Ok(reputation)
    }
}

/// A thread-safe in-memory rating store with incrementally maintained
/// reputations.
#[derive(Default, Clone)]
pub struct InMemoryRatingStore {
    table: Arc<RwLock<RatingTable>>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn get(&self, order_id: OrderId, rater_id: &UserId) -> Result<Option<Rating>> {
        let table = self.table.read().await;
        Ok(table.ratings.get(&(order_id, rater_id.clone())).cloned())
    }

    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Rating>> {
        let table = self.table.read().await;
        Ok(table
            .ratings
            .values()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn reputation(&self, user_id: &UserId) -> Result<Reputation> {
        let table = self.table.read().await;
        Ok(table
            .reputations
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Reputation::new(user_id.clone())))
    }

    async fn all_reputations(&self) -> Result<Vec<Reputation>> {
        let table = self.table.read().await;
        Ok(table.reputations.values().cloned().collect())
    }
}

/// Cross-store writes over a set of in-memory stores.
///
/// Shares state with the stores it was built from. Locks are always taken in
/// the order orders, applications, ratings, and held until the write is done.
#[derive(Clone)]
pub struct InMemoryCoordinator {
    orders: InMemoryOrderStore,
    applications: InMemoryApplicationLedger,
    ratings: InMemoryRatingStore,
}

impl InMemoryCoordinator {
    pub fn new(
        orders: &InMemoryOrderStore,
        applications: &InMemoryApplicationLedger,
        ratings: &InMemoryRatingStore,
    ) -> Self {
        Self {
            orders: orders.clone(),
            applications: applications.clone(),
            ratings: ratings.clone(),
        }
    }
}

#[async_trait]
impl OrderCoordinator for InMemoryCoordinator {
    async fn assign(&self, order_id: OrderId, maid_id: &UserId) -> Result<Assignment> {
        let mut orders = self.orders.table.write().await;
        let mut applications = self.applications.applications.write().await;

        let order = orders
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| EngineError::not_found("order", order_id))?;
        let entries = applications.get_mut(&order_id).ok_or_else(|| {
            EngineError::not_found("application", format!("{order_id}/{maid_id}"))
        })?;

        let (next, assignment) = applicant::assign(order, entries.clone(), maid_id)?;
        *order = assignment.order.clone();
        *entries = next;
        Ok(assignment)
    }

    async fn record_rating(&self, rating: Rating) -> Result<Reputation> {
        let orders = self.orders.table.read().await;
        orders
            .orders
            .get(&rating.order_id)
            .ok_or_else(|| EngineError::not_found("order", rating.order_id))?
            .ensure_rateable()?;

        let mut table = self.ratings.table.write().await;
        table.insert(rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Role;
    use crate::domain::rating::Score;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn terms() -> JobTerms {
        JobTerms::new("Cleaning", "4 hours", dec!(500), (24.86, 67.01)).unwrap()
    }

    fn rating(order: u64, rater: &str, receiver: &str, score: i64) -> Rating {
        Rating {
            order_id: OrderId::new(order),
            rater_id: UserId::new(rater),
            rater_role: Role::Homeowner,
            receiver_id: UserId::new(receiver),
            receiver_role: Role::Maid,
            score: Score::new(score).unwrap(),
            comment: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_order_ids_are_sequential() {
        let store = InMemoryOrderStore::new();
        let first = store.create(UserId::new("o1"), terms()).await.unwrap();
        let second = store.create(UserId::new("o1"), terms()).await.unwrap();
        assert_eq!(first.id, OrderId::new(1));
        assert_eq!(second.id, OrderId::new(2));
        assert_eq!(first.status, OrderStatus::Pending);
        assert_eq!(store.get_all().await.unwrap().len(), 2);
        assert!(store.get(OrderId::new(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status_compare_and_swap() {
        let store = InMemoryOrderStore::new();
        let order = store.create(UserId::new("o1"), terms()).await.unwrap();

        let updated = store
            .update_status(
                order.id,
                OrderStatus::Pending,
                StatusUpdate::assign(UserId::new("M1")),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::InProgress);

        // Same expectation again loses: the stored status has moved on.
        let second = store
            .update_status(
                order.id,
                OrderStatus::Pending,
                StatusUpdate::assign(UserId::new("M2")),
            )
            .await;
        assert!(matches!(second, Err(EngineError::Conflict(_))));

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.assigned_maid_id, Some(UserId::new("M1")));
    }

    #[tokio::test]
    async fn test_update_status_missing_order() {
        let store = InMemoryOrderStore::new();
        let result = store
            .update_status(
                OrderId::new(9),
                OrderStatus::Pending,
                StatusUpdate::to(OrderStatus::Cancelled),
            )
            .await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let ledger = InMemoryApplicationLedger::new();
        let order = OrderId::new(1);
        let first = ledger
            .append(order, UserId::new("M1"), ApplicationOrigin::MaidApplied)
            .await
            .unwrap();
        let again = ledger
            .append(order, UserId::new("M1"), ApplicationOrigin::MaidApplied)
            .await
            .unwrap();
        assert!(first.is_new());
        assert!(!again.is_new());
        assert_eq!(first.into_inner(), again.into_inner());
        assert_eq!(ledger.for_order(order).await.unwrap().len(), 1);
    }

    struct Stores {
        orders: InMemoryOrderStore,
        ledger: InMemoryApplicationLedger,
        ratings: InMemoryRatingStore,
        coordinator: InMemoryCoordinator,
    }

    fn stores() -> Stores {
        let orders = InMemoryOrderStore::new();
        let ledger = InMemoryApplicationLedger::new();
        let ratings = InMemoryRatingStore::new();
        let coordinator = InMemoryCoordinator::new(&orders, &ledger, &ratings);
        Stores {
            orders,
            ledger,
            ratings,
            coordinator,
        }
    }

    #[tokio::test]
    async fn test_assign_commits_order_and_ledger_together() {
        let stores = stores();
        let order = stores.orders.create(UserId::new("o1"), terms()).await.unwrap();
        for maid in ["M1", "M2", "M3"] {
            stores
                .ledger
                .append(order.id, UserId::new(maid), ApplicationOrigin::MaidApplied)
                .await
                .unwrap();
        }
        stores
            .ledger
            .reject_if_pending(order.id, &UserId::new("M3"))
            .await
            .unwrap();

        let assignment = stores
            .coordinator
            .assign(order.id, &UserId::new("M2"))
            .await
            .unwrap();
        assert!(assignment.newly_assigned);
        // M3 was already rejected, so only M1 changes.
        assert_eq!(assignment.arbitration.rejected.len(), 1);
        assert_eq!(assignment.arbitration.rejected[0].maid_id, UserId::new("M1"));

        let stored = stores.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::InProgress);
        assert_eq!(stored.assigned_maid_id, Some(UserId::new("M2")));
        let apps = stores.ledger.for_order(order.id).await.unwrap();
        assert!(apps.iter().all(|a| !a.is_pending()));

        let lost = stores.coordinator.assign(order.id, &UserId::new("M1")).await;
        assert!(matches!(lost, Err(EngineError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_failed_assign_writes_nothing() {
        let stores = stores();
        let order = stores.orders.create(UserId::new("o1"), terms()).await.unwrap();
        for maid in ["M1", "M2"] {
            stores
                .ledger
                .append(order.id, UserId::new(maid), ApplicationOrigin::MaidApplied)
                .await
                .unwrap();
        }
        stores
            .ledger
            .reject_if_pending(order.id, &UserId::new("M1"))
            .await
            .unwrap();

        let result = stores.coordinator.assign(order.id, &UserId::new("M1")).await;
        assert!(matches!(result, Err(EngineError::InvalidState(_))));

        let stored = stores.orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored, order);
        let m2 = stores
            .ledger
            .get(order.id, &UserId::new("M2"))
            .await
            .unwrap()
            .unwrap();
        assert!(m2.is_pending());
    }

    #[tokio::test]
    async fn test_rating_record_and_duplicate() {
        let stores = stores();
        let order = stores.orders.create(UserId::new("o1"), terms()).await.unwrap();
        let early = stores.coordinator.record_rating(rating(1, "o1", "M1", 5)).await;
        assert!(matches!(early, Err(EngineError::InvalidState(_))));

        stores
            .orders
            .update_status(
                order.id,
                OrderStatus::Pending,
                StatusUpdate::assign(UserId::new("M1")),
            )
            .await
            .unwrap();
        let rep = stores
            .coordinator
            .record_rating(rating(1, "o1", "M1", 5))
            .await
            .unwrap();
        assert_eq!(rep.rating_count, 1);

        let dup = stores.coordinator.record_rating(rating(1, "o1", "M1", 3)).await;
        assert!(matches!(dup, Err(EngineError::Duplicate(_))));

        let store = &stores.ratings;
        let rep = store.reputation(&UserId::new("M1")).await.unwrap();
        assert_eq!(rep.rating_sum, 5);
        assert_eq!(
            store.reputation(&UserId::new("nobody")).await.unwrap().rating_count,
            0
        );
        assert_eq!(store.for_order(OrderId::new(1)).await.unwrap().len(), 1);
        let by_owner = store.get(order.id, &UserId::new("o1")).await.unwrap();
        assert_eq!(by_owner.map(|r| r.score.value()), Some(5));
    }
}
