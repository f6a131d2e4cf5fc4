use crate::domain::applicant::{
    self, Application, ApplicationOrigin, ApplicationStatus, Appended, Assignment,
};
use crate::domain::identity::UserId;
use crate::domain::order::{JobTerms, Order, OrderId, OrderStatus, StatusUpdate};
use crate::domain::ports::{ApplicationLedger, OrderCoordinator, OrderStore, RatingStore};
use crate::domain::rating::{Rating, Reputation};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for order records.
pub const CF_ORDERS: &str = "orders";
/// Column Family for applications, keyed by order then maid.
pub const CF_APPLICATIONS: &str = "applications";
/// Column Family for ratings, keyed by order then rater.
pub const CF_RATINGS: &str = "ratings";
/// Column Family for per-user reputation aggregates.
pub const CF_REPUTATIONS: &str = "reputations";
/// Column Family for bookkeeping such as the order id counter.
pub const CF_META: &str = "meta";

const LAST_ORDER_ID: &[u8] = b"last_order_id";

/// A persistent store implementation using RocksDB.
///
/// Implements the order store, application ledger, rating store and the
/// cross-store coordinator over separate Column Families. Mutations are serialised through `write_lock`
/// and committed as a single `WriteBatch`, which makes each read-modify-write
/// atomic with respect to other callers of the same store.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_ORDERS, CF_APPLICATIONS, CF_RATINGS, CF_REPUTATIONS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EngineError::Internal(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Decodes every value whose key starts with `prefix`.
    fn scan<T: DeserializeOwned>(&self, cf: &'static str, prefix: &[u8]) -> Result<Vec<T>> {
        let handle = self.cf(cf)?;
        let mut values = Vec::new();
        for item in self
            .db
            .iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn load_order(&self, order_id: OrderId) -> Result<Order> {
        self.read(CF_ORDERS, &order_key(order_id))?
            .ok_or_else(|| EngineError::not_found("order", order_id))
    }

    /// Applications of one order in arrival order.
    fn applications_of(&self, order_id: OrderId) -> Result<Vec<Application>> {
        let mut apps: Vec<Application> = self.scan(CF_APPLICATIONS, &order_key(order_id))?;
        apps.sort_by_key(|a| a.applied_at);
        Ok(apps)
    }

    fn put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &'static str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }
}

fn order_key(order_id: OrderId) -> [u8; 8] {
    order_id.value().to_be_bytes()
}

fn pair_key(order_id: OrderId, user_id: &UserId) -> Vec<u8> {
    let mut key = order_key(order_id).to_vec();
    key.extend_from_slice(user_id.as_str().as_bytes());
    key
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn create(&self, owner_id: UserId, terms: JobTerms) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let next_id = self.read::<u64>(CF_META, LAST_ORDER_ID)?.unwrap_or(0) + 1;
        let order = Order::new(OrderId::new(next_id), owner_id, terms);

        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_ORDERS, &order_key(order.id), &order)?;
        self.put(&mut batch, CF_META, LAST_ORDER_ID, &next_id)?;
        self.db.write(batch)?;

        Ok(order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.read(CF_ORDERS, &order_key(order_id))
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        update: StatusUpdate,
    ) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let mut order = self.load_order(order_id)?;

        if order.status != expected {
            return Err(EngineError::Conflict(format!(
                "Order {} is {}, expected {}",
                order_id, order.status, expected
            )));
        }

        order.apply_update(&update)?;
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_ORDERS, &order_key(order_id), &order)?;
        self.db.write(batch)?;

        Ok(order)
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        self.scan(CF_ORDERS, &[])
    }
}

#[async_trait]
impl ApplicationLedger for RocksDBStore {
    async fn append(
        &self,
        order_id: OrderId,
        maid_id: UserId,
        origin: ApplicationOrigin,
    ) -> Result<Appended> {
        let _guard = self.write_lock.lock().await;
        let key = pair_key(order_id, &maid_id);
        if let Some(existing) = self.read(CF_APPLICATIONS, &key)? {
            return Ok(Appended::Existing(existing));
        }

        let app = Application::new(order_id, maid_id, origin);
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_APPLICATIONS, &key, &app)?;
        self.db.write(batch)?;

        Ok(Appended::New(app))
    }

    async fn get(&self, order_id: OrderId, maid_id: &UserId) -> Result<Option<Application>> {
        self.read(CF_APPLICATIONS, &pair_key(order_id, maid_id))
    }

    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Application>> {
        self.applications_of(order_id)
    }

    async fn for_maid(&self, maid_id: &UserId) -> Result<Vec<Application>> {
        let apps: Vec<Application> = self.scan(CF_APPLICATIONS, &[])?;
        Ok(apps.into_iter().filter(|a| &a.maid_id == maid_id).collect())
    }

    async fn reject_if_pending(
        &self,
        order_id: OrderId,
        maid_id: &UserId,
    ) -> Result<Option<Application>> {
        let _guard = self.write_lock.lock().await;
        let key = pair_key(order_id, maid_id);
        let Some(mut app) = self.read::<Application>(CF_APPLICATIONS, &key)? else {
            return Ok(None);
        };

        if app.is_pending() {
            app.status = ApplicationStatus::Rejected;
            let mut batch = WriteBatch::default();
            self.put(&mut batch, CF_APPLICATIONS, &key, &app)?;
            self.db.write(batch)?;
        }

        Ok(Some(app))
    }
}

#[async_trait]
impl RatingStore for RocksDBStore {
    async fn get(&self, order_id: OrderId, rater_id: &UserId) -> Result<Option<Rating>> {
        self.read(CF_RATINGS, &pair_key(order_id, rater_id))
    }

    async fn for_order(&self, order_id: OrderId) -> Result<Vec<Rating>> {
        self.scan(CF_RATINGS, &order_key(order_id))
    }

    async fn reputation(&self, user_id: &UserId) -> Result<Reputation> {
        Ok(self
            .read(CF_REPUTATIONS, user_id.as_str().as_bytes())?
            .unwrap_or_else(|| Reputation::new(user_id.clone())))
    }

    async fn all_reputations(&self) -> Result<Vec<Reputation>> {
        self.scan(CF_REPUTATIONS, &[])
    }
}

#[async_trait]
impl OrderCoordinator for RocksDBStore {
    async fn assign(&self, order_id: OrderId, maid_id: &UserId) -> Result<Assignment> {
        let _guard = self.write_lock.lock().await;
        let order = self.load_order(order_id)?;
        let before = self.applications_of(order_id)?;

        let (after, assignment) = applicant::assign(&order, before.clone(), maid_id)?;

        let mut batch = WriteBatch::default();
        if assignment.order != order {
            self.put(&mut batch, CF_ORDERS, &order_key(order_id), &assignment.order)?;
        }
        for (old, new) in before.iter().zip(after.iter()) {
            if old.status != new.status {
                self.put(
                    &mut batch,
                    CF_APPLICATIONS,
                    &pair_key(order_id, &new.maid_id),
                    new,
                )?;
            }
        }
        self.db.write(batch)?;

        Ok(assignment)
    }

    async fn record_rating(&self, rating: Rating) -> Result<Reputation> {
        let _guard = self.write_lock.lock().await;
        self.load_order(rating.order_id)?.ensure_rateable()?;

        let key = pair_key(rating.order_id, &rating.rater_id);
        if self.read::<Rating>(CF_RATINGS, &key)?.is_some() {
            return Err(EngineError::Duplicate(format!(
                "{} already rated order {}",
                rating.rater_id, rating.order_id
            )));
        }

        let receiver_key = rating.receiver_id.as_str().as_bytes().to_vec();
        let mut reputation = self
            .read::<Reputation>(CF_REPUTATIONS, &receiver_key)?
            .unwrap_or_else(|| Reputation::new(rating.receiver_id.clone()));
        reputation.record(rating.score);

        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_RATINGS, &key, &rating)?;
        self.put(&mut batch, CF_REPUTATIONS, &receiver_key, &reputation)?;
        self.db.write(batch)?;

        Ok(reputation)
    }
}
