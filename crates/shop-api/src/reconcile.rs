//! # Order Reconciliation
//!
//! The checkout handler never fails the request once the payment
//! session exists; local bookkeeping that could not be written is
//! handed to this queue instead of being silently dropped. A background
//! worker retries each job a bounded number of times, keyed by the
//! session id, and logs every outcome so orphaned sessions stay
//! visible.

use shop_core::{BoxedDataStore, NewOrder, NewOrderItem, ShopResult};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Attempts per job before giving up
const MAX_ATTEMPTS: u32 = 5;

/// Default delay between attempts
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// A unit of bookkeeping still owed to the local store
#[derive(Debug, Clone)]
pub enum ReconcileJob {
    /// The order row itself (and its lines) never made it in
    Order {
        session_id: String,
        order: NewOrder,
        items: Vec<PendingItem>,
    },
    /// The order row exists but its lines were not written
    Items {
        session_id: String,
        order_id: String,
        items: Vec<NewOrderItem>,
    },
}

impl ReconcileJob {
    /// The payment-session id this job is keyed by
    pub fn session_id(&self) -> &str {
        match self {
            ReconcileJob::Order { session_id, .. } => session_id,
            ReconcileJob::Items { session_id, .. } => session_id,
        }
    }
}

/// An order line awaiting its order id
#[derive(Debug, Clone)]
pub struct PendingItem {
    pub product_id: String,
    pub quantity: u32,
    pub price_at_purchase: f64,
}

/// Sending half of the reconciliation queue, held in `AppState`
#[derive(Clone)]
pub struct ReconcileQueue {
    tx: mpsc::Sender<ReconcileJob>,
}

impl ReconcileQueue {
    /// Create a bounded queue, returning the handle and the receiver to
    /// hand to a worker
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReconcileJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue a job. A full or closed queue is logged, not propagated:
    /// the checkout response must not fail on bookkeeping.
    pub fn enqueue(&self, job: ReconcileJob) {
        let session_id = job.session_id().to_string();
        match self.tx.try_send(job) {
            Ok(()) => {
                warn!(
                    "Order bookkeeping deferred to reconciliation: session={}",
                    session_id
                );
            }
            Err(e) => {
                error!(
                    "Reconciliation queue unavailable, session {} orphaned: {}",
                    session_id, e
                );
            }
        }
    }
}

/// Background worker that drains the queue against the data store
pub struct ReconcileWorker {
    store: BoxedDataStore,
    retry_delay: Duration,
}

impl ReconcileWorker {
    pub fn new(store: BoxedDataStore) -> Self {
        Self {
            store,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Builder: shorten the delay (tests)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Spawn the worker task; it runs until the queue closes
    pub fn spawn(self, mut rx: mpsc::Receiver<ReconcileJob>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                self.run_job(job).await;
            }
        })
    }

    async fn run_job(&self, job: ReconcileJob) {
        let session_id = job.session_id().to_string();

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(&job).await {
                Ok(()) => {
                    info!(
                        "Reconciled order bookkeeping: session={}, attempt={}",
                        session_id, attempt
                    );
                    return;
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(
                        "Reconciliation attempt {}/{} failed for session {}: {}",
                        attempt, MAX_ATTEMPTS, session_id, e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!(
                        "Giving up on reconciliation for session {} after {} attempts: {}",
                        session_id, MAX_ATTEMPTS, e
                    );
                }
            }
        }
    }

    async fn attempt(&self, job: &ReconcileJob) -> ShopResult<()> {
        match job {
            ReconcileJob::Order {
                order, items, ..
            } => {
                let stored = self.store.insert_order(order).await?;
                let rows: Vec<NewOrderItem> = items
                    .iter()
                    .map(|item| NewOrderItem {
                        order_id: stored.id.clone(),
                        product_id: item.product_id.clone(),
                        quantity: item.quantity,
                        price_at_purchase: item.price_at_purchase,
                    })
                    .collect();
                self.store.insert_order_items(&rows).await
            }
            ReconcileJob::Items { items, .. } => self.store.insert_order_items(items).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shop_core::{
        CustomerRecord, DataStore, Order, OrderItemDetail, Product, ShopError,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Store that fails the first `failures` order inserts
    #[derive(Default)]
    struct FlakyStore {
        failures: AtomicU32,
        orders: Mutex<Vec<NewOrder>>,
        items: Mutex<Vec<NewOrderItem>>,
    }

    impl FlakyStore {
        fn failing(n: u32) -> Self {
            let store = Self::default();
            store.failures.store(n, Ordering::SeqCst);
            store
        }
    }

    #[async_trait]
    impl DataStore for FlakyStore {
        async fn list_products(&self) -> shop_core::ShopResult<Vec<Product>> {
            Ok(vec![])
        }
        async fn product_by_id(&self, _: &str) -> shop_core::ShopResult<Option<Product>> {
            Ok(None)
        }
        async fn products_by_ids(&self, _: &[String]) -> shop_core::ShopResult<Vec<Product>> {
            Ok(vec![])
        }
        async fn customer_for_user(&self, _: &str) -> shop_core::ShopResult<Option<CustomerRecord>> {
            Ok(None)
        }
        async fn insert_customer(&self, _: &CustomerRecord) -> shop_core::ShopResult<()> {
            Ok(())
        }
        async fn insert_order(&self, order: &NewOrder) -> shop_core::ShopResult<Order> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(ShopError::upstream("supabase", "orders insert HTTP 500"));
            }
            self.orders.lock().unwrap().push(order.clone());
            Ok(Order {
                id: "ord-1".into(),
                user_id: order.user_id.clone(),
                status: order.status.clone(),
                total: order.total,
                stripe_checkout_id: order.stripe_checkout_id.clone(),
                address_line1: None,
                address_line2: None,
                city: None,
                state: None,
                postal_code: None,
                country: None,
                created_at: None,
            })
        }
        async fn insert_order_items(&self, items: &[NewOrderItem]) -> shop_core::ShopResult<()> {
            self.items.lock().unwrap().extend(items.iter().cloned());
            Ok(())
        }
        async fn order_by_id(&self, _: &str) -> shop_core::ShopResult<Option<Order>> {
            Ok(None)
        }
        async fn order_by_session(&self, _: &str) -> shop_core::ShopResult<Option<Order>> {
            Ok(None)
        }
        async fn order_by_session_for_user(
            &self,
            _: &str,
            _: &str,
        ) -> shop_core::ShopResult<Option<Order>> {
            Ok(None)
        }
        async fn order_items_for_order(
            &self,
            _: &str,
        ) -> shop_core::ShopResult<Vec<OrderItemDetail>> {
            Ok(vec![])
        }
    }

    fn order_job() -> ReconcileJob {
        ReconcileJob::Order {
            session_id: "cs_test_abc".into(),
            order: NewOrder {
                user_id: "user-1".into(),
                status: "pending".into(),
                total: 29.98,
                stripe_checkout_id: "cs_test_abc".into(),
            },
            items: vec![PendingItem {
                product_id: "1".into(),
                quantity: 2,
                price_at_purchase: 14.99,
            }],
        }
    }

    #[tokio::test]
    async fn test_retries_until_store_recovers() {
        let store = std::sync::Arc::new(FlakyStore::failing(2));
        let (queue, rx) = ReconcileQueue::channel(8);
        let handle = ReconcileWorker::new(store.clone())
            .with_retry_delay(Duration::from_millis(1))
            .spawn(rx);

        queue.enqueue(order_job());
        drop(queue); // close the queue so the worker exits
        handle.await.unwrap();

        assert_eq!(store.orders.lock().unwrap().len(), 1);
        let items = store.items.lock().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].order_id, "ord-1");
        assert_eq!(items[0].price_at_purchase, 14.99);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = std::sync::Arc::new(FlakyStore::failing(MAX_ATTEMPTS + 1));
        let (queue, rx) = ReconcileQueue::channel(8);
        let handle = ReconcileWorker::new(store.clone())
            .with_retry_delay(Duration::from_millis(1))
            .spawn(rx);

        queue.enqueue(order_job());
        drop(queue);
        handle.await.unwrap();

        assert!(store.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_items_only_job() {
        let store = std::sync::Arc::new(FlakyStore::default());
        let (queue, rx) = ReconcileQueue::channel(8);
        let handle = ReconcileWorker::new(store.clone())
            .with_retry_delay(Duration::from_millis(1))
            .spawn(rx);

        queue.enqueue(ReconcileJob::Items {
            session_id: "cs_test_abc".into(),
            order_id: "ord-9".into(),
            items: vec![NewOrderItem {
                order_id: "ord-9".into(),
                product_id: "1".into(),
                quantity: 1,
                price_at_purchase: 5.0,
            }],
        });
        drop(queue);
        handle.await.unwrap();

        assert_eq!(store.items.lock().unwrap().len(), 1);
    }
}
