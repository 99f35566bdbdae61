use crate::{
    bookings::{BookingStore, PersistError},
    configuration::Configuration,
    http::create_app_with_mailer,
    memory_store::MemoryStore,
    notification::Mailer,
    protocol::BookingNotification,
    slot::Slot,
    store::{KvStore, StoreError, StoreResult},
    sync_client::{BookingApi, SyncError},
    types::BookingRecord,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::{net::TcpListener, task::JoinHandle};

pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

#[derive(Clone, Default)]
pub struct TestConfiguration;

impl Configuration for TestConfiguration {
    fn port(&self) -> String {
        "0".into()
    }

    fn access_token(&self) -> String {
        TEST_ACCESS_TOKEN.into()
    }

    fn database_url(&self) -> Option<String> {
        None
    }

    fn email_api_key(&self) -> Option<String> {
        None
    }

    fn email_api_url(&self) -> String {
        "http://127.0.0.1:9/emails".into()
    }

    fn email_sender(&self) -> String {
        "Réservations <bookings@example.com>".into()
    }

    fn operator_email(&self) -> String {
        "operator@example.com".into()
    }
}

/// Serves the app on an ephemeral port and returns its base url.
pub async fn spawn_server<S: KvStore>(
    store: S,
    mailer: Option<Arc<dyn Mailer>>,
) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app = create_app_with_mailer(store, mailer, TestConfiguration);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{address}"), handle)
}

pub struct MockStoreInner {
    pub store: MemoryStore,
    /// Writes to keys starting with this prefix fail.
    pub fail_on_write: Mutex<Option<&'static str>>,
    pub fail_on_scan: AtomicBool,
    pub calls_to_get: AtomicU64,
    pub calls_to_set: AtomicU64,
    pub calls_to_set_if_absent: AtomicU64,
    pub calls_to_remove: AtomicU64,
    pub calls_to_scan_prefix: AtomicU64,
}

#[derive(Clone)]
pub struct MockStore(pub Arc<MockStoreInner>);

impl MockStore {
    pub fn new() -> Self {
        Self(Arc::new(MockStoreInner {
            store: MemoryStore::default(),
            fail_on_write: Mutex::default(),
            fail_on_scan: AtomicBool::new(false),
            calls_to_get: AtomicU64::default(),
            calls_to_set: AtomicU64::default(),
            calls_to_set_if_absent: AtomicU64::default(),
            calls_to_remove: AtomicU64::default(),
            calls_to_scan_prefix: AtomicU64::default(),
        }))
    }

    pub fn fail_writes_to(&self, prefix: Option<&'static str>) {
        *self.0.fail_on_write.lock().unwrap() = prefix;
    }

    pub fn writes(&self) -> u64 {
        self.0.calls_to_set.load(Ordering::SeqCst)
            + self.0.calls_to_set_if_absent.load(Ordering::SeqCst)
    }

    fn fail_if(flag: &AtomicBool) -> StoreResult<()> {
        match flag.load(Ordering::SeqCst) {
            true => Err(StoreError::Unavailable("Supposed to fail".into())),
            false => Ok(()),
        }
    }

    fn fail_if_write_blocked(&self, key: &str) -> StoreResult<()> {
        match *self.0.fail_on_write.lock().unwrap() {
            Some(prefix) if key.starts_with(prefix) => {
                Err(StoreError::Unavailable("Supposed to fail".into()))
            }
            _ => Ok(()),
        }
    }
}

impl KvStore for MockStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.0.calls_to_get.fetch_add(1, Ordering::SeqCst);
        self.0.store.get(key)
    }

    fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.0.calls_to_set.fetch_add(1, Ordering::SeqCst);
        self.fail_if_write_blocked(key)?;
        self.0.store.set(key, value)
    }

    fn set_if_absent(&self, key: &str, value: Value) -> StoreResult<bool> {
        self.0.calls_to_set_if_absent.fetch_add(1, Ordering::SeqCst);
        self.fail_if_write_blocked(key)?;
        self.0.store.set_if_absent(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.0.calls_to_remove.fetch_add(1, Ordering::SeqCst);
        self.0.store.remove(key)
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<Value>> {
        self.0.calls_to_scan_prefix.fetch_add(1, Ordering::SeqCst);
        Self::fail_if(&self.0.fail_on_scan)?;
        self.0.store.scan_prefix(prefix)
    }
}

pub struct FakeBookingApiInner {
    pub bookings: BookingStore<MemoryStore>,
    pub fail_on_slot: Mutex<Option<Slot>>,
    pub fail_list: AtomicBool,
    pub fail_notify: AtomicBool,
    pub hang: AtomicBool,
    pub calls_to_list_bookings: AtomicU64,
    pub calls_to_persist_booking: AtomicU64,
    pub calls_to_notify: AtomicU64,
    pub notifications: Mutex<Vec<BookingNotification>>,
}

/// In-process stand-in for the booking server, shared by cloned handles.
#[derive(Clone)]
pub struct FakeBookingApi(pub Arc<FakeBookingApiInner>);

impl FakeBookingApi {
    pub fn new() -> Self {
        Self(Arc::new(FakeBookingApiInner {
            bookings: BookingStore::new(MemoryStore::default()),
            fail_on_slot: Mutex::default(),
            fail_list: AtomicBool::new(false),
            fail_notify: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            calls_to_list_bookings: AtomicU64::default(),
            calls_to_persist_booking: AtomicU64::default(),
            calls_to_notify: AtomicU64::default(),
            notifications: Mutex::default(),
        }))
    }

    /// Books `slot` for some other client.
    pub fn insert_booking(&self, date: NaiveDate, slot: Slot) {
        let booking = BookingRecord::new(date, slot, "Someone Else", "else@example.com");
        self.0.bookings.persist(&booking).unwrap();
    }

    pub fn stored_pairs(&self) -> Vec<(NaiveDate, u8)> {
        self.0
            .bookings
            .list()
            .unwrap()
            .into_iter()
            .map(|booking| (booking.date, booking.hour.hour()))
            .collect()
    }

    async fn hang_if_requested(&self) {
        if self.0.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl BookingApi for FakeBookingApi {
    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, SyncError> {
        self.0.calls_to_list_bookings.fetch_add(1, Ordering::SeqCst);
        self.hang_if_requested().await;
        if self.0.fail_list.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("Failed to fetch bookings".into()));
        }
        self.0
            .bookings
            .list()
            .map_err(|err| SyncError::Persistence(err.to_string()))
    }

    async fn persist_booking(&self, booking: &BookingRecord) -> Result<(), SyncError> {
        self.0.calls_to_persist_booking.fetch_add(1, Ordering::SeqCst);
        self.hang_if_requested().await;
        let fail_on_slot = *self.0.fail_on_slot.lock().unwrap();
        if fail_on_slot == Some(booking.hour) {
            return Err(SyncError::Persistence("Failed to save booking".into()));
        }
        match self.0.bookings.persist(booking) {
            Ok(()) => Ok(()),
            Err(PersistError::SlotTaken { .. }) => Err(SyncError::SlotTaken),
            Err(err @ PersistError::IdInUse { .. }) => Err(SyncError::Validation(err.to_string())),
            Err(PersistError::Store(err)) => Err(SyncError::Persistence(err.to_string())),
        }
    }

    async fn notify(&self, notification: &BookingNotification) -> Result<String, SyncError> {
        let calls = self.0.calls_to_notify.fetch_add(1, Ordering::SeqCst) + 1;
        if self.0.fail_notify.load(Ordering::SeqCst) {
            return Err(SyncError::Notification("Supposed to fail".into()));
        }
        self.0
            .notifications
            .lock()
            .unwrap()
            .push(notification.clone());
        Ok(format!("email-{calls}"))
    }
}
