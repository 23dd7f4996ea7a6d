#![allow(dead_code)]

use async_trait::async_trait;
use split_ledger::application::ledger::SplitLedger;
use split_ledger::domain::ids::{SplitId, UserId};
use split_ledger::domain::notification::Notification;
use split_ledger::domain::ports::{Notifier, SplitStore, UserDirectory};
use split_ledger::domain::split::SplitRecord;
use split_ledger::domain::user::User;
use split_ledger::error::{LedgerError, Result};
use split_ledger::infrastructure::in_memory::{InMemoryNotifier, InMemorySplitStore, InMemoryUserDirectory};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// A ledger over in-memory adapters, keeping handles to inspect them.
pub struct Harness {
    pub ledger: SplitLedger,
    pub store: InMemorySplitStore,
    pub users: InMemoryUserDirectory,
    pub notifier: InMemoryNotifier,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemorySplitStore::new();
        let users = InMemoryUserDirectory::new();
        let notifier = InMemoryNotifier::new();
        let ledger = SplitLedger::new(
            Box::new(store.clone()),
            Box::new(users.clone()),
            Box::new(notifier.clone()),
        );
        Self {
            ledger,
            store,
            users,
            notifier,
        }
    }

    pub async fn user(&self, name: &str, email: &str) -> User {
        self.ledger.register_user(name, email).await.unwrap().0
    }
}

/// A notifier whose channel is always down.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn emit(&self, _notification: Notification) -> Result<()> {
        Err(LedgerError::internal("notification channel down"))
    }
}

/// User directory that fails lookups for selected emails.
#[derive(Clone, Default)]
pub struct FlakyUserDirectory {
    pub inner: InMemoryUserDirectory,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FlakyUserDirectory {
    pub fn fail_lookups_for(&self, email: &str) {
        self.failing.lock().unwrap().insert(email.to_string());
    }
}

#[async_trait]
impl UserDirectory for FlakyUserDirectory {
    async fn store(&self, user: User) -> Result<()> {
        self.inner.store(user).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        if self.failing.lock().unwrap().contains(email) {
            return Err(LedgerError::internal(format!("directory unavailable for {email}")));
        }
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        self.inner.find_by_id(user_id).await
    }
}

/// Split store that rejects writes to selected splits.
#[derive(Clone, Default)]
pub struct FlakySplitStore {
    pub inner: InMemorySplitStore,
    read_only: Arc<Mutex<HashSet<SplitId>>>,
}

impl FlakySplitStore {
    pub fn reject_writes_to(&self, split_id: SplitId) {
        self.read_only.lock().unwrap().insert(split_id);
    }
}

#[async_trait]
impl SplitStore for FlakySplitStore {
    async fn store(&self, record: SplitRecord) -> Result<()> {
        if self.read_only.lock().unwrap().contains(&record.id()) {
            return Err(LedgerError::internal(format!("write to split {} failed", record.id())));
        }
        self.inner.store(record).await
    }

    async fn get(&self, split_id: SplitId) -> Result<Option<SplitRecord>> {
        self.inner.get(split_id).await
    }

    async fn delete(&self, split_id: SplitId) -> Result<bool> {
        self.inner.delete(split_id).await
    }

    async fn find_for_user(&self, user_id: UserId) -> Result<Vec<SplitRecord>> {
        self.inner.find_for_user(user_id).await
    }

    async fn find_open_pending(&self, email: &str) -> Result<Vec<SplitRecord>> {
        self.inner.find_open_pending(email).await
    }

    async fn get_all(&self) -> Result<Vec<SplitRecord>> {
        self.inner.get_all().await
    }
}

/// User directory that parks one email lookup until released.
#[derive(Clone, Default)]
pub struct GatedUserDirectory {
    pub inner: InMemoryUserDirectory,
    gated: Arc<Mutex<Option<String>>>,
    reached: Arc<tokio::sync::Notify>,
    release: Arc<tokio::sync::Notify>,
}

impl GatedUserDirectory {
    /// The next lookup of `email` blocks until [`Self::open`] is called.
    pub fn hold(&self, email: &str) {
        *self.gated.lock().unwrap() = Some(email.to_string());
    }

    pub async fn wait_until_held(&self) {
        self.reached.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl UserDirectory for GatedUserDirectory {
    async fn store(&self, user: User) -> Result<()> {
        self.inner.store(user).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let held = {
            let mut gated = self.gated.lock().unwrap();
            if gated.as_deref() == Some(email) {
                gated.take()
            } else {
                None
            }
        };
        if held.is_some() {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        self.inner.find_by_id(user_id).await
    }
}
