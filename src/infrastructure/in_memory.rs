use crate::domain::ids::{SplitId, UserId};
use crate::domain::notification::Notification;
use crate::domain::ports::{Notifier, SplitStore, UserDirectory};
use crate::domain::split::SplitRecord;
use crate::domain::user::User;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for split records.
///
/// Uses `Arc<RwLock<HashMap<SplitId, SplitRecord>>>` so clones share the same data.
#[derive(Default, Clone)]
pub struct InMemorySplitStore {
    splits: Arc<RwLock<HashMap<SplitId, SplitRecord>>>,
}

impl InMemorySplitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SplitStore for InMemorySplitStore {
    async fn store(&self, record: SplitRecord) -> Result<()> {
        let mut splits = self.splits.write().await;
        splits.insert(record.id(), record);
        Ok(())
    }

    async fn get(&self, split_id: SplitId) -> Result<Option<SplitRecord>> {
        let splits = self.splits.read().await;
        Ok(splits.get(&split_id).cloned())
    }

    async fn delete(&self, split_id: SplitId) -> Result<bool> {
        let mut splits = self.splits.write().await;
        Ok(splits.remove(&split_id).is_some())
    }

    async fn find_for_user(&self, user_id: UserId) -> Result<Vec<SplitRecord>> {
        let splits = self.splits.read().await;
        Ok(splits
            .values()
            .filter(|r| r.is_creator(user_id) || r.participant_for(user_id).is_some())
            .cloned()
            .collect())
    }

    async fn find_open_pending(&self, email: &str) -> Result<Vec<SplitRecord>> {
        let splits = self.splits.read().await;
        Ok(splits
            .values()
            .filter(|r| r.open_pending_for(email).next().is_some())
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<SplitRecord>> {
        let splits = self.splits.read().await;
        Ok(splits.values().cloned().collect())
    }
}

#[derive(Default)]
struct Users {
    by_id: HashMap<UserId, User>,
    by_email: HashMap<String, UserId>,
}

/// In-memory user directory with a unique email index.
#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<Users>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn store(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(existing) = users.by_email.get(&user.email)
            && *existing != user.id
        {
            return Err(LedgerError::conflict(format!("{} is already registered", user.email)));
        }
        users.by_email.insert(user.email.clone(), user.id);
        users.by_id.insert(user.id, user);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .by_email
            .get(email)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.by_id.get(&user_id).cloned())
    }
}

/// Keeps every emitted notification in memory, in emission order.
#[derive(Default, Clone)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, recipient: UserId) -> Vec<Notification> {
        let sent = self.sent.read().await;
        sent.iter().filter(|n| n.recipient == recipient).cloned().collect()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn emit(&self, notification: Notification) -> Result<()> {
        self.sent.write().await.push(notification);
        Ok(())
    }
}
