use super::ids::{SplitId, UserId};
use super::notification::Notification;
use super::split::SplitRecord;
use super::user::User;
use crate::error::Result;
use async_trait::async_trait;

/// Persistence for split aggregates. A record is always written whole.
#[async_trait]
pub trait SplitStore: Send + Sync {
    async fn store(&self, record: SplitRecord) -> Result<()>;
    async fn get(&self, split_id: SplitId) -> Result<Option<SplitRecord>>;
    /// Removes the split with every participant and pending row. Returns whether it existed.
    async fn delete(&self, split_id: SplitId) -> Result<bool>;
    /// Splits the user created or holds a participant row on.
    async fn find_for_user(&self, user_id: UserId) -> Result<Vec<SplitRecord>>;
    /// Splits holding at least one unreconciled pending row for `email`.
    async fn find_open_pending(&self, email: &str) -> Result<Vec<SplitRecord>>;
    async fn get_all(&self) -> Result<Vec<SplitRecord>>;
}

/// Lookup of registered users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Registers a user. Emails are unique.
    async fn store(&self, user: User) -> Result<()>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>>;
}

/// Delivery of notifications keyed by recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn emit(&self, notification: Notification) -> Result<()>;
}

pub type SplitStoreBox = Box<dyn SplitStore>;
pub type UserDirectoryBox = Box<dyn UserDirectory>;
pub type NotifierBox = Box<dyn Notifier>;
