use crate::domain::ids::{SplitId, UserId};
use crate::domain::ports::{SplitStore, UserDirectory};
use crate::domain::split::SplitRecord;
use crate::domain::user::User;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Column Family holding whole split records, keyed by split id.
pub const CF_SPLITS: &str = "splits";
/// Column Family holding registered users, keyed by user id.
pub const CF_USERS: &str = "users";
/// Column Family mapping normalized emails to user ids.
pub const CF_USER_EMAILS: &str = "user_emails";

/// A persistent store implementation using RocksDB.
///
/// A split record is serialized as one value, so its participants and pending
/// rows are written and deleted together with the expense.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    /// Held across the email check and the user write so two registrations
    /// of one address cannot both pass the check.
    registration: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_SPLITS, CF_USERS, CF_USER_EMAILS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            registration: Arc::new(Mutex::new(())),
        })
    }

    fn handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::internal(format!("{name} column family not found")))
    }

    fn scan_splits(&self, mut keep: impl FnMut(&SplitRecord) -> bool) -> Result<Vec<SplitRecord>> {
        let cf = self.handle(CF_SPLITS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let record: SplitRecord = serde_json::from_slice(&value)?;
            if keep(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl SplitStore for RocksDBStore {
    async fn store(&self, record: SplitRecord) -> Result<()> {
        let cf = self.handle(CF_SPLITS)?;
        let value = serde_json::to_vec(&record)?;
        self.db.put_cf(cf, record.id().as_uuid().as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, split_id: SplitId) -> Result<Option<SplitRecord>> {
        let cf = self.handle(CF_SPLITS)?;
        match self.db.get_cf(cf, split_id.as_uuid().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, split_id: SplitId) -> Result<bool> {
        let cf = self.handle(CF_SPLITS)?;
        let key = split_id.as_uuid().as_bytes();
        let existed = self.db.get_pinned_cf(cf, key)?.is_some();
        if existed {
            self.db.delete_cf(cf, key)?;
        }
        Ok(existed)
    }

    async fn find_for_user(&self, user_id: UserId) -> Result<Vec<SplitRecord>> {
        self.scan_splits(|r| r.is_creator(user_id) || r.participant_for(user_id).is_some())
    }

    async fn find_open_pending(&self, email: &str) -> Result<Vec<SplitRecord>> {
        self.scan_splits(|r| r.open_pending_for(email).next().is_some())
    }

    async fn get_all(&self) -> Result<Vec<SplitRecord>> {
        self.scan_splits(|_| true)
    }
}

#[async_trait]
impl UserDirectory for RocksDBStore {
    async fn store(&self, user: User) -> Result<()> {
        let users = self.handle(CF_USERS)?;
        let emails = self.handle(CF_USER_EMAILS)?;
        let value = serde_json::to_vec(&user)?;

        let _registration = self.registration.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = self.db.get_pinned_cf(emails, user.email.as_bytes())?
            && existing.as_ref() != user.id.as_uuid().as_bytes()
        {
            return Err(LedgerError::conflict(format!("{} is already registered", user.email)));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(emails, user.email.as_bytes(), user.id.as_uuid().as_bytes());
        batch.put_cf(users, user.id.as_uuid().as_bytes(), value);
        self.db.write(batch)?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let emails = self.handle(CF_USER_EMAILS)?;
        let Some(id) = self.db.get_cf(emails, email.as_bytes())? else {
            return Ok(None);
        };
        let users = self.handle(CF_USERS)?;
        match self.db.get_cf(users, id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        let users = self.handle(CF_USERS)?;
        match self.db.get_cf(users, user_id.as_uuid().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
