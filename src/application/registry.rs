//! Participant registry: resolves invited emails to users or pending rows, and
//! converts pending rows once their email registers.

use super::locks::SplitLocks;
use super::outcome::{Advisory, InviteeOutcome, ReconcileFailure, ReconcileOutcome, ReconciledShare};
use crate::domain::ids::{ParticipantId, PendingId, SplitId, UserId};
use crate::domain::money::Share;
use crate::domain::notification::Notification;
use crate::domain::ports::{Notifier, SplitStore, UserDirectory};
use crate::domain::split::{Reconciled, SplitExpense, SplitRecord};
use crate::domain::user::{User, normalize_email};
use crate::error::{LedgerError, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

/// An invitee written into a record but not yet announced.
#[derive(Debug)]
pub(crate) enum Admitted {
    Participant {
        email: String,
        user_id: UserId,
        participant_id: ParticipantId,
        share: Share,
    },
    Pending {
        email: String,
        pending_id: PendingId,
    },
}

pub struct ParticipantRegistry<'a> {
    store: &'a dyn SplitStore,
    users: &'a dyn UserDirectory,
    notifier: &'a dyn Notifier,
    locks: &'a SplitLocks,
}

impl<'a> ParticipantRegistry<'a> {
    pub fn new(
        store: &'a dyn SplitStore,
        users: &'a dyn UserDirectory,
        notifier: &'a dyn Notifier,
        locks: &'a SplitLocks,
    ) -> Self {
        Self {
            store,
            users,
            notifier,
            locks,
        }
    }

    /// Adds `email` to the split as a participant when registered, or as a
    /// pending row otherwise.
    pub async fn resolve_invitee(
        &self,
        split: &SplitExpense,
        email: &str,
        share: Share,
    ) -> Result<InviteeOutcome> {
        let guard = self.locks.acquire(split.id).await;
        let mut record = load(self.store, split.id).await?;
        let admitted = self.admit(&mut record, email, share).await?;
        self.store.store(record).await?;
        drop(guard);
        Ok(self.announce(split, admitted).await)
    }

    /// Adds one invitee to a record the caller holds the lock for. Nothing is
    /// stored; on error the record is unchanged.
    pub(crate) async fn admit(
        &self,
        record: &mut SplitRecord,
        email: &str,
        share: Share,
    ) -> Result<Admitted> {
        let email = normalize_email(email)?;
        let user = self.users.find_by_email(&email).await?;
        let split_id = record.id();
        debug!(%split_id, %email, registered = user.is_some(), "Resolving invitee");

        match user {
            Some(user) => {
                let participant_id = record.add_participant(user.id, share)?;
                info!(%split_id, user_id = %user.id, %share, "Invitee added as participant");
                Ok(Admitted::Participant {
                    email,
                    user_id: user.id,
                    participant_id,
                    share,
                })
            }
            None => {
                let pending_id = record.add_pending(email.clone(), share, Utc::now())?;
                info!(%split_id, %email, %share, "Invitee not registered, added as pending");
                Ok(Admitted::Pending { email, pending_id })
            }
        }
    }

    /// Notifies a newly added participant. Call without holding the split lock.
    pub(crate) async fn announce(&self, split: &SplitExpense, admitted: Admitted) -> InviteeOutcome {
        match admitted {
            Admitted::Participant {
                email,
                user_id,
                participant_id,
                share,
            } => {
                let creator_name = display_name_for(self.users, split.creator_id).await;
                let notice = Advisory::deliver(
                    self.notifier,
                    Notification::added_to_split(split, &creator_name, user_id, share),
                )
                .await;
                InviteeOutcome::Registered {
                    email,
                    participant_id,
                    notice,
                }
            }
            Admitted::Pending { email, pending_id } => InviteeOutcome::Pending { email, pending_id },
        }
    }

    /// Converts every open pending row for the user's email.
    ///
    /// A failing row is recorded in the outcome and does not stop the others.
    /// Only failing to enumerate the pending rows is an error.
    pub async fn reconcile_pending_for_user(&self, user: &User) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();
        let records = self.store.find_open_pending(&user.email).await?;

        for record in records {
            let pending_ids: Vec<PendingId> =
                record.open_pending_for(&user.email).map(|p| p.id).collect();
            for pending_id in pending_ids {
                match self.reconcile_one(record.id(), pending_id, user).await {
                    Ok(Some(converted)) => outcome.converted.push(converted),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(split_id = %record.id(), %pending_id, error = %e, "Failed to reconcile pending participant");
                        outcome.failures.push(ReconcileFailure {
                            split_id: record.id(),
                            pending_id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        if let Some(err) = outcome.partial_failure() {
            warn!(user_id = %user.id, error = %err, "Reconciliation incomplete");
        }
        info!(user_id = %user.id, processed = outcome.processed(), "Reconciled pending splits");
        Ok(outcome)
    }

    /// Number of unreconciled pending rows waiting for the user's email.
    pub async fn pending_count_for_user(&self, user: &User) -> Result<usize> {
        let records = self.store.find_open_pending(&user.email).await?;
        Ok(records
            .iter()
            .map(|record| record.open_pending_for(&user.email).count())
            .sum())
    }

    async fn reconcile_one(
        &self,
        split_id: SplitId,
        pending_id: PendingId,
        user: &User,
    ) -> Result<Option<ReconciledShare>> {
        let guard = self.locks.acquire(split_id).await;
        let mut record = load(self.store, split_id).await?;

        // A concurrent reconciliation may have closed the row while we waited.
        let Some(share) = record
            .open_pending_for(&user.email)
            .find(|p| p.id == pending_id)
            .map(|p| p.share)
        else {
            return Ok(None);
        };

        let reconciled = record.reconcile_pending(pending_id, user.id)?;
        let split = record.expense().clone();
        self.store.store(record).await?;
        drop(guard);

        let converted = match reconciled {
            Reconciled::Created(participant_id) => {
                let creator_name = display_name_for(self.users, split.creator_id).await;
                let notice = Advisory::deliver(
                    self.notifier,
                    Notification::added_to_split(&split, &creator_name, user.id, share),
                )
                .await;
                ReconciledShare {
                    split_id,
                    participant_id,
                    share,
                    notice: Some(notice),
                }
            }
            Reconciled::AlreadyParticipant(participant_id) => ReconciledShare {
                split_id,
                participant_id,
                share,
                notice: None,
            },
        };
        Ok(Some(converted))
    }
}

pub(crate) async fn load(store: &dyn SplitStore, split_id: SplitId) -> Result<SplitRecord> {
    store
        .get(split_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("split {split_id}")))
}

pub(crate) async fn display_name_for(users: &dyn UserDirectory, user_id: UserId) -> String {
    match users.find_by_id(user_id).await {
        Ok(Some(user)) => user.display_name().to_string(),
        Ok(None) => "Unknown user".to_string(),
        Err(e) => {
            warn!(%user_id, error = %e, "User lookup failed");
            "Unknown user".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::domain::split::{PaymentStatus, SplitType};
    use crate::infrastructure::in_memory::{InMemoryNotifier, InMemorySplitStore, InMemoryUserDirectory};
    use rust_decimal_macros::dec;

    struct Fixture {
        store: InMemorySplitStore,
        users: InMemoryUserDirectory,
        notifier: InMemoryNotifier,
        locks: SplitLocks,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: InMemorySplitStore::new(),
                users: InMemoryUserDirectory::new(),
                notifier: InMemoryNotifier::new(),
                locks: SplitLocks::new(),
            }
        }

        fn registry(&self) -> ParticipantRegistry<'_> {
            ParticipantRegistry::new(&self.store, &self.users, &self.notifier, &self.locks)
        }

        async fn user(&self, name: &str, email: &str) -> User {
            let user = User::new(name, email).unwrap();
            self.users.store(user.clone()).await.unwrap();
            user
        }

        async fn split(&self, creator: &User) -> SplitExpense {
            let record = SplitRecord::open(
                creator.id,
                "Dinner",
                Amount::new(dec!(300)).unwrap(),
                SplitType::Equal,
                Share::new(dec!(100)).unwrap(),
                Utc::now(),
            );
            let expense = record.expense().clone();
            self.store.store(record).await.unwrap();
            expense
        }
    }

    fn share(d: rust_decimal::Decimal) -> Share {
        Share::new(d).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_registered_invitee() {
        let fx = Fixture::new();
        let alice = fx.user("Alice", "alice@x.com").await;
        let bob = fx.user("Bob", "bob@x.com").await;
        let split = fx.split(&alice).await;

        let outcome = fx
            .registry()
            .resolve_invitee(&split, "Bob@X.com", share(dec!(100)))
            .await
            .unwrap();
        assert!(matches!(outcome, InviteeOutcome::Registered { notice: Advisory::Delivered, .. }));

        let record = fx.store.get(split.id).await.unwrap().unwrap();
        let participant = record.participant_for(bob.id).unwrap();
        assert_eq!(participant.payment_status, PaymentStatus::Pending);

        let sent = fx.notifier.sent_to(bob.id).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].message.contains("Alice added you to \"Dinner\""));
    }

    #[tokio::test]
    async fn test_resolve_unregistered_invitee_twice_conflicts() {
        let fx = Fixture::new();
        let alice = fx.user("Alice", "alice@x.com").await;
        let split = fx.split(&alice).await;

        let first = fx
            .registry()
            .resolve_invitee(&split, "carol@x.com", share(dec!(100)))
            .await
            .unwrap();
        assert!(matches!(first, InviteeOutcome::Pending { .. }));

        let second = fx
            .registry()
            .resolve_invitee(&split, "carol@x.com", share(dec!(100)))
            .await;
        assert!(matches!(second, Err(LedgerError::Conflict(_))));

        let record = fx.store.get(split.id).await.unwrap().unwrap();
        assert_eq!(record.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_converts_once() {
        let fx = Fixture::new();
        let alice = fx.user("Alice", "alice@x.com").await;
        let split = fx.split(&alice).await;
        fx.registry()
            .resolve_invitee(&split, "alice2@x.com", share(dec!(50)))
            .await
            .unwrap();

        let carol = fx.user("Carol", "alice2@x.com").await;
        assert_eq!(fx.registry().pending_count_for_user(&carol).await.unwrap(), 1);

        let outcome = fx.registry().reconcile_pending_for_user(&carol).await.unwrap();
        assert_eq!(outcome.processed(), 1);
        assert!(outcome.failures.is_empty());

        let record = fx.store.get(split.id).await.unwrap().unwrap();
        let participant = record.participant_for(carol.id).unwrap();
        assert_eq!(participant.share.value(), dec!(50));
        assert_eq!(participant.payment_status, PaymentStatus::Pending);
        assert!(record.pending()[0].notified);

        let again = fx.registry().reconcile_pending_for_user(&carol).await.unwrap();
        assert_eq!(again.processed(), 0);
        assert_eq!(fx.registry().pending_count_for_user(&carol).await.unwrap(), 0);
        let record = fx.store.get(split.id).await.unwrap().unwrap();
        assert_eq!(record.participants().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_missing_split() {
        let fx = Fixture::new();
        let alice = fx.user("Alice", "alice@x.com").await;
        let split = fx.split(&alice).await;
        fx.store.delete(split.id).await.unwrap();

        let result = fx
            .registry()
            .resolve_invitee(&split, "bob@x.com", share(dec!(1)))
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }
}
