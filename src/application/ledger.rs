use super::locks::SplitLocks;
use super::outcome::{Advisory, CreatedSplit, InviteeOutcome, MarkPaidOutcome, ReconcileOutcome};
use super::registry::{ParticipantRegistry, display_name_for, load};
use super::views::{
    EmailStatus, Invitation, PENDING_ID_PREFIX, ParticipantState, ParticipantView, PaymentIntent,
    SplitDetail, SplitSummary,
};
use crate::config::LedgerConfig;
use crate::domain::ids::{ParticipantId, SplitId, UserId};
use crate::domain::money::Amount;
use crate::domain::notification::Notification;
use crate::domain::ports::{NotifierBox, SplitStoreBox, UserDirectoryBox};
use crate::domain::shares::{self, InviteeRequest};
use crate::domain::split::{PaymentStatus, SplitRecord, SplitType};
use crate::domain::user::{User, local_part, normalize_email};
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Input of [`SplitLedger::create_split`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSplitRequest {
    pub title: String,
    pub total_amount: Decimal,
    pub split_type: SplitType,
    pub participants: Vec<InviteeRequest>,
}

/// Owns the lifecycle of split expenses.
///
/// Every operation takes the calling user explicitly. Writes to one split are
/// serialized through [`SplitLocks`] and persisted as a single record, so a
/// split's participants, pending rows and status always change together.
pub struct SplitLedger {
    store: SplitStoreBox,
    users: UserDirectoryBox,
    notifier: NotifierBox,
    locks: SplitLocks,
    config: LedgerConfig,
}

impl SplitLedger {
    pub fn new(store: SplitStoreBox, users: UserDirectoryBox, notifier: NotifierBox) -> Self {
        Self::with_config(store, users, notifier, LedgerConfig::default())
    }

    pub fn with_config(
        store: SplitStoreBox,
        users: UserDirectoryBox,
        notifier: NotifierBox,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            users,
            notifier,
            locks: SplitLocks::new(),
            config,
        }
    }

    pub fn registry(&self) -> ParticipantRegistry<'_> {
        ParticipantRegistry::new(&*self.store, &*self.users, &*self.notifier, &self.locks)
    }

    /// Registers a user and converts any splits waiting on their email.
    pub async fn register_user(&self, name: &str, email: &str) -> Result<(User, ReconcileOutcome)> {
        let user = User::new(name, email)?;
        if self.users.find_by_email(&user.email).await?.is_some() {
            return Err(LedgerError::conflict(format!("{} is already registered", user.email)));
        }
        self.users.store(user.clone()).await?;
        info!(user_id = %user.id, email = %user.email, "User registered");

        let outcome = match self.registry().reconcile_pending_for_user(&user).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Could not look up pending splits");
                ReconcileOutcome::default()
            }
        };
        Ok((user, outcome))
    }

    pub async fn find_user(&self, email: &str) -> Result<Option<User>> {
        self.users.find_by_email(&normalize_email(email)?).await
    }

    pub async fn reconcile_pending_for_user(&self, user: &User) -> Result<ReconcileOutcome> {
        self.registry().reconcile_pending_for_user(user).await
    }

    pub async fn pending_count_for_user(&self, user: &User) -> Result<usize> {
        self.registry().pending_count_for_user(user).await
    }

    /// Creates a split, settles the creator's own share and resolves every invitee.
    ///
    /// The split and the creator's row are stored before any invitee is
    /// processed; a failing invitee is reported in the outcome only. The split
    /// stays locked until every invitee has been handled.
    pub async fn create_split(&self, creator: &User, request: CreateSplitRequest) -> Result<CreatedSplit> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(LedgerError::invalid("title must not be empty"));
        }
        let total = Amount::new(request.total_amount)?;
        let invitees = prepare_invitees(creator, request.participants)?;
        let allocation = shares::allocate(total, request.split_type, &invitees)?;

        let mut record = SplitRecord::open(
            creator.id,
            title,
            total,
            request.split_type,
            allocation.creator,
            Utc::now(),
        );
        let split = record.expense().clone();

        // Held until every invitee is on the record, so nothing can settle the
        // split while it only lists some of its participants.
        let guard = self.locks.acquire(split.id).await;
        self.store.store(record.clone()).await?;
        info!(
            split_id = %split.id,
            creator = %creator.id,
            total = %total,
            split_type = %split.split_type,
            invitees = invitees.len(),
            "Split created"
        );

        let registry = self.registry();
        let mut admitted = Vec::with_capacity(allocation.invitees.len());
        for (email, share) in allocation.invitees {
            let mut next = record.clone();
            let result = match registry.admit(&mut next, &email, share).await {
                Ok(entry) => self.store.store(next.clone()).await.map(|()| entry),
                Err(e) => Err(e),
            };
            match result {
                Ok(entry) => {
                    record = next;
                    admitted.push(Ok(entry));
                }
                Err(e) => {
                    warn!(split_id = %split.id, %email, error = %e, "Failed to process invitee");
                    admitted.push(Err(InviteeOutcome::Failed {
                        email,
                        reason: e.to_string(),
                    }));
                }
            }
        }

        if record.refresh_status() {
            self.store.store(record.clone()).await?;
            info!(split_id = %split.id, "Split completed");
        }
        let status = record.expense().status;
        drop(guard);

        let creator_notice = Advisory::deliver(&*self.notifier, Notification::split_created(&split)).await;
        let mut outcomes = Vec::with_capacity(admitted.len());
        for entry in admitted {
            outcomes.push(match entry {
                Ok(entry) => registry.announce(&split, entry).await,
                Err(failed) => failed,
            });
        }

        Ok(CreatedSplit {
            split_id: split.id,
            status,
            creator_notice,
            invitees: outcomes,
        })
    }

    /// Splits the user created or participates in, newest first.
    pub async fn list_for_user(&self, user: &User) -> Result<Vec<SplitSummary>> {
        let mut records = self.store.find_for_user(user.id).await?;
        records.sort_by(|a, b| {
            b.expense()
                .created_at
                .cmp(&a.expense().created_at)
                .then_with(|| b.id().cmp(&a.id()))
        });

        let mut names: HashMap<UserId, String> = HashMap::new();
        let mut summaries = Vec::with_capacity(records.len());
        for record in records {
            let split = record.expense();
            let creator_name = match names.get(&split.creator_id) {
                Some(name) => name.clone(),
                None => {
                    let name = display_name_for(&*self.users, split.creator_id).await;
                    names.insert(split.creator_id, name.clone());
                    name
                }
            };
            let own = record.participant_for(user.id);
            summaries.push(SplitSummary {
                id: split.id,
                title: split.title.clone(),
                total_amount: split.total_amount,
                created_at: split.created_at,
                split_type: split.split_type,
                status: record.effective_status(),
                creator_name,
                is_creator: record.is_creator(user.id),
                my_share: own.map(|p| p.share),
                my_payment_status: own.map(|p| p.payment_status),
            });
        }
        Ok(summaries)
    }

    /// The split with registered and pending participants, for anyone invited to it.
    pub async fn get_detail(&self, split_id: SplitId, requester: &User) -> Result<SplitDetail> {
        let record = load(&*self.store, split_id).await?;
        if !record.can_view(requester) {
            return Err(LedgerError::denied(format!("no access to split {split_id}")));
        }

        let mut participants = Vec::with_capacity(record.participants().len() + record.pending().len());
        for participant in record.participants() {
            let user = self.users.find_by_id(participant.user_id).await?;
            let (user_name, user_email) = match user {
                Some(user) => (user.display_name().to_string(), user.email),
                None => ("Unknown user".to_string(), String::new()),
            };
            participants.push(ParticipantView {
                id: participant.id.to_string(),
                user_name,
                user_email,
                share_amount: participant.share,
                payment_status: participant.payment_status.into(),
                paid_at: participant.paid_at,
                is_current_user: participant.user_id == requester.id,
                is_registered: true,
            });
        }
        for pending in record.open_pending() {
            participants.push(ParticipantView {
                id: format!("{PENDING_ID_PREFIX}{}", pending.id),
                user_name: local_part(&pending.email).to_string(),
                user_email: pending.email.clone(),
                share_amount: pending.share,
                payment_status: ParticipantState::PendingRegistration,
                paid_at: None,
                is_current_user: pending.email == requester.email,
                is_registered: false,
            });
        }

        let split = record.expense();
        Ok(SplitDetail {
            id: split.id,
            title: split.title.clone(),
            total_amount: split.total_amount,
            created_at: split.created_at,
            split_type: split.split_type,
            status: record.effective_status(),
            creator_name: display_name_for(&*self.users, split.creator_id).await,
            is_creator: record.is_creator(requester.id),
            participants,
        })
    }

    /// Records that a participant paid. Only the creator may confirm payments.
    pub async fn mark_paid(
        &self,
        split_id: SplitId,
        participant_id: ParticipantId,
        requester: &User,
    ) -> Result<MarkPaidOutcome> {
        let guard = self.locks.acquire(split_id).await;
        let mut record = load(&*self.store, split_id).await?;
        if !record.is_creator(requester.id) {
            return Err(LedgerError::denied("only the creator can mark payments"));
        }

        let newly_paid = record.mark_paid(participant_id, Utc::now())?;
        let completed = record.refresh_status();
        let status = record.expense().status;
        let split = record.expense().clone();
        let (payer_id, share) = record
            .participant(participant_id)
            .map(|p| (p.user_id, p.share))
            .ok_or_else(|| LedgerError::not_found(format!("participant {participant_id}")))?;
        if newly_paid || completed {
            self.store.store(record).await?;
        }
        drop(guard);

        if newly_paid {
            info!(%split_id, %participant_id, %share, "Participant marked paid");
        }
        if completed {
            info!(%split_id, "Split completed");
        }

        let payment_notice = if newly_paid {
            let payer_name = display_name_for(&*self.users, payer_id).await;
            Some(
                Advisory::deliver(
                    &*self.notifier,
                    Notification::payment_received(&split, &payer_name, share),
                )
                .await,
            )
        } else {
            None
        };
        let completion_notice = if completed {
            Some(Advisory::deliver(&*self.notifier, Notification::expense_completed(&split)).await)
        } else {
            None
        };

        Ok(MarkPaidOutcome {
            participant_id,
            newly_paid,
            status,
            payment_notice,
            completion_notice,
        })
    }

    /// Deletes a split with all of its participant and pending rows.
    pub async fn delete_split(&self, split_id: SplitId, requester: &User) -> Result<()> {
        let guard = self.locks.acquire(split_id).await;
        let record = load(&*self.store, split_id).await?;
        if !record.is_creator(requester.id) {
            return Err(LedgerError::denied("only the creator can delete a split"));
        }
        self.store.delete(split_id).await?;
        drop(guard);
        info!(%split_id, "Split deleted");
        Ok(())
    }

    /// Payment descriptor for the requester's own outstanding share.
    pub async fn initiate_payment(&self, split_id: SplitId, requester: &User) -> Result<PaymentIntent> {
        let record = load(&*self.store, split_id).await?;
        let own = record
            .participant_for(requester.id)
            .ok_or_else(|| LedgerError::denied(format!("not a participant of split {split_id}")))?;
        if own.payment_status == PaymentStatus::Paid {
            return Err(LedgerError::AlreadyPaid);
        }

        let memo = format!("Payment for {}", record.expense().title);
        let uri = format!(
            "upi://pay?pa={}&am={}&tn={}&cu={}",
            self.config.payee_id,
            own.share,
            urlencoding::encode(&memo),
            self.config.currency
        );
        Ok(PaymentIntent {
            payee: self.config.payee_id.clone(),
            amount: own.share,
            memo,
            currency: self.config.currency.clone(),
            uri,
        })
    }

    /// Builds and logs an invitation asking `email` to register. Creator only.
    pub async fn send_invitation(&self, split_id: SplitId, email: &str, requester: &User) -> Result<Invitation> {
        let record = load(&*self.store, split_id).await?;
        if !record.is_creator(requester.id) {
            return Err(LedgerError::denied("only the creator can send invitations"));
        }
        let email = normalize_email(email)?;
        let invitation = Invitation {
            subject: "You're invited to join a split expense".to_string(),
            message: format!(
                "{} has added you to the split '{}'. Please register to view and pay your share.",
                requester.display_name(),
                record.expense().title
            ),
            email,
        };
        info!(%split_id, email = %invitation.email, "Invitation sent");
        Ok(invitation)
    }

    /// Registration status of each email.
    pub async fn check_emails(&self, emails: &[String]) -> Result<Vec<EmailStatus>> {
        let mut statuses = Vec::with_capacity(emails.len());
        for raw in emails {
            let user = match normalize_email(raw) {
                Ok(email) => self.users.find_by_email(&email).await?,
                Err(_) => None,
            };
            statuses.push(EmailStatus {
                email: raw.trim().to_string(),
                registered: user.is_some(),
                name: user.map(|u| u.display_name().to_string()),
            });
        }
        Ok(statuses)
    }

    /// Every stored split, with its status recomputed.
    pub async fn all_splits(&self) -> Result<Vec<SplitRecord>> {
        let mut records = self.store.get_all().await?;
        for record in &mut records {
            record.refresh_status();
        }
        records.sort_by(|a, b| {
            a.expense()
                .created_at
                .cmp(&b.expense().created_at)
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(records)
    }
}

fn prepare_invitees(creator: &User, requested: Vec<InviteeRequest>) -> Result<Vec<InviteeRequest>> {
    let mut seen = HashSet::new();
    requested
        .into_iter()
        .map(|mut invitee| {
            invitee.email = normalize_email(&invitee.email)?;
            if invitee.email == creator.email {
                return Err(LedgerError::invalid("the creator cannot invite themselves"));
            }
            if !seen.insert(invitee.email.clone()) {
                return Err(LedgerError::invalid(format!(
                    "{} is invited more than once",
                    invitee.email
                )));
            }
            Ok(invitee)
        })
        .collect()
}
