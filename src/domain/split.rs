use super::ids::{ParticipantId, PendingId, SplitId, UserId};
use super::money::{Amount, Share};
use super::user::User;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitType {
    Equal,
    Exact,
}

impl FromStr for SplitType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EQUAL" => Ok(Self::Equal),
            "EXACT" => Ok(Self::Exact),
            other => Err(LedgerError::invalid(format!("unknown split type '{other}'"))),
        }
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => f.write_str("EQUAL"),
            Self::Exact => f.write_str("EXACT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitStatus {
    Pending,
    Completed,
}

impl fmt::Display for SplitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Completed => f.write_str("COMPLETED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// A single bill to be divided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitExpense {
    pub id: SplitId,
    pub title: String,
    pub total_amount: Amount,
    pub split_type: SplitType,
    pub status: SplitStatus,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A registered user's stake in a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitParticipant {
    pub id: ParticipantId,
    pub split_id: SplitId,
    pub user_id: UserId,
    pub share: Share,
    pub payment_status: PaymentStatus,
    /// Set only on the transition to `Paid`.
    pub paid_at: Option<DateTime<Utc>>,
}

impl SplitParticipant {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Placeholder for an invited email with no account yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSplitParticipant {
    pub id: PendingId,
    pub split_id: SplitId,
    pub email: String,
    pub share: Share,
    /// True once converted into a [`SplitParticipant`]. Kept for audit.
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl PendingSplitParticipant {
    pub fn is_open(&self) -> bool {
        !self.notified
    }
}

/// Result of converting a pending row for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Created(ParticipantId),
    /// The user already had a participant row; only the pending row was closed.
    AlreadyParticipant(ParticipantId),
}

/// A split together with every row it owns.
///
/// Participants and pending participants are only reachable through their
/// split, and the whole record is persisted in one write, so deleting or
/// updating a split always covers its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    expense: SplitExpense,
    participants: Vec<SplitParticipant>,
    pending: Vec<PendingSplitParticipant>,
}

impl SplitRecord {
    /// Opens a split whose creator is already settled for `creator_share`.
    pub fn open(
        creator_id: UserId,
        title: impl Into<String>,
        total_amount: Amount,
        split_type: SplitType,
        creator_share: Share,
        now: DateTime<Utc>,
    ) -> Self {
        let id = SplitId::new();
        let creator = SplitParticipant {
            id: ParticipantId::new(),
            split_id: id,
            user_id: creator_id,
            share: creator_share,
            payment_status: PaymentStatus::Paid,
            paid_at: Some(now),
        };
        Self {
            expense: SplitExpense {
                id,
                title: title.into(),
                total_amount,
                split_type,
                status: SplitStatus::Pending,
                creator_id,
                created_at: now,
            },
            participants: vec![creator],
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> SplitId {
        self.expense.id
    }

    pub fn expense(&self) -> &SplitExpense {
        &self.expense
    }

    pub fn participants(&self) -> &[SplitParticipant] {
        &self.participants
    }

    pub fn pending(&self) -> &[PendingSplitParticipant] {
        &self.pending
    }

    pub fn open_pending(&self) -> impl Iterator<Item = &PendingSplitParticipant> + '_ {
        self.pending.iter().filter(|p| p.is_open())
    }

    pub fn open_pending_for<'a>(
        &'a self,
        email: &'a str,
    ) -> impl Iterator<Item = &'a PendingSplitParticipant> + 'a {
        self.open_pending().filter(move |p| p.email == email)
    }

    pub fn participant(&self, participant_id: ParticipantId) -> Option<&SplitParticipant> {
        self.participants.iter().find(|p| p.id == participant_id)
    }

    pub fn participant_for(&self, user_id: UserId) -> Option<&SplitParticipant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn is_creator(&self, user_id: UserId) -> bool {
        self.expense.creator_id == user_id
    }

    /// Creator, participant, or invited by email (reconciled or not).
    pub fn can_view(&self, user: &User) -> bool {
        self.is_creator(user.id)
            || self.participant_for(user.id).is_some()
            || self.pending.iter().any(|p| p.email == user.email)
    }

    pub fn add_participant(&mut self, user_id: UserId, share: Share) -> Result<ParticipantId> {
        if self.participant_for(user_id).is_some() {
            return Err(LedgerError::conflict(format!(
                "user {user_id} already participates in split {}",
                self.id()
            )));
        }
        let id = ParticipantId::new();
        self.participants.push(SplitParticipant {
            id,
            split_id: self.id(),
            user_id,
            share,
            payment_status: PaymentStatus::Pending,
            paid_at: None,
        });
        Ok(id)
    }

    pub fn add_pending(
        &mut self,
        email: impl Into<String>,
        share: Share,
        now: DateTime<Utc>,
    ) -> Result<PendingId> {
        let email = email.into();
        if self.open_pending_for(&email).next().is_some() {
            return Err(LedgerError::conflict(format!(
                "{email} is already pending on split {}",
                self.id()
            )));
        }
        let id = PendingId::new();
        self.pending.push(PendingSplitParticipant {
            id,
            split_id: self.id(),
            email,
            share,
            notified: false,
            created_at: now,
        });
        Ok(id)
    }

    /// Turns an open pending row into a participant for `user_id` and closes it.
    pub fn reconcile_pending(&mut self, pending_id: PendingId, user_id: UserId) -> Result<Reconciled> {
        let split_id = self.id();
        let idx = self
            .pending
            .iter()
            .position(|p| p.id == pending_id)
            .ok_or_else(|| {
                LedgerError::not_found(format!("pending participant {pending_id} on split {split_id}"))
            })?;
        if !self.pending[idx].is_open() {
            return Err(LedgerError::conflict(format!(
                "pending participant {pending_id} was already reconciled"
            )));
        }

        let share = self.pending[idx].share;
        let outcome = match self.participant_for(user_id).map(|p| p.id) {
            Some(existing) => Reconciled::AlreadyParticipant(existing),
            None => Reconciled::Created(self.add_participant(user_id, share)?),
        };
        self.pending[idx].notified = true;
        Ok(outcome)
    }

    /// Marks a participant paid. Returns `false` when it was already paid.
    pub fn mark_paid(&mut self, participant_id: ParticipantId, now: DateTime<Utc>) -> Result<bool> {
        let split_id = self.id();
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.id == participant_id)
            .ok_or_else(|| {
                LedgerError::not_found(format!("participant {participant_id} on split {split_id}"))
            })?;
        match participant.payment_status {
            PaymentStatus::Paid => Ok(false),
            PaymentStatus::Pending => {
                participant.payment_status = PaymentStatus::Paid;
                participant.paid_at = Some(now);
                Ok(true)
            }
        }
    }

    /// Every participant paid and nobody left waiting to register.
    pub fn is_settled(&self) -> bool {
        self.participants.iter().all(SplitParticipant::is_paid) && self.open_pending().next().is_none()
    }

    /// Status derived from the rows rather than the stored field.
    pub fn effective_status(&self) -> SplitStatus {
        match self.expense.status {
            SplitStatus::Completed => SplitStatus::Completed,
            SplitStatus::Pending if self.is_settled() => SplitStatus::Completed,
            SplitStatus::Pending => SplitStatus::Pending,
        }
    }

    /// Applies `effective_status`. Returns `true` on the PENDING -> COMPLETED transition.
    pub fn refresh_status(&mut self) -> bool {
        let status = self.effective_status();
        let transitioned = status != self.expense.status;
        self.expense.status = status;
        transitioned
    }
}
