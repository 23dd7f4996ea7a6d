use crate::domain::ids::{ParticipantId, SplitId};
use crate::domain::money::{Amount, Share};
use crate::domain::split::{PaymentStatus, SplitStatus, SplitType};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Prefix that marks a pending (unregistered) entry in a participant list.
pub const PENDING_ID_PREFIX: &str = "pending_";

/// One entry of `list_for_user`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitSummary {
    pub id: SplitId,
    pub title: String,
    pub total_amount: Amount,
    pub created_at: DateTime<Utc>,
    pub split_type: SplitType,
    pub status: SplitStatus,
    pub creator_name: String,
    pub is_creator: bool,
    pub my_share: Option<Share>,
    pub my_payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitDetail {
    pub id: SplitId,
    pub title: String,
    pub total_amount: Amount,
    pub created_at: DateTime<Utc>,
    pub split_type: SplitType,
    pub status: SplitStatus,
    pub creator_name: String,
    pub is_creator: bool,
    pub participants: Vec<ParticipantView>,
}

impl SplitDetail {
    pub fn participant_by_email(&self, email: &str) -> Option<&ParticipantView> {
        self.participants.iter().find(|p| p.user_email == email)
    }
}

/// Payment state as shown to users, including people who have not registered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantState {
    Pending,
    Paid,
    PendingRegistration,
}

impl From<PaymentStatus> for ParticipantState {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => Self::Pending,
            PaymentStatus::Paid => Self::Paid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    /// Participant id, or `pending_<id>` for unregistered invitees.
    pub id: String,
    pub user_name: String,
    pub user_email: String,
    pub share_amount: Share,
    pub payment_status: ParticipantState,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_current_user: bool,
    pub is_registered: bool,
}

impl ParticipantView {
    /// The id to pass to `mark_paid`; `None` for pending entries.
    pub fn participant_id(&self) -> Option<ParticipantId> {
        if self.is_registered {
            self.id.parse().ok()
        } else {
            None
        }
    }
}

/// Descriptor handed to an external payment rail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub payee: String,
    pub amount: Share,
    pub memo: String,
    pub currency: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStatus {
    pub email: String,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invitation {
    pub email: String,
    pub subject: String,
    pub message: String,
}
