//! Outcome values for advisory side effects.
//!
//! Notifications and per-invitee processing never fail the ledger operation
//! that triggered them. Their results are returned here so callers can log or
//! inspect them, while hard failures stay in `Result::Err`.

use crate::domain::ids::{ParticipantId, PendingId, SplitId};
use crate::domain::money::Share;
use crate::domain::notification::Notification;
use crate::domain::ports::Notifier;
use crate::domain::split::SplitStatus;
use crate::error::LedgerError;
use tracing::warn;

/// Result of a best-effort side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    Delivered,
    Failed(String),
}

impl Advisory {
    /// Emits a notification, logging instead of propagating a delivery failure.
    pub async fn deliver(notifier: &dyn Notifier, notification: Notification) -> Self {
        let recipient = notification.recipient;
        let split_id = notification.related_split;
        match notifier.emit(notification).await {
            Ok(()) => Self::Delivered,
            Err(e) => {
                warn!(%recipient, %split_id, error = %e, "Notification not delivered");
                Self::Failed(e.to_string())
            }
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// How one invitee of a new split was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteeOutcome {
    Registered {
        email: String,
        participant_id: ParticipantId,
        notice: Advisory,
    },
    Pending {
        email: String,
        pending_id: PendingId,
    },
    Failed {
        email: String,
        reason: String,
    },
}

impl InviteeOutcome {
    pub fn email(&self) -> &str {
        match self {
            Self::Registered { email, .. } | Self::Pending { email, .. } | Self::Failed { email, .. } => {
                email
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSplit {
    pub split_id: SplitId,
    pub status: SplitStatus,
    pub creator_notice: Advisory,
    pub invitees: Vec<InviteeOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkPaidOutcome {
    pub participant_id: ParticipantId,
    /// False when the participant had already been marked paid.
    pub newly_paid: bool,
    pub status: SplitStatus,
    pub payment_notice: Option<Advisory>,
    pub completion_notice: Option<Advisory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledShare {
    pub split_id: SplitId,
    pub participant_id: ParticipantId,
    pub share: Share,
    /// `None` when the user already participated and no row was created.
    pub notice: Option<Advisory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileFailure {
    pub split_id: SplitId,
    pub pending_id: PendingId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub converted: Vec<ReconciledShare>,
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileOutcome {
    pub fn processed(&self) -> usize {
        self.converted.len()
    }

    /// The partial failure to report, if any row failed.
    pub fn partial_failure(&self) -> Option<LedgerError> {
        (!self.failures.is_empty()).then(|| LedgerError::ReconciliationPartialFailure {
            failed: self.failures.len(),
            total: self.failures.len() + self.converted.len(),
        })
    }
}
