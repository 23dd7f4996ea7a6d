use super::ids::{SplitId, UserId};
use super::money::Share;
use super::split::SplitExpense;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    SplitCreated,
    PaymentReceived,
    ExpenseCompleted,
}

/// A fire-and-forget message for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub related_split: SplitId,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn new(
        recipient: UserId,
        title: &str,
        message: String,
        category: NotificationCategory,
        related_split: SplitId,
    ) -> Self {
        Self {
            recipient,
            title: title.to_string(),
            message,
            category,
            related_split,
            created_at: Utc::now(),
        }
    }

    pub fn split_created(split: &SplitExpense) -> Self {
        Self::new(
            split.creator_id,
            "Split Created",
            format!(
                "You created a split '{}' for {}",
                split.title, split.total_amount
            ),
            NotificationCategory::SplitCreated,
            split.id,
        )
    }

    pub fn added_to_split(
        split: &SplitExpense,
        creator_name: &str,
        recipient: UserId,
        share: Share,
    ) -> Self {
        Self::new(
            recipient,
            "New Split Expense",
            format!(
                "{creator_name} added you to \"{}\". Your share: {share}",
                split.title
            ),
            NotificationCategory::SplitCreated,
            split.id,
        )
    }

    pub fn payment_received(split: &SplitExpense, payer_name: &str, share: Share) -> Self {
        Self::new(
            split.creator_id,
            "Payment Received",
            format!("{payer_name} paid {share} for '{}'", split.title),
            NotificationCategory::PaymentReceived,
            split.id,
        )
    }

    pub fn expense_completed(split: &SplitExpense) -> Self {
        Self::new(
            split.creator_id,
            "Expense Completed",
            format!("All participants have paid for \"{}\"", split.title),
            NotificationCategory::ExpenseCompleted,
            split.id,
        )
    }
}
