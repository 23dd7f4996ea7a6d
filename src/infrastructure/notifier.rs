use crate::domain::notification::Notification;
use crate::domain::ports::Notifier;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Delivers notifications by logging them. Used by the binary, which has no
/// real delivery channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn emit(&self, notification: Notification) -> Result<()> {
        info!(
            recipient = %notification.recipient,
            split_id = %notification.related_split,
            category = ?notification.category,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}
