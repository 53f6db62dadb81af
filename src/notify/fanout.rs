//! Concurrent broadcast delivery
//!
//! Every recipient is attempted independently under its own timeout. A
//! failed or slow recipient only shows up in the report; it never stops
//! the others and never fails the operation that triggered the broadcast.

use super::Messenger;
use crate::config::NotifyConfig;
use crate::error::BotError;
use crate::types::UserId;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// A recipient the broadcast did not reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub recipient: UserId,
    pub reason: String,
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
    /// Recipients dropped up front because their id is not a valid chat
    pub skipped: usize,
    /// Ordered by recipient id
    pub failures: Vec<DeliveryFailure>,
}

impl FanoutReport {
    pub fn total(&self) -> usize {
        self.delivered + self.failed + self.skipped
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

#[derive(Debug, Clone)]
pub struct NotificationFanout {
    concurrency: usize,
    per_recipient_timeout: Duration,
}

impl Default for NotificationFanout {
    fn default() -> Self {
        Self::from_config(&NotifyConfig::default())
    }
}

impl NotificationFanout {
    pub fn new(concurrency: usize, per_recipient_timeout: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            per_recipient_timeout,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(
            config.concurrency,
            Duration::from_millis(config.per_recipient_timeout_ms),
        )
    }

    /// Send `text` to every recipient and report what happened.
    pub async fn deliver(
        &self,
        messenger: &dyn Messenger,
        recipients: &[UserId],
        text: &str,
    ) -> FanoutReport {
        let broadcast_id = Uuid::new_v4();
        let (valid, invalid): (Vec<UserId>, Vec<UserId>) =
            recipients.iter().copied().partition(|id| *id > 0);

        for recipient in &invalid {
            tracing::warn!(%broadcast_id, recipient, "Skipping invalid recipient id");
        }

        let timeout = self.per_recipient_timeout;
        let outcomes: Vec<(UserId, crate::error::Result<()>)> = stream::iter(valid)
            .map(|recipient| async move {
                let outcome = match tokio::time::timeout(timeout, messenger.send_text(recipient, text)).await {
                    Ok(result) => result,
                    Err(_) => Err(BotError::Timeout { recipient }),
                };
                (recipient, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = FanoutReport {
            skipped: invalid.len(),
            ..Default::default()
        };

        for (recipient, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(%broadcast_id, recipient, error = %e, "Delivery failed");
                    report.failed += 1;
                    report.failures.push(DeliveryFailure {
                        recipient,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.failures.sort_by_key(|f| f.recipient);

        tracing::info!(
            %broadcast_id,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "Broadcast finished"
        );
        report
    }
}
