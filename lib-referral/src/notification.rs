//! Notifications
//!
//! Fire-and-forget messages to account holders. Delivery happens on a
//! background worker fed through a bounded queue; enqueueing never blocks
//! and never fails the operation that produced the notification.
//!
//! # Delivery rules
//!
//! - Queue full or worker gone: the notification is logged and dropped
//! - Sink error: logged at `warn`, never propagated

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use lib_types::{format_amount, AccountId, Amount, EventKey};

/// What happened to the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A direct referral produced a commission for the account
    ReferralBonus {
        event_key: EventKey,
        from_account: AccountId,
        amount: Amount,
    },
    /// Someone enrolled with the account's referral code
    NewReferral { referred_account: AccountId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub account: AccountId,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn referral_bonus(account: AccountId, event_key: EventKey, from_account: AccountId, amount: Amount) -> Self {
        Self {
            account,
            kind: NotificationKind::ReferralBonus { event_key, from_account, amount },
        }
    }

    pub fn new_referral(account: AccountId, referred_account: AccountId) -> Self {
        Self {
            account,
            kind: NotificationKind::NewReferral { referred_account },
        }
    }

    /// Human-readable one-line message
    pub fn message(&self) -> String {
        match &self.kind {
            NotificationKind::ReferralBonus { amount, from_account, .. } => format!(
                "You earned {} in referral commission from {}",
                format_amount(*amount),
                from_account
            ),
            NotificationKind::NewReferral { referred_account } => {
                format!("New referral joined with your code: {}", referred_account)
            }
        }
    }

    /// Structured payload for sinks that forward JSON
    pub fn payload(&self) -> serde_json::Value {
        match &self.kind {
            NotificationKind::ReferralBonus { event_key, from_account, amount } => serde_json::json!({
                "kind": "referral_bonus",
                "event_key": event_key.as_str(),
                "from_account": from_account.to_hex(),
                "amount": format_amount(*amount),
            }),
            NotificationKind::NewReferral { referred_account } => serde_json::json!({
                "kind": "new_referral",
                "referred_account": referred_account.to_hex(),
            }),
        }
    }
}

/// Destination for notifications (email, push, log, ...)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Sink that writes notifications to the log
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            account = %notification.account,
            payload = %notification.payload(),
            "{}",
            notification.message()
        );
        Ok(())
    }
}

/// Handle for enqueueing notifications
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: Option<mpsc::Sender<Notification>>,
}

impl NotificationDispatcher {
    /// Start a delivery worker for `sink`
    ///
    /// The worker exits once every dispatcher clone is dropped and the
    /// queue has drained; await the handle to flush pending deliveries.
    pub fn spawn(sink: Arc<dyn NotificationSink>, queue_capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Notification>(queue_capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                if let Err(e) = sink.notify(&notification).await {
                    warn!(
                        "Failed to deliver notification to {}: {}",
                        notification.account, e
                    );
                }
            }
            debug!("Notification worker stopped");
        });

        (Self { sender: Some(sender) }, worker)
    }

    /// Dispatcher that discards everything
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Enqueue without waiting; drops the notification if the queue is full
    pub fn dispatch(&self, notification: Notification) {
        let Some(sender) = &self.sender else {
            return;
        };

        match sender.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!("Notification queue full, dropping notification for {}", n.account);
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!("Notification worker stopped, dropping notification for {}", n.account);
            }
        }
    }
}
