//! Notification & Broadcast Gateway
//!
//! Two delivery surfaces for reward events: a persisted notification row per
//! affected user, and a realtime fan-out over a fixed set of named channels
//! backed by `tokio::sync::broadcast`. Both return explicit results; callers
//! decide whether a failure is fatal (it never is for reward cascades, which
//! log and continue).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{NewNotification, UserId};
use crate::storage::{Store, StoreError};

/// Fixed channel taxonomy. Private addressing happens inside the event via
/// `Audience`, not by minting per-user channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    MatchUpdates,
    XpUpdates,
    InventoryChanges,
    Leaderboard,
    Chat,
    Notifications,
    Betting,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::MatchUpdates,
        Channel::XpUpdates,
        Channel::InventoryChanges,
        Channel::Leaderboard,
        Channel::Chat,
        Channel::Notifications,
        Channel::Betting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::MatchUpdates => "match_updates",
            Channel::XpUpdates => "xp_updates",
            Channel::InventoryChanges => "inventory_changes",
            Channel::Leaderboard => "leaderboard",
            Channel::Chat => "chat",
            Channel::Notifications => "notifications",
            Channel::Betting => "betting",
        }
    }
}

/// Who an event is addressed to. Subscribers receive everything on the
/// channel and filter on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "user_id")]
pub enum Audience {
    User(UserId),
    All,
}

impl Audience {
    pub fn includes(&self, user_id: UserId) -> bool {
        match self {
            Audience::User(id) => *id == user_id,
            Audience::All => true,
        }
    }
}

/// One realtime event as delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub channel: Channel,
    pub audience: Audience,
    pub event: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Notification persistence + broadcast hub.
#[derive(Clone)]
pub struct NotificationGateway {
    store: Arc<Store>,
    senders: Arc<HashMap<Channel, broadcast::Sender<RealtimeEvent>>>,
}

impl NotificationGateway {
    pub fn new(store: Arc<Store>, capacity: usize) -> Self {
        let senders = Channel::ALL
            .iter()
            .map(|&c| (c, broadcast::channel(capacity).0))
            .collect();
        Self {
            store,
            senders: Arc::new(senders),
        }
    }

    /// Subscribe to one channel. Receivers lag-drop under backpressure, the
    /// standard `broadcast` semantics.
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<RealtimeEvent> {
        self.senders[&channel].subscribe()
    }

    /// Publish one event. Returns how many subscribers received it; zero
    /// subscribers is a successful no-op, not an error.
    pub fn publish(
        &self,
        channel: Channel,
        audience: Audience,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<usize, GatewayError> {
        let delivered = self.senders[&channel]
            .send(RealtimeEvent {
                channel,
                audience,
                event: event.to_string(),
                payload,
            })
            .unwrap_or(0);

        debug!(
            channel = channel.as_str(),
            event, delivered, "published realtime event"
        );
        Ok(delivered)
    }

    /// Persist a notification row and echo it on the notifications channel.
    /// The broadcast piggybacks on the persisted row's id.
    pub async fn notify(&self, notification: NewNotification) -> Result<i64, GatewayError> {
        let user_id = notification.user_id;
        let kind = notification.kind.clone();
        let title = notification.title.clone();
        let data = notification.data.clone();

        let id = self.store.notifications.insert(notification).await?;

        self.publish(
            Channel::Notifications,
            Audience::User(user_id),
            &kind,
            json!({ "notification_id": id, "title": title, "data": data }),
        )?;

        Ok(id)
    }

    /// Unread notification count, surfaced for callers polling badges.
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, GatewayError> {
        Ok(self.store.notifications.unread_count(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;

    fn gateway() -> NotificationGateway {
        let backend = Arc::new(MemoryBackend::new());
        NotificationGateway::new(Arc::new(Store::in_memory(backend)), 16)
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let gw = gateway();
        let delivered = gw
            .publish(Channel::XpUpdates, Audience::All, "level_up", json!({}))
            .unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_addressed_event() {
        let gw = gateway();
        let mut rx = gw.subscribe(Channel::XpUpdates);

        gw.publish(
            Channel::XpUpdates,
            Audience::User(7),
            "level_up",
            json!({ "level": 2 }),
        )
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "level_up");
        assert!(event.audience.includes(7));
        assert!(!event.audience.includes(8));
    }

    #[tokio::test]
    async fn test_notify_persists_and_broadcasts() {
        let gw = gateway();
        let mut rx = gw.subscribe(Channel::Notifications);

        let id = gw
            .notify(NewNotification {
                user_id: 3,
                kind: "mission_completed".into(),
                title: "Daily Punter".into(),
                message: "Mission complete".into(),
                data: json!({}),
            })
            .await
            .unwrap();
        assert!(id > 0);
        assert_eq!(gw.unread_count(3).await.unwrap(), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "mission_completed");
        assert!(event.audience.includes(3));
    }
}
