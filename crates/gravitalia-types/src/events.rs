use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone liked one of the recipient's posts.
    PostLike,
    /// Someone asked to subscribe to the recipient's private account.
    RequestSubscription,
    /// The recipient's subscription request was accepted.
    SubscriptionAccepted,
}

/// A best-effort notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub from: String,
    /// Post id for likes, vanity otherwise.
    pub to: String,
    pub important: bool,
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { vanity: String },

    /// A notification for the connected user
    Notification(Notification),
}
