use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use gravitalia_types::events::{GatewayEvent, Notification};

/// Routes notifications to the gateway connection of their recipient.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// Per-user send channels: vanity -> (conn_id, sender)
    user_channels: RwLock<HashMap<String, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a per-user channel. A newer connection replaces an older
    /// one for the same user.
    pub fn register(&self, vanity: &str) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        match self.inner.user_channels.write() {
            Ok(mut channels) => {
                channels.insert(vanity.to_string(), (conn_id, tx));
            }
            Err(e) => warn!("Dispatcher lock poisoned: {}", e),
        }
        (conn_id, rx)
    }

    /// Unregister a per-user channel, but only if conn_id matches.
    pub fn unregister(&self, vanity: &str, conn_id: Uuid) {
        let Ok(mut channels) = self.inner.user_channels.write() else {
            return;
        };
        if channels.get(vanity).is_some_and(|(stored, _)| *stored == conn_id) {
            channels.remove(vanity);
        }
    }

    #[cfg(test)]
    fn is_online(&self, vanity: &str) -> bool {
        self.inner
            .user_channels
            .read()
            .map(|channels| channels.contains_key(vanity))
            .unwrap_or(false)
    }

    /// Fire-and-forget delivery. Never fails the caller.
    pub fn publish(&self, recipient: &str, notification: Notification) {
        let channels = match self.inner.user_channels.read() {
            Ok(channels) => channels,
            Err(e) => {
                warn!("Dispatcher lock poisoned: {}", e);
                return;
            }
        };
        match channels.get(recipient) {
            Some((_, tx)) => {
                if tx.send(GatewayEvent::Notification(notification)).is_err() {
                    debug!("Connection of {} closed before delivery", recipient);
                }
            }
            None => debug!("{} is offline, dropping {:?}", recipient, notification.kind),
        }
    }
}
