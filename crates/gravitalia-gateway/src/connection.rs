use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, trace, warn};

use gravitalia_types::events::GatewayEvent;

use crate::dispatcher::Dispatcher;

const PING_EVERY: Duration = Duration::from_secs(15);
/// Pings left unanswered before the socket is considered dead.
const MAX_MISSED_PONGS: u8 = 2;

type Sink = SplitSink<WebSocket, Message>;

async fn push(sink: &mut Sink, event: &GatewayEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Cannot encode gateway event: {}", e);
            true
        }
    }
}

/// Serves one authenticated gateway socket until either side goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, vanity: String) {
    let (mut sink, stream) = socket.split();

    if !push(&mut sink, &GatewayEvent::Ready { vanity: vanity.clone() }).await {
        return;
    }
    let (conn_id, events) = dispatcher.register(&vanity);
    info!("{} joined the gateway", vanity);

    let missed = Arc::new(AtomicU8::new(0));
    let mut outbound = tokio::spawn(outbound(sink, events, missed.clone(), vanity.clone()));
    let mut inbound = tokio::spawn(inbound(stream, missed, vanity.clone()));

    tokio::select! {
        _ = &mut outbound => inbound.abort(),
        _ = &mut inbound => outbound.abort(),
    }

    dispatcher.unregister(&vanity, conn_id);
    info!("{} left the gateway", vanity);
}

/// Notifications and pings toward the client.
async fn outbound(
    mut sink: Sink,
    mut events: UnboundedReceiver<GatewayEvent>,
    missed: Arc<AtomicU8>,
    vanity: String,
) {
    let mut ping = tokio::time::interval(PING_EVERY);
    ping.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                // A newer connection for the same user replaced this one.
                let Some(event) = event else { break };
                if !push(&mut sink, &event).await {
                    break;
                }
            }
            _ = ping.tick() => {
                if missed.fetch_add(1, Ordering::AcqRel) >= MAX_MISSED_PONGS {
                    warn!("{} stopped answering pings", vanity);
                    break;
                }
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = sink.close().await;
}

/// The gateway is push-only. Client frames only prove liveness.
async fn inbound(mut stream: SplitStream<WebSocket>, missed: Arc<AtomicU8>, vanity: String) {
    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            Message::Pong(_) => missed.store(0, Ordering::Release),
            Message::Close(_) => break,
            other => trace!("{} sent an ignored frame: {:?}", vanity, other),
        }
    }
}
