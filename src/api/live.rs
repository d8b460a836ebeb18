/// WebSocket feed of collection changes
///
/// Sends one JSON frame per snapshot or status change:
/// `{"collection": "blogs", "version": 7, "status": {"state": "live"}}`.
/// Clients refetch the collection they care about on each frame.
use crate::{context::AppContext, models::Collection, sync::SyncEvent};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::{
    sync::broadcast::error::RecvError,
    time::{interval, timeout, Duration},
};

const SEND_TIMEOUT_MS: u64 = 5000;
const PING_INTERVAL_SECS: u64 = 30;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/live", get(subscribe_live))
}

pub async fn subscribe_live(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    ws.on_upgrade(move |socket| handle_live(socket, ctx))
}

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &SyncEvent,
) -> Result<(), ()> {
    let json = serde_json::to_string(event).map_err(|_| ())?;
    match timeout(
        Duration::from_millis(SEND_TIMEOUT_MS),
        sender.send(Message::Text(json)),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(()),
        Err(_) => {
            tracing::warn!("Live client too slow, disconnecting");
            Err(())
        }
    }
}

async fn handle_live(socket: WebSocket, ctx: AppContext) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = ctx.sync.events();

    // Current state first so the client knows where it starts
    for collection in Collection::ALL {
        let event = SyncEvent {
            collection,
            version: ctx.sync.version(collection),
            status: ctx.sync.status(collection),
        };
        if send_event(&mut sender, &event).await.is_err() {
            return;
        }
    }

    let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping_interval.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Re-announce every collection so the client catches up
                        tracing::debug!("Live client lagged by {} events", skipped);
                        for collection in Collection::ALL {
                            let event = SyncEvent {
                                collection,
                                version: ctx.sync.version(collection),
                                status: ctx.sync.status(collection),
                            };
                            if send_event(&mut sender, &event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("Live client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!("Live socket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}
