use crate::events::outbound_channel;
use crate::protocol::ClientFrame;
use crate::server::AppContext;
use crate::session::SessionCoordinator;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

const INBOUND_CHANNEL_BUFFER: usize = 64;

/// Runs one WebSocket connection until the client goes away.
///
/// Three pieces cooperate: the reader below parses text frames into the
/// coordinator's inbound channel, the coordinator task handles them in
/// order, and a writer task drains the outbound channel onto the socket.
/// Closing the reader closes the inbound channel, which makes the
/// coordinator run its disconnect path.
pub async fn serve_connection(socket: WebSocket, ctx: AppContext) {
    let conn_id = Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = outbound_channel();
    let (inbound_tx, inbound_rx) = mpsc::channel::<ClientFrame>(INBOUND_CHANNEL_BUFFER);

    tracing::info!(conn_id = %conn_id, "connection opened");

    let writer_id = conn_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(conn_id = %writer_id, error = %err, "failed to encode event");
                    continue;
                }
            };
            if let Err(err) = ws_tx.send(Message::text(text)).await {
                tracing::debug!(conn_id = %writer_id, error = %err, "socket write failed");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let rejections = outbound_tx.clone();
    let coordinator = SessionCoordinator::new(ctx, conn_id.clone(), outbound_tx);
    let session = tokio::spawn(coordinator.run(inbound_rx));

    while let Some(message) = ws_rx.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(conn_id = %conn_id, error = %err, "socket read failed");
                break;
            }
        };

        if message.is_close() {
            break;
        }
        // Binary and ping/pong frames carry no events.
        let Ok(text) = message.to_str() else {
            continue;
        };

        match ClientFrame::parse(text) {
            Ok(frame) => {
                if inbound_tx.send(frame).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(
                    conn_id = %conn_id,
                    event = ?err.event,
                    error = %err,
                    "malformed frame ignored"
                );
                if let Some(reply) = err.rejection() {
                    if rejections.send(reply).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    drop(inbound_tx);
    drop(rejections);
    if let Err(err) = session.await {
        tracing::error!(conn_id = %conn_id, error = %err, "session task failed");
    }
    writer.abort();

    tracing::info!(conn_id = %conn_id, "connection closed");
}
