use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use parley_types::events::{ErrorKind, InboundFrame, OutboundFrame};

use crate::registry::ConnectionHandle;
use crate::relay::Relay;

/// Per-connection tuning.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Frames queued for a client before further sends to it are dropped.
    pub outbound_buffer: usize,
    /// Server sends a Ping this often. Two consecutive missed Pongs drop the connection.
    pub heartbeat_interval: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            heartbeat_interval: Duration::from_secs(15),
        }
    }
}

/// Drive one client's WebSocket until it disconnects or is superseded.
///
/// The caller has already checked that `user_id` exists.
pub async fn handle_connection(
    socket: WebSocket,
    relay: Relay,
    user_id: i64,
    settings: ConnectionSettings,
) {
    let (mut sender, mut receiver) = socket.split();

    let (handle, mut outbound_rx) = ConnectionHandle::new(settings.outbound_buffer);
    relay.registry().register(user_id, handle.clone());
    info!("User {} connected ({})", user_id, handle.conn_id());

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Writer: queued frames -> client, with heartbeat and supersede handling
    let writer_handle = handle.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(settings.heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                _ = writer_handle.closed() => {
                    info!("User {} connection {} superseded, closing", user_id, writer_handle.conn_id());
                    let _ = sender
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: Utf8Bytes::from_static("superseded by a newer connection"),
                        })))
                        .await;
                    break;
                }
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode frame for user {}: {}", user_id, e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("User {} heartbeat timeout (missed {} pongs), dropping connection", user_id, missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: client frames -> relay
    let reader_handle = handle.clone();
    let reader_relay = relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_frame(&reader_relay, &reader_handle, user_id, text.as_str()).await;
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    relay.registry().unregister(user_id, &handle);
    info!("User {} disconnected ({})", user_id, handle.conn_id());
}

/// Relay one inbound text frame. Failures are reported back to this
/// connection and never end it.
pub async fn handle_frame(relay: &Relay, handle: &ConnectionHandle, user_id: i64, text: &str) {
    let request = match InboundFrame::parse(text) {
        Ok(request) => request,
        Err(e) => {
            warn!(
                "User {} bad frame: {} -- raw: {}",
                user_id,
                e,
                truncate(text, 200)
            );
            reply(handle, OutboundFrame::error(ErrorKind::Validation, e.to_string()));
            return;
        }
    };

    debug!("User {} -> {} ({} bytes)", user_id, request.receiver_id, request.content.len());

    if let Err(e) = relay.relay(user_id, request.receiver_id, request.content).await {
        warn!("User {} message to {} rejected: {}", user_id, request.receiver_id, e);
        reply(handle, OutboundFrame::error(e.kind(), e.to_string()));
    }
}

fn reply(handle: &ConnectionHandle, frame: OutboundFrame) {
    if let Err(e) = handle.send(frame) {
        warn!("Could not report failure on connection {}: {}", handle.conn_id(), e);
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
