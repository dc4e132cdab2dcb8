//! Axum upgrade handler and socket pump for `/ws/chat/{group_id}`.
//!
//! The reader half feeds frames into a [`ChatSession`] one at a time. The
//! writer half drains the connection's outbound queue and sends the final
//! close frame.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use huddle_core::errors::CLOSE_POLICY;
use huddle_core::{ConnectionId, GroupId};
use metrics::{counter, gauge, histogram};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::connection::ClientConnection;
use super::session::{Admission, ChatContext, ChatSession};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_REJECTED_TOTAL,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::server::AppState;

/// How long the writer may take to flush and close after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Query string of the chat endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    /// Bearer token; absent means anonymous.
    pub token: Option<String>,
}

/// Per-socket limits taken from settings.
#[derive(Clone, Copy, Debug)]
pub struct SocketLimits {
    /// Largest accepted inbound message, in bytes.
    pub max_frame_bytes: usize,
    /// Outbound frames queued per connection before drops begin.
    pub outbound_buffer: usize,
}

/// GET `/ws/chat/{group_id}?token=...`
pub async fn chat_upgrade(
    ws: WebSocketUpgrade,
    Path(group_id): Path<GroupId>,
    Query(query): Query<TokenQuery>,
    State(state): State<AppState>,
) -> Response {
    let limits = state.limits;
    let ctx = Arc::clone(&state.chat);
    let signal = Arc::clone(&state.shutdown);
    ws.max_message_size(limits.max_frame_bytes)
        .max_frame_size(limits.max_frame_bytes)
        .on_upgrade(move |socket| {
            let token = signal.token();
            signal.track_socket(run_chat_socket(socket, group_id, query.token, ctx, limits, token))
        })
}

fn close_message(code: u16, reason: &'static str) -> CloseFrame {
    CloseFrame {
        code,
        reason: reason.into(),
    }
}

/// Run one chat connection from admission to close.
#[instrument(skip_all, fields(%group_id))]
pub async fn run_chat_socket(
    mut socket: WebSocket,
    group_id: GroupId,
    token: Option<String>,
    ctx: Arc<ChatContext>,
    limits: SocketLimits,
    shutdown: CancellationToken,
) {
    let (tx, rx) = mpsc::channel::<Arc<String>>(limits.outbound_buffer.max(1));
    let admission = ChatSession::connect(ctx, group_id, token.as_deref(), |user| {
        Arc::new(ClientConnection::new(
            ConnectionId::generate(),
            user,
            group_id,
            tx,
        ))
    })
    .await;

    let mut session = match admission {
        Admission::Subscribed(session) => session,
        Admission::Rejected(reason) => {
            counter!(WS_CONNECTIONS_REJECTED_TOTAL, "reason" => reason.as_str()).increment(1);
            let frame = close_message(reason.close_code(), reason.as_str());
            let _ = socket.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    let connection = Arc::clone(session.connection());
    let conn_id = connection.id.clone();
    info!(%conn_id, user_id = %connection.user.id, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let (ws_tx, mut ws_rx) = socket.split();
    let (close_tx, close_rx) = oneshot::channel::<CloseFrame>();
    let writer = tokio::spawn(write_loop(ws_tx, rx, close_rx));

    let close = loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = connection.evicted() => break Some(close_message(CLOSE_POLICY, "slow consumer")),
            () = shutdown.cancelled() => break Some(close_message(close_code::AWAY, "server shutting down")),
        };
        let outcome = match msg {
            Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
            Some(Ok(Message::Binary(bytes))) => session.handle_binary(&bytes).await,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) => {
                debug!(%conn_id, "client sent close frame");
                break None;
            }
            Some(Err(e)) => {
                debug!(%conn_id, error = %e, "socket read failed");
                break None;
            }
            None => break None,
        };
        if let Err(e) = outcome
            && e.is_fatal()
        {
            let (code, reason) = ChatSession::close_frame_for(&e);
            break Some(close_message(code, reason));
        }
    };

    session.close();
    drop(session);
    match close {
        Some(frame) => {
            let _ = close_tx.send(frame);
        }
        // The writer awaits the close signal once its queue ends.
        None => drop(close_tx),
    }
    let connected_for = connection.age();
    drop(connection);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        debug!(%conn_id, "writer did not drain before timeout");
    }

    info!(%conn_id, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connected_for.as_secs_f64());
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Arc<String>>,
    mut close_rx: oneshot::Receiver<CloseFrame>,
) {
    let close = loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(text) => {
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        return;
                    }
                }
                None => break (&mut close_rx).await.ok(),
            },
            close = &mut close_rx => {
                // Frames already queued (including our own echo) go out first.
                while let Ok(text) = rx.try_recv() {
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        return;
                    }
                }
                break close.ok();
            }
        }
    };
    if let Some(frame) = close {
        let _ = ws_tx.send(Message::Close(Some(frame))).await;
    }
    let _ = ws_tx.close().await;
}
