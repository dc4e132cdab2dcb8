//! Per-connection chat session.
//!
//! Drives one connection through
//! `Connecting → Authenticated | Rejected → Subscribed → Active → Closing → Closed`
//! independently of the transport. The transport feeds it decoded frames and
//! acts on the returned outcome or error.

use std::sync::Arc;
use std::time::Instant;

use huddle_core::errors::{CLOSE_INTERNAL, CLOSE_POLICY};
use huddle_core::{
    ChatError, GroupId, Identity, InboundFrame, MembershipStore, MessageId, OutboundFrame,
    ProtocolError, StoreError, User,
};
use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use super::broker::Broker;
use super::connection::ClientConnection;
use crate::auth::CredentialVerifier;
use crate::metrics::{
    CHAT_BLANK_DROPPED_TOTAL, CHAT_DELIVERY_DURATION_SECONDS, CHAT_MESSAGES_TOTAL,
    CHAT_PERSIST_FAILURES_TOTAL, CHAT_PROTOCOL_ERRORS_TOTAL,
};

/// Collaborators shared by every session.
pub struct ChatContext {
    /// Resolves connection tokens.
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Group lookup and message persistence.
    pub store: Arc<dyn MembershipStore>,
    /// Group fan-out registry.
    pub broker: Arc<Broker>,
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Identity not yet resolved.
    Connecting,
    /// Identity resolved, not yet registered with the broker.
    Authenticated,
    /// Admission refused. Terminal.
    Rejected,
    /// Registered with the broker, no frame processed yet.
    Subscribed,
    /// Processing inbound frames.
    Active,
    /// Unregistering.
    Closing,
    /// Terminal.
    Closed,
}

/// Why a connection was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Missing, invalid, or expired token, or unknown user.
    Unauthenticated,
    /// The group in the route does not exist.
    UnknownGroup,
    /// Group existence could not be checked.
    StoreUnavailable,
}

impl RejectReason {
    /// WebSocket close code for this rejection.
    pub fn close_code(self) -> u16 {
        match self {
            Self::Unauthenticated | Self::UnknownGroup => CLOSE_POLICY,
            Self::StoreUnavailable => CLOSE_INTERNAL,
        }
    }

    /// Close reason text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthorized",
            Self::UnknownGroup => "unknown group",
            Self::StoreUnavailable => "store unavailable",
        }
    }
}

/// Result of an admission attempt.
#[derive(Debug)]
pub enum Admission {
    /// The session is registered with the broker.
    Subscribed(ChatSession),
    /// The connection must be closed; nothing was registered.
    Rejected(RejectReason),
}

/// What happened to one inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Blank message, or the session is no longer active.
    Ignored,
    /// Persisted and handed to the broker.
    Delivered {
        /// Id of the stored message.
        message_id: MessageId,
        /// Subscribers that accepted the frame.
        recipients: usize,
    },
}

/// One admitted chat connection.
pub struct ChatSession {
    ctx: Arc<ChatContext>,
    connection: Arc<ClientConnection>,
    state: SessionState,
}

impl ChatSession {
    /// Authenticate `token`, check the group, and subscribe.
    ///
    /// `make_connection` builds the outbound handle once the user is known.
    /// On rejection the broker is never touched.
    #[instrument(skip_all, fields(%group_id))]
    pub async fn connect<F>(
        ctx: Arc<ChatContext>,
        group_id: GroupId,
        token: Option<&str>,
        make_connection: F,
    ) -> Admission
    where
        F: FnOnce(User) -> Arc<ClientConnection>,
    {
        let mut state = SessionState::Connecting;
        debug!(?state, "verifying credentials");

        let user = match ctx.verifier.verify(token).await {
            Identity::Authenticated(user) => user,
            Identity::Anonymous => {
                info!("rejecting anonymous connection");
                return Self::reject(RejectReason::Unauthenticated);
            }
        };
        state = SessionState::Authenticated;
        debug!(?state, user_id = %user.id, "credentials accepted");

        match ctx.store.group_exists(group_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(user_id = %user.id, "rejecting connection to unknown group");
                return Self::reject(RejectReason::UnknownGroup);
            }
            Err(e) => {
                warn!(error = %e, "group lookup failed");
                return Self::reject(RejectReason::StoreUnavailable);
            }
        }

        let connection = make_connection(user);
        let _ = ctx.broker.register(group_id, Arc::clone(&connection));
        info!(conn_id = %connection.id, user_id = %connection.user.id, "subscribed");
        Admission::Subscribed(Self {
            ctx,
            connection,
            state: SessionState::Subscribed,
        })
    }

    fn reject(reason: RejectReason) -> Admission {
        debug!(state = ?SessionState::Rejected, reason = reason.as_str(), "admission refused");
        Admission::Rejected(reason)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The subscribed group.
    pub fn group_id(&self) -> GroupId {
        self.connection.group_id
    }

    /// The authenticated user.
    pub fn user(&self) -> &User {
        &self.connection.user
    }

    /// The outbound handle registered with the broker.
    pub fn connection(&self) -> &Arc<ClientConnection> {
        &self.connection
    }

    /// Process a text frame.
    pub async fn handle_text(&mut self, text: &str) -> Result<FrameOutcome, ChatError> {
        self.handle_decoded(InboundFrame::parse(text)).await
    }

    /// Process a binary frame, which must carry UTF-8 JSON.
    pub async fn handle_binary(&mut self, bytes: &[u8]) -> Result<FrameOutcome, ChatError> {
        self.handle_decoded(InboundFrame::from_bytes(bytes)).await
    }

    async fn handle_decoded(
        &mut self,
        decoded: Result<InboundFrame, ProtocolError>,
    ) -> Result<FrameOutcome, ChatError> {
        match self.state {
            SessionState::Subscribed => self.state = SessionState::Active,
            SessionState::Active => {}
            _ => return Ok(FrameOutcome::Ignored),
        }

        let frame = decoded.inspect_err(|e| {
            counter!(CHAT_PROTOCOL_ERRORS_TOTAL).increment(1);
            warn!(conn_id = %self.connection.id, error = %e, "protocol error");
        })?;
        let Some(body) = frame.body() else {
            counter!(CHAT_BLANK_DROPPED_TOTAL).increment(1);
            debug!(conn_id = %self.connection.id, "blank message dropped");
            return Ok(FrameOutcome::Ignored);
        };

        // Delivery runs detached so a disconnect mid-persist cannot cancel
        // it, but is awaited so the next frame waits for this one.
        let delivery = tokio::spawn(deliver(
            Arc::clone(&self.ctx.store),
            Arc::clone(&self.ctx.broker),
            self.connection.group_id,
            self.connection.user.clone(),
            body.to_string(),
        ));
        let result = match delivery.await {
            Ok(result) => result,
            Err(e) => Err(ChatError::Delivery(e.to_string())),
        };
        if let Err(e) = &result {
            warn!(
                conn_id = %self.connection.id,
                kind = e.kind(),
                error = %e,
                fatal = e.is_fatal(),
                "message not delivered"
            );
        }
        result
    }

    /// Unregister from the broker and enter the terminal state. Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;
        let _ = self
            .ctx
            .broker
            .unregister(self.connection.group_id, &self.connection.id);
        self.state = SessionState::Closed;
        debug!(conn_id = %self.connection.id, "session closed");
    }

    /// Close frame for a fatal error: code plus a short reason.
    pub fn close_frame_for(err: &ChatError) -> (u16, &'static str) {
        let reason = match err {
            ChatError::Protocol(ProtocolError::InvalidUtf8) => "invalid utf-8",
            ChatError::Protocol(ProtocolError::MalformedJson(_)) => "malformed frame",
            ChatError::Persistence(StoreError::GroupNotFound(_)) => "group no longer exists",
            ChatError::Persistence(_) | ChatError::Delivery(_) => "internal error",
        };
        (err.close_code(), reason)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("connection", &self.connection)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Persist, then broadcast. Nothing is broadcast if the persist fails.
async fn deliver(
    store: Arc<dyn MembershipStore>,
    broker: Arc<Broker>,
    group_id: GroupId,
    author: User,
    body: String,
) -> Result<FrameOutcome, ChatError> {
    let started = Instant::now();
    let message = store
        .create_message(group_id, author.id, &body)
        .await
        .inspect_err(|e| {
            let kind = match e {
                StoreError::GroupNotFound(_) => "group_not_found",
                StoreError::UserNotFound(_) => "user_not_found",
                StoreError::Conflict(_) => "conflict",
                StoreError::Unavailable(_) => "unavailable",
                StoreError::Database(_) => "database",
            };
            counter!(CHAT_PERSIST_FAILURES_TOTAL, "error_type" => kind).increment(1);
        })?;
    let json = OutboundFrame::for_message(&message, &author.username)
        .to_json()
        .map_err(|e| ChatError::Delivery(e.to_string()))?;
    let recipients = broker.broadcast(group_id, &Arc::new(json));
    counter!(CHAT_MESSAGES_TOTAL).increment(1);
    histogram!(CHAT_DELIVERY_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    debug!(%group_id, user_id = %author.id, message_id = %message.id, recipients, "message delivered");
    Ok(FrameOutcome::Delivered {
        message_id: message.id,
        recipients,
    })
}
