//! One connection's protocol state machine.
//!
//! ```text
//! Connecting → Authenticating → Active → Closing → Closed
//!                    │                      ▲
//!                    └── handshake failure ─┘
//! ```
//!
//! The socket is split: this module's reader loop consumes inbound frames, and a writer
//! task owns the sink and drains an `mpsc` queue. Everything written to the client, its
//! own replies and messages fanned out from other connections alike, goes through that
//! queue, so a connection's outbound frames are serialized in one place.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message};
use banter_api::sessions::SessionError;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frames::{parse_handshake, ClientFrame, SendChatMessage, ServerFrame};
use crate::registry::{ConnectionHandle, ConnectionId};
use crate::GatewayState;

/// Items on a connection's outbound queue.
#[derive(Debug)]
pub enum Outbound {
    Frame(ServerFrame),
    /// Stop the writer, sending a close frame first if there is one
    Close(Option<CloseFrame>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    Active,
    Closing,
    Closed,
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Handshake named a session that does not exist
    SessionNotFound,
    /// Handshake frame was not a session id
    MalformedHandshake,
    HandshakeTimeout,
    /// The session store failed while resolving the handshake
    StoreUnavailable,
    /// Client sent `LOG_OUT`
    LoggedOut,
    /// The session was logged out elsewhere while this connection was active
    SessionRevoked,
    PeerClosed,
    TransportError,
}

impl CloseReason {
    /// The close frame to send, or `None` when the peer is already gone.
    pub fn close_frame(self) -> Option<CloseFrame> {
        let (code, reason) = match self {
            Self::SessionNotFound => (close_code::POLICY, "session not found"),
            Self::MalformedHandshake => (close_code::POLICY, "malformed handshake"),
            Self::HandshakeTimeout => (close_code::POLICY, "handshake timeout"),
            Self::StoreUnavailable => (close_code::ERROR, "session store unavailable"),
            Self::LoggedOut => (close_code::NORMAL, "logged out"),
            Self::SessionRevoked => (close_code::POLICY, "session revoked"),
            Self::PeerClosed | Self::TransportError => return None,
        };
        Some(CloseFrame {
            code,
            reason: reason.into(),
        })
    }
}

/// An authenticated connection.
struct Active {
    session_id: Uuid,
    account_id: Uuid,
}

struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    gateway: Arc<GatewayState>,
    outbound: mpsc::Sender<Outbound>,
}

/// Drive one connection from handshake to close.
///
/// Generic over the transport so the state machine runs the same against an axum
/// websocket and an in-memory pair.
pub async fn run<R, W>(mut inbound: R, sink: W, gateway: Arc<GatewayState>) -> CloseReason
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: std::fmt::Display,
{
    let (tx, rx) = mpsc::channel(gateway.config.outbound_buffer.max(1));
    let mut conn = Connection {
        id: gateway.registry.next_id(),
        state: ConnectionState::Connecting,
        gateway,
        outbound: tx,
    };
    let writer = tokio::spawn(write_loop(conn.id, sink, rx));

    conn.transition(ConnectionState::Authenticating);
    let reason = match conn.authenticate(&mut inbound).await {
        Ok(active) => {
            conn.transition(ConnectionState::Active);
            let reason = conn.serve(&mut inbound, &active).await;
            conn.transition(ConnectionState::Closing);
            conn.teardown(&active).await;
            reason
        }
        Err(reason) => {
            conn.transition(ConnectionState::Closing);
            reason
        }
    };

    conn.close(writer, reason).await;
    reason
}

impl Connection {
    fn transition(&mut self, next: ConnectionState) {
        tracing::debug!(conn = %self.id, from = ?self.state, to = ?next, "Connection state");
        self.state = next;
    }

    /// Queue a frame for this connection's own client.
    async fn reply(&self, frame: ServerFrame) {
        if self.outbound.send(Outbound::Frame(frame)).await.is_err() {
            tracing::debug!(conn = %self.id, "Writer gone, reply dropped");
        }
    }

    async fn authenticate<R>(&self, inbound: &mut R) -> Result<Active, CloseReason>
    where
        R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let timeout = self.gateway.config.handshake_timeout();
        let session_id = tokio::time::timeout(timeout, read_handshake(inbound))
            .await
            .unwrap_or(Err(CloseReason::HandshakeTimeout))?;

        let session = match self.gateway.sessions.fetch_one(session_id).await {
            Ok(session) => session,
            Err(SessionError::Store(e)) => {
                tracing::error!(conn = %self.id, session = %session_id, "Handshake lookup failed: {e}");
                return Err(CloseReason::StoreUnavailable);
            }
            Err(_) => {
                tracing::info!(conn = %self.id, session = %session_id, "Handshake for unknown session");
                return Err(CloseReason::SessionNotFound);
            }
        };

        // ACCEPTED must be queued ahead of anything fanned out once we are registered
        self.reply(ServerFrame::Accepted {}).await;
        self.gateway
            .registry
            .register(
                session.account_id,
                ConnectionHandle::new(self.id, session.session_id, self.outbound.clone()),
            )
            .await;

        tracing::info!(
            conn = %self.id,
            session = %session.session_id,
            account = %session.account_id,
            "Gateway connection accepted"
        );

        Ok(Active {
            session_id: session.session_id,
            account_id: session.account_id,
        })
    }

    async fn serve<R>(&self, inbound: &mut R, active: &Active) -> CloseReason
    where
        R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        loop {
            let message = match inbound.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::debug!(conn = %self.id, "Transport error: {e}");
                    return CloseReason::TransportError;
                }
                None => return CloseReason::PeerClosed,
            };

            match message {
                Message::Text(text) => match ClientFrame::decode(text.as_str()) {
                    Ok(ClientFrame::SendChatMessage(msg)) => {
                        if let Err(reason) = self.send_chat(active, msg).await {
                            return reason;
                        }
                    }
                    Ok(ClientFrame::MarkAsRead) => {
                        tracing::debug!(conn = %self.id, "MARK_AS_READ ignored");
                    }
                    Ok(ClientFrame::LogOut) => return CloseReason::LoggedOut,
                    Err(e) => {
                        tracing::debug!(conn = %self.id, "Rejected frame: {e}");
                        self.reply(ServerFrame::Rejected {
                            reason: e.to_string(),
                        })
                        .await;
                    }
                },
                Message::Binary(_) => {
                    self.reply(ServerFrame::Rejected {
                        reason: "binary frames are not supported".into(),
                    })
                    .await;
                }
                Message::Close(_) => return CloseReason::PeerClosed,
                // Pings are answered by the transport
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }

    /// Whether `session_id` still exists. A store outage is not a revocation.
    async fn session_live(&self, session_id: Uuid) -> bool {
        match self.gateway.sessions.fetch_one(session_id).await {
            Ok(_) => true,
            Err(SessionError::Store(e)) => {
                tracing::warn!(conn = %self.id, session = %session_id, "Session check failed: {e}");
                true
            }
            Err(_) => false,
        }
    }

    /// Fan a chat message out to every live connection of the target account.
    ///
    /// Fails with [`CloseReason::SessionRevoked`] when the sender's own session is gone.
    /// Recipients whose session is gone are dropped from the registry and closed.
    async fn send_chat(&self, active: &Active, msg: SendChatMessage) -> Result<(), CloseReason> {
        if !self.session_live(active.session_id).await {
            tracing::info!(conn = %self.id, session = %active.session_id, "Sender session revoked");
            return Err(CloseReason::SessionRevoked);
        }

        let timeout = self.gateway.config.send_timeout();
        let mut checked: HashMap<Uuid, bool> = HashMap::new();
        let mut recipients = Vec::new();
        for handle in self.gateway.registry.list_recipients(msg.target_account_id).await {
            let live = match checked.get(&handle.session_id).copied() {
                Some(live) => live,
                None => {
                    let live = self.session_live(handle.session_id).await;
                    checked.insert(handle.session_id, live);
                    live
                }
            };
            if live {
                recipients.push(handle);
                continue;
            }

            tracing::info!(
                conn = %self.id,
                recipient = %handle.id,
                session = %handle.session_id,
                "Dropping connection with revoked session"
            );
            self.gateway
                .registry
                .unregister(msg.target_account_id, handle.id)
                .await;
            let _ = handle
                .close(CloseReason::SessionRevoked.close_frame(), timeout)
                .await;
        }

        if recipients.is_empty() {
            tracing::debug!(
                conn = %self.id,
                target = %msg.target_account_id,
                "Recipient offline, message dropped"
            );
            self.reply(ServerFrame::RecipientOffline {
                target_account_id: msg.target_account_id,
            })
            .await;
            return Ok(());
        }

        let frame = ServerFrame::SendChatMessage {
            message_content: msg.message_content,
            sender_account_id: active.account_id,
        };
        for handle in recipients {
            if let Err(e) = handle.deliver(frame.clone(), timeout).await {
                tracing::warn!(
                    conn = %self.id,
                    recipient = %handle.id,
                    target = %msg.target_account_id,
                    "Delivery failed: {e}"
                );
            }
        }
        Ok(())
    }

    /// Unregister, revoke the session, then close any other connection bound to it.
    /// Failures are logged and swallowed.
    async fn teardown(&self, active: &Active) {
        self.gateway
            .registry
            .unregister(active.account_id, self.id)
            .await;

        match self.gateway.sessions.logout(active.session_id).await {
            Ok(_) => {}
            Err(SessionError::Store(e)) => {
                tracing::error!(conn = %self.id, session = %active.session_id, "Logout on close failed: {e}");
            }
            Err(e) => {
                tracing::warn!(conn = %self.id, session = %active.session_id, "Logout on close: {e}");
            }
        }

        let timeout = self.gateway.config.send_timeout();
        for twin in self
            .gateway
            .registry
            .unregister_session(active.session_id, self.id)
            .await
        {
            tracing::info!(conn = %self.id, twin = %twin.id, "Closing connection sharing the session");
            let _ = twin
                .close(CloseReason::SessionRevoked.close_frame(), timeout)
                .await;
        }
    }

    /// Hand the writer its last instruction and wait for it to finish.
    async fn close(&mut self, writer: tokio::task::JoinHandle<()>, reason: CloseReason) {
        let timeout = self.gateway.config.send_timeout();
        // Other connections may still hold a clone of our sender, so the writer is
        // stopped explicitly rather than by dropping the channel.
        let _ = self
            .outbound
            .send_timeout(Outbound::Close(reason.close_frame()), timeout)
            .await;

        let abort = writer.abort_handle();
        if tokio::time::timeout(timeout, writer).await.is_err() {
            abort.abort();
        }

        self.transition(ConnectionState::Closed);
        tracing::info!(conn = %self.id, ?reason, "Gateway connection closed");
    }
}

/// Read frames until the handshake arrives. Transport control frames are skipped.
async fn read_handshake<R>(inbound: &mut R) -> Result<Uuid, CloseReason>
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        match inbound.next().await {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Text(text))) => {
                return parse_handshake(text.as_str()).ok_or(CloseReason::MalformedHandshake);
            }
            Some(Ok(Message::Binary(_))) => return Err(CloseReason::MalformedHandshake),
            Some(Ok(Message::Close(_))) | None => return Err(CloseReason::PeerClosed),
            Some(Err(_)) => return Err(CloseReason::TransportError),
        }
    }
}

async fn write_loop<W>(id: ConnectionId, mut sink: W, mut rx: mpsc::Receiver<Outbound>)
where
    W: Sink<Message> + Unpin,
    W::Error: std::fmt::Display,
{
    while let Some(item) = rx.recv().await {
        let message = match item {
            Outbound::Frame(frame) => match frame.encode() {
                Ok(text) => Message::Text(text.into()),
                Err(e) => {
                    tracing::error!(conn = %id, "Failed to encode frame: {e}");
                    continue;
                }
            },
            Outbound::Close(frame) => {
                if let Some(frame) = frame {
                    let _ = sink.send(Message::Close(Some(frame))).await;
                }
                let _ = sink.close().await;
                return;
            }
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!(conn = %id, "Write failed: {e}");
            return;
        }
    }
}
