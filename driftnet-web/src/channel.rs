//! Duplex message-channel abstraction over the transport.
//!
//! The session state machine only needs text frames in, text frames out,
//! and a close with a reason. Production traffic runs over the axum
//! WebSocket adapter; tests drive sessions through an in-memory pair.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use thiserror::Error;

/// The peer is gone; nothing further can be delivered.
#[derive(Debug, Error)]
#[error("channel closed: {reason}")]
pub struct ChannelError {
    /// What ended the channel
    pub reason: String,
}

/// One bidirectional message channel, exactly one client session.
#[async_trait]
pub trait MessageChannel: Send {
    /// Next inbound text frame; `None` once the peer disconnected.
    async fn recv_text(&mut self) -> Option<String>;

    /// Delivers one outbound text frame.
    ///
    /// # Errors
    /// - `ChannelError` - Peer disconnected
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    /// Closes the channel, handing `reason` to the peer. Best effort.
    async fn close(&mut self, reason: &str);
}

/// Axum WebSocket adapter.
pub struct WsChannel {
    socket: WebSocket,
}

impl WsChannel {
    /// Wraps an accepted socket.
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl MessageChannel for WsChannel {
    async fn recv_text(&mut self) -> Option<String> {
        while let Some(message) = self.socket.recv().await {
            match message {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Close(_)) => return None,
                // Ping/pong is handled by axum; binary frames are not part
                // of the protocol.
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
        None
    }

    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError {
                reason: e.to_string(),
            })
    }

    async fn close(&mut self, reason: &str) {
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: reason.to_string().into(),
        };
        if let Err(error) = self.socket.send(Message::Close(Some(frame))).await {
            tracing::debug!(%error, "close frame not delivered");
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    //! In-memory channel pair for driving sessions in tests.

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::{ChannelError, MessageChannel};

    /// What the fake client observed from the server side.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        /// A text frame
        Frame(String),
        /// Channel closed with a reason
        Closed(String),
    }

    /// Server half of an in-memory channel.
    pub struct TestChannel {
        incoming: mpsc::UnboundedReceiver<String>,
        outgoing: mpsc::UnboundedSender<Event>,
    }

    /// Client half of an in-memory channel.
    pub struct TestRemote {
        to_server: mpsc::UnboundedSender<String>,
        from_server: mpsc::UnboundedReceiver<Event>,
    }

    /// Creates a connected (server, client) pair.
    pub fn pair() -> (TestChannel, TestRemote) {
        let (to_server, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_server) = mpsc::unbounded_channel();
        (
            TestChannel { incoming, outgoing },
            TestRemote {
                to_server,
                from_server,
            },
        )
    }

    impl TestRemote {
        /// Sends a text frame to the session.
        pub fn send(&self, text: impl Into<String>) {
            let _ = self.to_server.send(text.into());
        }

        /// Next observed event, or `None` once the session is gone.
        pub async fn next_event(&mut self) -> Option<Event> {
            self.from_server.recv().await
        }

        /// Simulates a client disconnect.
        pub fn disconnect(self) {
            drop(self);
        }
    }

    #[async_trait]
    impl MessageChannel for TestChannel {
        async fn recv_text(&mut self) -> Option<String> {
            self.incoming.recv().await
        }

        async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
            self.outgoing
                .send(Event::Frame(text))
                .map_err(|_| ChannelError {
                    reason: "client disconnected".to_string(),
                })
        }

        async fn close(&mut self, reason: &str) {
            let _ = self.outgoing.send(Event::Closed(reason.to_string()));
        }
    }
}
