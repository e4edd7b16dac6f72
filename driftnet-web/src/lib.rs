//! Driftnet Web - Streaming delivery over a duplex message channel
//!
//! Accepts one search request per WebSocket session, authenticates it,
//! drives the fan-out aggregator, and pushes each result frame to the
//! client as it arrives.

pub mod channel;
pub mod protocol;
pub mod server;
pub mod session;

pub use channel::{ChannelError, MessageChannel, WsChannel};
pub use server::{AppState, build_context, router, run_server};
pub use session::{SessionContext, SessionState, StreamSession};
