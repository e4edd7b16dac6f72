//! The per-connection session state machine.
//!
//! One session serves exactly one request over its channel's lifetime:
//! authenticate, dispatch, stream, close. Client disconnect at any point
//! drops the result stream, which aborts every outstanding provider task.

use std::sync::Arc;

use driftnet_core::{Authenticator, PlexClient, TmdbClient};
use driftnet_search::fanout::{self, SearchStream};
use driftnet_search::providers::ProviderRegistry;
use futures::StreamExt;
use serde::Serialize;

use crate::channel::MessageChannel;
use crate::protocol::{
    Envelope, ErrorFrame, MethodCall, PlexParams, ResultFrame, StreamRequest, codes, reasons,
};

/// Everything a session needs from the application.
pub struct SessionContext {
    pub registry: ProviderRegistry,
    pub tmdb: Arc<TmdbClient>,
    pub authenticator: Arc<dyn Authenticator>,
    pub plex: Option<PlexClient>,
}

/// Lifecycle of one session. Terminal state is `Closed`; there is no
/// request pipelining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    AwaitingRequest,
    Streaming,
    Closed,
}

/// Drives one accepted channel to completion.
pub struct StreamSession<C: MessageChannel> {
    channel: C,
    ctx: Arc<SessionContext>,
    state: SessionState,
}

impl<C: MessageChannel> StreamSession<C> {
    /// Wraps a freshly accepted channel.
    pub fn new(channel: C, ctx: Arc<SessionContext>) -> Self {
        Self {
            channel,
            ctx,
            state: SessionState::Connecting,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session until the channel closes.
    pub async fn run(mut self) {
        tracing::info!("session accepted");
        self.state = SessionState::Authenticating;

        let Some(raw) = self.channel.recv_text().await else {
            tracing::debug!("client left before sending a request");
            self.state = SessionState::Closed;
            return;
        };

        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(error) => {
                let frame = ErrorFrame::new(None, codes::INVALID_REQUEST, error.to_string())
                    .with_data(serde_json::json!([error.to_string()]));
                self.fail(frame, reasons::VALIDATION).await;
                return;
            }
        };
        let id = envelope.id;

        let user = match self.ctx.authenticator.authenticate(&envelope.authorization).await {
            Ok(user) => user,
            Err(error) => {
                tracing::warn!(%error, "session authentication failed");
                let frame = ErrorFrame::new(Some(id), codes::UNAUTHORIZED, error.to_string());
                self.fail(frame, reasons::AUTHENTICATION).await;
                return;
            }
        };
        tracing::info!(user = %user.username, "session authenticated");
        self.state = SessionState::AwaitingRequest;

        match envelope.call {
            MethodCall::Ping => {
                self.channel.close(reasons::PONG).await;
                self.state = SessionState::Closed;
            }
            MethodCall::Plex(params) => self.serve_plex(id, params).await,
            MethodCall::Stream(params) => match params.validate() {
                Ok(request) => self.serve_stream(id, request).await,
                Err(errors) => {
                    let frame =
                        ErrorFrame::new(Some(id), codes::INVALID_PARAMS, "invalid stream params")
                            .with_data(serde_json::json!(errors));
                    self.fail(frame, reasons::VALIDATION).await;
                }
            },
        }
    }

    async fn serve_stream(&mut self, id: i64, request: StreamRequest) {
        let mut results = match self.open_stream(&request).await {
            Ok(results) => results,
            Err(error) => {
                tracing::error!(%error, "identity resolution failed");
                let frame = ErrorFrame::new(Some(id), codes::UPSTREAM, error.to_string());
                self.fail(frame, reasons::METADATA).await;
                return;
            }
        };

        self.state = SessionState::Streaming;

        loop {
            tokio::select! {
                item = results.next() => match item {
                    Some(torrent) => {
                        if self.send_json(&torrent).await.is_err() {
                            tracing::info!("client disconnected mid-stream");
                            self.state = SessionState::Closed;
                            return;
                        }
                    }
                    None => break,
                },
                frame = self.channel.recv_text() => {
                    if frame.is_none() {
                        tracing::info!("client disconnected mid-stream");
                        self.state = SessionState::Closed;
                        return;
                    }
                    // One request per session; later frames are ignored.
                }
            }
        }

        drop(results);
        tracing::info!("finished streaming");
        self.channel.close(reasons::FINISHED).await;
        self.state = SessionState::Closed;
    }

    async fn open_stream(
        &mut self,
        request: &StreamRequest,
    ) -> Result<SearchStream, driftnet_core::MetadataError> {
        match *request {
            StreamRequest::Movie { tmdb_id } => {
                let imdb_id = self.ctx.tmdb.movie_imdb_id(tmdb_id).await?;
                Ok(fanout::search_for_movie(
                    self.ctx.registry.movie_providers(),
                    imdb_id,
                    tmdb_id,
                ))
            }
            StreamRequest::Series {
                tmdb_id,
                season,
                episode,
            } => {
                let imdb_id = self.ctx.tmdb.tv_imdb_id(tmdb_id).await?;
                Ok(fanout::search_for_tv(
                    self.ctx.registry.tv_providers(),
                    imdb_id,
                    tmdb_id,
                    season,
                    episode,
                ))
            }
        }
    }

    async fn serve_plex(&mut self, id: i64, params: PlexParams) {
        let Some(plex) = &self.ctx.plex else {
            let frame = ErrorFrame::new(Some(id), codes::UPSTREAM, "no plex server configured");
            self.fail(frame, reasons::PLEX_FAILED).await;
            return;
        };

        match plex.find(params.tmdb_id, params.media_type).await {
            Ok(items) => {
                let _ = self.send_json(&ResultFrame::new(id, items)).await;
                self.channel.close(reasons::PLEX_COMPLETE).await;
            }
            Err(error) => {
                tracing::error!(%error, "plex lookup failed");
                let frame = ErrorFrame::new(Some(id), codes::UPSTREAM, error.to_string());
                self.fail(frame, reasons::PLEX_FAILED).await;
            }
        }
        self.state = SessionState::Closed;
    }

    async fn send_json<T: Serialize>(&mut self, value: &T) -> Result<(), crate::ChannelError> {
        match serde_json::to_string(value) {
            Ok(text) => self.channel.send_text(text).await,
            Err(error) => {
                // Our own frame types always serialize; treat this as internal.
                tracing::error!(%error, "frame serialization failed");
                let frame = ErrorFrame::new(None, codes::INTERNAL, "frame serialization failed");
                if let Ok(text) = serde_json::to_string(&frame) {
                    let _ = self.channel.send_text(text).await;
                }
                Err(crate::ChannelError {
                    reason: error.to_string(),
                })
            }
        }
    }

    /// Emits a terminal error frame and closes with `reason`.
    async fn fail(&mut self, frame: ErrorFrame, reason: &str) {
        if let Ok(text) = serde_json::to_string(&frame) {
            let _ = self.channel.send_text(text).await;
        }
        self.channel.close(reason).await;
        self.state = SessionState::Closed;
    }
}
