//! Live-update channel.
//!
//! A [`LiveChannel`] is the session's end of a bounded event/command pair.
//! [`WsConnector`] backs it with a WebSocket to `/ws/{client_id}`: a spawned
//! task forwards text frames in and [`ClientCommand`]s out, and reports the
//! close code when the socket ends.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use scribe_jobs::ClientCommand;

use crate::api::parse_base_url;
use crate::error::ClientError;
use crate::observability::ClientLogEvent;

/// Buffered events per channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Close code reported when the peer closes without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Something that happened on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Text frame.
    Message(String),
    /// Channel ended. `code` is `None` when the transport failed without a
    /// close handshake.
    Closed {
        /// WebSocket close code.
        code: Option<u16>,
        /// Close reason or transport error.
        reason: String,
    },
}

/// Session side of a live-update channel.
#[derive(Debug)]
pub struct LiveChannel {
    client_id: String,
    events: mpsc::Receiver<ChannelEvent>,
    commands: mpsc::Sender<ClientCommand>,
    closed: bool,
}

/// Transport side of a [`LiveChannel`].
#[derive(Debug)]
pub struct ChannelPeer {
    events: mpsc::Sender<ChannelEvent>,
    commands: mpsc::Receiver<ClientCommand>,
}

impl LiveChannel {
    /// Connected channel/peer pair with `capacity` buffered events.
    #[must_use]
    pub fn pair(client_id: impl Into<String>, capacity: usize) -> (Self, ChannelPeer) {
        let (event_tx, event_rx) = mpsc::channel(capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                client_id: client_id.into(),
                events: event_rx,
                commands: command_tx,
                closed: false,
            },
            ChannelPeer {
                events: event_tx,
                commands: command_rx,
            },
        )
    }

    /// Channel id this channel was opened for.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Still delivering events.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Next event in arrival order. Exactly one [`ChannelEvent::Closed`] is
    /// yielded; afterwards this returns `None`. A vanished transport counts as
    /// an abnormal close.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }
        let event = self.events.recv().await.unwrap_or_else(|| ChannelEvent::Closed {
            code: None,
            reason: "transport dropped".to_string(),
        });
        if matches!(event, ChannelEvent::Closed { .. }) {
            self.closed = true;
        }
        Some(event)
    }

    /// Send a command to the server.
    ///
    /// # Errors
    /// [`ClientError::Channel`] when the channel is closed.
    pub async fn send(&self, command: ClientCommand) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Channel("channel is closed".to_string()));
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Channel("transport is gone".to_string()))
    }
}

impl ChannelPeer {
    /// Deliver an event. `false` once the session side is gone.
    pub async fn emit(&self, event: ChannelEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Deliver a text frame.
    pub async fn message(&self, raw: impl Into<String>) -> bool {
        self.emit(ChannelEvent::Message(raw.into())).await
    }

    /// Deliver a close with `code`.
    pub async fn close(&self, code: Option<u16>) -> bool {
        self.emit(ChannelEvent::Closed {
            code,
            reason: String::new(),
        })
        .await
    }

    /// Next command sent by the session; `None` once it dropped the channel.
    pub async fn next_command(&mut self) -> Option<ClientCommand> {
        self.commands.recv().await
    }
}

/// Opens live-update channels.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Open the channel for `client_id`.
    async fn connect(&self, client_id: &str) -> Result<LiveChannel, ClientError>;
}

/// WebSocket [`ChannelConnector`].
#[derive(Debug, Clone)]
pub struct WsConnector {
    base: Url,
    capacity: usize,
}

impl WsConnector {
    /// Connector for the service at HTTP(S) `base_url`.
    ///
    /// # Errors
    /// [`ClientError::InvalidUrl`] when `base_url` is not a usable HTTP URL.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = parse_base_url(base_url)?;
        let mut base = http.clone();
        let scheme = if http.scheme() == "https" { "wss" } else { "ws" };
        base.set_scheme(scheme)
            .map_err(|()| ClientError::InvalidUrl(http.to_string()))?;
        Ok(Self {
            base,
            capacity: DEFAULT_CHANNEL_CAPACITY,
        })
    }

    /// Override the event buffer size.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// `ws(s)://host/<base path>/ws/{client_id}`.
    ///
    /// # Errors
    /// [`ClientError::InvalidUrl`] when the base cannot take path segments.
    pub fn channel_url(&self, client_id: &str) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["ws", client_id]);
        Ok(url)
    }
}

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(&self, client_id: &str) -> Result<LiveChannel, ClientError> {
        let url = self.channel_url(client_id)?;
        let (stream, _) = connect_async(url.as_str()).await?;
        tracing::info!(
            event = ClientLogEvent::ChannelOpened.as_str(),
            client_id,
            url = %url,
            "live channel connected"
        );
        let (channel, peer) = LiveChannel::pair(client_id, self.capacity);
        tokio::spawn(bridge_socket(stream, peer));
        Ok(channel)
    }
}

async fn bridge_socket(stream: WebSocketStream<MaybeTlsStream<TcpStream>>, peer: ChannelPeer) {
    let (mut sink, mut source) = stream.split();
    let ChannelPeer {
        events,
        mut commands,
    } = peer;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    let _ = sink.close().await;
                    return;
                };
                if let Err(error) = sink.send(Message::Text(command.to_frame().into())).await {
                    tracing::warn!(
                        event = ClientLogEvent::ChannelSendFailed.as_str(),
                        error = %error,
                        "failed to send channel command"
                    );
                    let _ = events
                        .send(ChannelEvent::Closed {
                            code: None,
                            reason: error.to_string(),
                        })
                        .await;
                    return;
                }
            }
            frame = source.next() => {
                let event = match frame {
                    Some(Ok(Message::Text(text))) => ChannelEvent::Message(text.as_str().to_string()),
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame.map_or(
                            (NO_STATUS_RECEIVED, String::new()),
                            |frame| (u16::from(frame.code), frame.reason.as_str().to_string()),
                        );
                        ChannelEvent::Closed {
                            code: Some(code),
                            reason,
                        }
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => ChannelEvent::Closed {
                        code: None,
                        reason: error.to_string(),
                    },
                    None => ChannelEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    },
                };
                let closed = matches!(event, ChannelEvent::Closed { .. });
                if closed {
                    tracing::debug!(
                        event = ClientLogEvent::ChannelClosed.as_str(),
                        close = ?event,
                        "live channel transport finished"
                    );
                }
                if events.send(event).await.is_err() || closed {
                    return;
                }
            }
        }
    }
}
