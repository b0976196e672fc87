use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::packet::{EnginePacket, OpenInfo, PacketKind, SocketPacket};
use crate::connections::connection::{Connection, Connector, SessionIdentity, SocketEvent};
use crate::connections::errors::ConnectionError;
use crate::storage::config::redact;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the close handshake so teardown never hangs on a dead peer.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Used until the server's OPEN packet tells us its real ping settings.
const HANDSHAKE_LIVENESS: Duration = Duration::from_secs(45);

static CRYPTO_PROVIDER: Once = Once::new();

fn ensure_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        // Err only means another provider was installed first, which is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Builds the WebSocket handshake URL for a Socket.IO server.
///
/// `https://host` becomes `wss://host<path>/?EIO=4&transport=websocket&token=...`.
/// The token is form-encoded into the query so backends that only read the
/// query string can still authenticate.
pub fn handshake_url(identity: &SessionIdentity) -> Result<Url, ConnectionError> {
    let mut url = Url::parse(&identity.base_endpoint)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ConnectionError::InvalidEndpoint(format!(
                "unsupported scheme '{other}' in {}",
                identity.base_endpoint
            )))
        }
    };
    url.set_scheme(scheme).map_err(|_| {
        ConnectionError::InvalidEndpoint(format!("cannot use scheme {scheme}"))
    })?;

    let mut path = identity.path.trim_end_matches('/').to_string();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    path.push('/');
    url.set_path(&path);

    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket")
        .append_pair("token", &identity.token);
    Ok(url)
}

/// Socket.IO namespace named by the path of the base endpoint, `/` when it
/// has none. `https://host/tenant` connects to namespace `/tenant`.
pub fn namespace_of(identity: &SessionIdentity) -> Result<String, ConnectionError> {
    let url = Url::parse(&identity.base_endpoint)?;
    let path = url.path().trim_end_matches('/');
    Ok(if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    })
}

/// Silence budget announced by the server: one ping interval plus the time
/// it grants for the pong. Saturates on absurd values instead of overflowing.
fn liveness_for(open: &OpenInfo) -> Duration {
    Duration::from_millis(open.ping_interval.saturating_add(open.ping_timeout))
}

/// Socket.IO client over a single WebSocket, no polling fallback.
pub struct SocketIoConnection {
    identity: SessionIdentity,
    ws: Option<WsStream>,
    namespace: String,
    /// Silence longer than this means the server is gone.
    liveness: Duration,
}

impl SocketIoConnection {
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            identity,
            ws: None,
            namespace: "/".to_string(),
            liveness: HANDSHAKE_LIVENESS,
        }
    }

    fn stream(&mut self) -> Result<&mut WsStream, ConnectionError> {
        self.ws
            .as_mut()
            .ok_or_else(|| ConnectionError::Other("Not connected".into()))
    }

    async fn send(&mut self, packet: EnginePacket) -> Result<(), ConnectionError> {
        let text = packet.encode();
        debug!("socket.io send: {}", text);
        self.stream()?.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Reads the next Engine.IO packet. `None` means the peer closed the
    /// WebSocket.
    async fn recv_packet(&mut self) -> Result<Option<EnginePacket>, ConnectionError> {
        let liveness = self.liveness;
        loop {
            let frame = timeout(liveness, self.stream()?.next())
                .await
                .map_err(|_| ConnectionError::Timeout("ping timeout".into()))?;
            match frame {
                None => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::Text(text))) => {
                    debug!("socket.io recv: {}", text.as_str());
                    return EnginePacket::decode(text.as_str()).map(Some);
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("WebSocket close frame: {:?}", frame);
                    return Ok(None);
                }
                // tungstenite answers WebSocket pings itself.
                Some(Ok(_)) => continue,
            }
        }
    }
}

#[async_trait]
impl Connection for SocketIoConnection {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let url = handshake_url(&self.identity)?;
        self.namespace = namespace_of(&self.identity)?;
        if url.scheme() == "wss" {
            ensure_crypto_provider();
        }
        info!(
            "Connecting to {}{} (token {})",
            self.identity.base_endpoint,
            self.identity.path,
            redact(&self.identity.token)
        );

        let (ws, _response) = connect_async(url.as_str()).await?;
        self.ws = Some(ws);

        let open = match self.recv_packet().await? {
            Some(EnginePacket::Open(info)) => info,
            Some(other) => {
                return Err(ConnectionError::Protocol(format!(
                    "expected OPEN, got {other:?}"
                )))
            }
            None => return Err(ConnectionError::Closed),
        };
        self.liveness = liveness_for(&open);
        debug!("Engine.IO session {} opened", open.sid);

        let connect = SocketPacket::connect(json!({ "token": self.identity.token }))
            .in_namespace(&self.namespace);
        self.send(EnginePacket::Message(connect)).await?;

        loop {
            match self.recv_packet().await? {
                Some(EnginePacket::Message(p)) if p.namespace != self.namespace => {
                    debug!("Ignoring packet for namespace {} during handshake", p.namespace)
                }
                Some(EnginePacket::Message(p)) if p.kind == PacketKind::Connect => {
                    info!("Socket.IO namespace {} connected", p.namespace);
                    return Ok(());
                }
                Some(EnginePacket::Message(p)) if p.kind == PacketKind::ConnectError => {
                    return Err(ConnectionError::Rejected(p.error_message()));
                }
                Some(EnginePacket::Ping) => self.send(EnginePacket::Pong).await?,
                Some(EnginePacket::Close) | None => return Err(ConnectionError::Closed),
                Some(other) => debug!("Ignoring {:?} during handshake", other),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        let Some(mut ws) = self.ws.take() else {
            return Ok(());
        };
        let goodbye =
            EnginePacket::Message(SocketPacket::disconnect().in_namespace(&self.namespace))
                .encode();
        let close = async {
            ws.send(Message::Text(goodbye.into())).await?;
            ws.close(None).await
        };
        match timeout(CLOSE_TIMEOUT, close).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                debug!("Close handshake failed: {}", e);
                Ok(())
            }
            Err(_) => {
                warn!("Close handshake timed out; dropping the socket");
                Ok(())
            }
        }
    }

    async fn next_event(&mut self) -> Result<SocketEvent, ConnectionError> {
        loop {
            let packet = match self.recv_packet().await? {
                Some(p) => p,
                None => return Ok(SocketEvent::Disconnected("transport close".into())),
            };
            match packet {
                EnginePacket::Ping => self.send(EnginePacket::Pong).await?,
                EnginePacket::Close => {
                    return Ok(SocketEvent::Disconnected("transport close".into()))
                }
                EnginePacket::Message(p) if p.namespace != self.namespace => {
                    debug!("Ignoring packet for namespace {}", p.namespace)
                }
                EnginePacket::Message(p) => match p.kind {
                    PacketKind::Event => match p.event_parts() {
                        Some((name, payload)) => return Ok(SocketEvent::Event { name, payload }),
                        None => debug!("Malformed event packet: {:?}", p.data),
                    },
                    PacketKind::Disconnect => {
                        return Ok(SocketEvent::Disconnected("io server disconnect".into()))
                    }
                    other => debug!("Ignoring {:?} packet", other),
                },
                other => debug!("Ignoring {:?}", other),
            }
        }
    }
}

/// Default [`Connector`]: a fresh [`SocketIoConnection`] per attempt.
#[derive(Debug, Default, Clone)]
pub struct SocketIoConnector;

impl Connector for SocketIoConnector {
    fn create(&self, identity: &SessionIdentity) -> Box<dyn Connection> {
        Box::new(SocketIoConnection::new(identity.clone()))
    }
}
