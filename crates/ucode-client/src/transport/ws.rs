//! `tokio-tungstenite` implementation of [`Connector`].

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use ucode_core::{ClientError, Result};

use super::{Connector, Outbound, TransportEvent, TransportLink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported for a close frame that carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// WebSocket connector.
#[derive(Clone, Debug)]
pub struct WsConnector {
    channel_capacity: usize,
}

impl WsConnector {
    /// Connector with the given per-link channel capacity.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| ClientError::transport(format!("WebSocket connect: {e}")))?;

        let (out_tx, out_rx) = mpsc::channel(self.channel_capacity);
        let (in_tx, in_rx) = mpsc::channel(self.channel_capacity);
        drop(tokio::spawn(pump(ws, out_rx, in_tx)));

        Ok(TransportLink {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

/// Shuttle frames between the socket and the link channels until either
/// side ends, then report the single `Closed` event.
async fn pump(
    ws: WsStream,
    mut out_rx: mpsc::Receiver<Outbound>,
    in_tx: mpsc::Sender<TransportEvent>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let closed = loop {
        tokio::select! {
            cmd = out_rx.recv() => match cmd {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                        let _ = in_tx.send(TransportEvent::Error(e.to_string())).await;
                        break TransportEvent::Closed { code: None, reason: e.to_string() };
                    }
                }
                Some(Outbound::Close(code)) => {
                    let frame = CloseFrame { code: CloseCode::from(code), reason: "".into() };
                    if let Err(e) = ws_tx.send(Message::Close(Some(frame))).await {
                        debug!(error = %e, "close frame not delivered");
                    }
                    break TransportEvent::Closed { code: Some(code), reason: "closed by client".into() };
                }
                None => {
                    // The session dropped the link without closing it.
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return;
                }
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if in_tx.send(TransportEvent::Text(text.as_str().to_owned())).await.is_err() {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    // invalid UTF-8 still surfaces, as replacement characters
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if in_tx.send(TransportEvent::Text(text)).await.is_err() {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    // tungstenite queues the close reply; flush it out
                    let _ = ws_tx.flush().await;
                    let (code, reason) = frame.map_or((NO_STATUS_RECEIVED, String::new()), |f| {
                        (u16::from(f.code), f.reason.as_str().to_owned())
                    });
                    break TransportEvent::Closed { code: Some(code), reason };
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read failed");
                    let _ = in_tx.send(TransportEvent::Error(e.to_string())).await;
                    break TransportEvent::Closed { code: None, reason: e.to_string() };
                }
                None => break TransportEvent::Closed { code: None, reason: "connection ended".into() },
            },
        }
    };

    let _ = in_tx.send(closed).await;
}
