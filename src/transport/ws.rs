//! tokio-tungstenite implementation of [`Connector`].

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use super::driver::{ConnEvent, Connection, Connector};
use super::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connects to the dashboard websocket endpoint, passing the token as the
/// `token` query parameter.
#[derive(Clone, Debug)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// `url` is the endpoint without query string, e.g.
    /// `ws://127.0.0.1:8000/ws/connect`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn url_with_token(&self, token: &str) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{sep}token={}", self.url, urlencoding::encode(token))
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&mut self, token: &str) -> Result<WsConnection, TransportError> {
        let url = self.url_with_token(token);
        debug!(url = %self.url, "opening websocket");
        let (stream, _) = connect_async(url).await.map_err(|e| match e {
            WsError::Http(resp) => TransportError::Rejected(resp.status().as_u16()),
            WsError::Url(e) => TransportError::InvalidUrl(e.to_string()),
            other => TransportError::Handshake(Box::new(other)),
        })?;
        Ok(WsConnection { stream })
    }
}

pub struct WsConnection {
    stream: WsStream,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_event(&mut self) -> ConnEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return ConnEvent::Text(text.to_string()),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return ConnEvent::Text(text),
                    Err(_) => debug!("dropping non-utf8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    return ConnEvent::Closed(frame.map(|f| u16::from(f.code)));
                }
                // Protocol-level ping/pong is answered by tungstenite itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return ConnEvent::Closed(None);
                }
                Some(Err(e)) => return ConnEvent::Failed(TransportError::Receive(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
