use crate::error::{ClientError, Result};
use crate::types::{InboundEvent, OutboundFrame};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// A text-frame duplex connection to the chat endpoint.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next text frame; `None` once the peer has closed the connection.
    async fn next_text(&mut self) -> Option<Result<String>>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

/// Owns the single chat connection. Nothing outside this type touches the
/// transport; callers only see parsed events and the connection state.
pub struct SocketSession {
    url: String,
    connector: Box<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    state: ConnectionState,
}

impl SocketSession {
    pub fn new(url: impl Into<String>, connector: Box<dyn Connector>) -> Self {
        Self {
            url: url.into(),
            connector,
            transport: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub async fn connect(&mut self) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = ?self.state, "connect ignored, session not idle");
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        tracing::info!(url = %self.url, "socket: connecting");
        match self.connector.connect(&self.url).await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.state = ConnectionState::Connected;
                tracing::info!("socket: connected");
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Error;
                tracing::warn!(error = %err, "socket: connect failed");
                self.state = ConnectionState::Disconnected;
                Err(err)
            }
        }
    }

    /// Pulls the next event off the socket. Yields `None` when the session is
    /// not connected or the peer closed the connection.
    pub async fn receive(&mut self) -> Option<Result<InboundEvent>> {
        if self.state != ConnectionState::Connected {
            return None;
        }
        let transport = self.transport.as_mut()?;
        match transport.next_text().await {
            Some(Ok(text)) => Some(parse_frame(&text)),
            Some(Err(err)) => {
                self.state = ConnectionState::Error;
                tracing::warn!(error = %err, "socket: transport error");
                self.release().await;
                Some(Err(err))
            }
            None => {
                tracing::info!("socket: closed by peer");
                self.release().await;
                None
            }
        }
    }

    pub async fn send(&mut self, message: &str) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;
        let frame = serde_json::to_string(&OutboundFrame {
            message: message.to_string(),
        })
        .map_err(|source| ClientError::Parse {
            what: "outbound frame",
            source,
        })?;
        transport.send_text(frame).await
    }

    pub async fn disconnect(&mut self) {
        self.release().await;
    }

    async fn release(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(err) = transport.close().await {
                tracing::debug!(error = %err, "socket: close after shutdown");
            }
        }
        self.state = ConnectionState::Disconnected;
    }
}

pub fn parse_frame(text: &str) -> Result<InboundEvent> {
    let event: InboundEvent =
        serde_json::from_str(text).map_err(|source| ClientError::Parse {
            what: "socket frame",
            source,
        })?;
    if event == InboundEvent::Unknown {
        tracing::debug!(frame = text, "socket: unrecognised frame type");
    }
    Ok(event)
}


#[cfg(test)]
mod tests {
    use super::testing::FakeConnector;
    use super::*;

    fn session(connector: FakeConnector) -> SocketSession {
        SocketSession::new("ws://test/ws/chat", Box::new(connector))
    }

    #[tokio::test]
    async fn connect_then_receive_parsed_events() {
        let connector = FakeConnector::with_frames(vec![
            Ok(r#"{"type":"typing"}"#.to_string()),
            Ok(r#"{"type":"stream","content":"Hi"}"#.to_string()),
        ]);
        let mut s = session(connector);
        assert_eq!(s.state(), ConnectionState::Disconnected);
        s.connect().await.unwrap();
        assert!(s.is_connected());

        assert_eq!(s.receive().await.unwrap().unwrap(), InboundEvent::Typing);
        assert_eq!(
            s.receive().await.unwrap().unwrap(),
            InboundEvent::Stream {
                content: Some("Hi".to_string()),
                full_content: None
            }
        );
        // Peer closed after the scripted frames.
        assert!(s.receive().await.is_none());
        assert_eq!(s.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn failed_connect_returns_to_disconnected() {
        let mut s = session(FakeConnector::refusing());
        let err = s.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert!(s.receive().await.is_none());
    }

    #[tokio::test]
    async fn transport_error_releases_connection() {
        let connector = FakeConnector::with_frames(vec![Err(ClientError::Transport(
            "reset".to_string(),
        ))]);
        let wire = connector.wire.clone();
        let mut s = session(connector);
        s.connect().await.unwrap();
        let result = s.receive().await.unwrap();
        assert!(result.is_err());
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert!(wire.lock().unwrap().closed);
    }

    #[tokio::test]
    async fn malformed_frame_is_a_parse_error_but_keeps_connection() {
        let connector = FakeConnector::with_frames(vec![
            Ok("not json".to_string()),
            Ok(r#"{"type":"complete"}"#.to_string()),
        ]);
        let mut s = session(connector);
        s.connect().await.unwrap();
        let err = s.receive().await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Parse { .. }));
        assert!(s.is_connected());
        assert_eq!(
            s.receive().await.unwrap().unwrap(),
            InboundEvent::Complete {
                full_response: None
            }
        );
    }

    #[tokio::test]
    async fn send_writes_message_frame() {
        let connector = FakeConnector::with_frames(vec![]);
        let wire = connector.wire.clone();
        let mut s = session(connector);

        assert!(matches!(s.send("early").await, Err(ClientError::NotConnected)));

        s.connect().await.unwrap();
        s.send("hello").await.unwrap();
        assert_eq!(wire.lock().unwrap().sent, vec![r#"{"message":"hello"}"#]);
    }

    #[tokio::test]
    async fn disconnect_always_closes_transport() {
        let connector = FakeConnector::with_frames(vec![]);
        let wire = connector.wire.clone();
        let mut s = session(connector);
        s.connect().await.unwrap();
        s.disconnect().await;
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert!(wire.lock().unwrap().closed);
        // Idempotent from any state.
        s.disconnect().await;
        assert_eq!(s.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn parse_frame_handles_every_kind() {
        assert_eq!(
            parse_frame(r#"{"type":"stream","full_content":"abc","content":null}"#).unwrap(),
            InboundEvent::Stream {
                content: None,
                full_content: Some("abc".to_string())
            }
        );
        assert_eq!(
            parse_frame(r#"{"type":"complete","full_response":"done"}"#).unwrap(),
            InboundEvent::Complete {
                full_response: Some("done".to_string())
            }
        );
        assert_eq!(
            parse_frame(r#"{"type":"error","message":"boom"}"#).unwrap(),
            InboundEvent::Error {
                message: Some("boom".to_string())
            }
        );
        assert_eq!(
            parse_frame(r#"{"type":"error","message":null}"#).unwrap(),
            InboundEvent::Error { message: None }
        );
        assert_eq!(
            parse_frame(r#"{"type":"error"}"#).unwrap(),
            InboundEvent::Error { message: None }
        );
        assert_eq!(
            parse_frame(r#"{"type":"heartbeat","seq":4}"#).unwrap(),
            InboundEvent::Unknown
        );
        assert!(parse_frame(r#"{"content":"no type"}"#).is_err());
    }
}
