//! QUIC transport for the client.
//!
//! Provides [`QuicTransport`] which handles QUIC I/O for frame transport.
//! This is a thin layer that just sends/receives frames; protocol logic
//! remains in the Sans-IO [`crate::Client`].
//!
//! The credential is presented as a `handshake` frame on the first stream
//! after the connection is established. Every later frame travels on its own
//! stream: client frames on bidirectional streams, server frames on
//! unidirectional ones.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use bytes::BytesMut;
use quinn::{ClientConfig, Endpoint, RecvStream, SendStream};
use streamline_core::Token;
use streamline_proto::{Frame, FrameHeader, Handshake, OutboundEvent};
use tokio::sync::mpsc;

use crate::{
    error::TransportError,
    runtime::{Transport, TransportEvent},
};

/// ALPN protocol identifier; must match the server.
const ALPN: &[u8] = b"streamline";

/// Idle timeout before QUIC declares the connection dead.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered inbound events per connection.
const EVENT_CAPACITY: usize = 256;

/// Close reason reported when the server closes the connection without one.
const SERVER_CLOSE_REASON: &str = "io server disconnect";

/// Close reason reported after a local `close()`.
const CLIENT_CLOSE_REASON: &str = "io client disconnect";

/// Live QUIC connection plus the task that pumps server streams into `events`.
struct Session {
    connection: quinn::Connection,
    events: mpsc::Receiver<TransportEvent>,
    reader: tokio::task::AbortHandle,
}

/// QUIC implementation of [`Transport`].
pub struct QuicTransport {
    server_addr: String,
    server_name: String,
    session: Option<Session>,
}

impl QuicTransport {
    /// Transport for `server_addr` (`host:port`), verifying nothing.
    ///
    /// WARNING: Development only. Certificates are not verified.
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self { server_addr: server_addr.into(), server_name: "localhost".to_owned(), session: None }
    }

    /// Override the TLS server name (SNI).
    #[must_use]
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }

    async fn connect(&self) -> Result<quinn::Connection, TransportError> {
        let addr: SocketAddr = self
            .server_addr
            .parse()
            .map_err(|e| TransportError::Connection(format!("invalid address: {e}")))?;

        let mut endpoint = Endpoint::client(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
            .map_err(|e| TransportError::Connection(format!("endpoint creation failed: {e}")))?;
        endpoint.set_default_client_config(insecure_client_config()?);

        endpoint
            .connect(addr, &self.server_name)
            .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?
            .await
            .map_err(|e| TransportError::Connection(format!("connection failed: {e}")))
    }
}

impl Transport for QuicTransport {
    async fn open(&mut self, credential: &Token) -> Result<(), TransportError> {
        self.close();

        let connection = self.connect().await?;

        let handshake = OutboundEvent::Handshake(Handshake { token: credential.expose().to_owned() })
            .into_frame()
            .map_err(|e| TransportError::Protocol(format!("encode failed: {e}")))?;
        let (send, _recv) = connection
            .open_bi()
            .await
            .map_err(|e| TransportError::Stream(format!("open stream failed: {e}")))?;
        send_frame(send, &handshake).await?;

        let (tx, events) = mpsc::channel(EVENT_CAPACITY);
        let reader = tokio::spawn(read_streams(connection.clone(), tx)).abort_handle();

        tracing::debug!(server = %self.server_addr, "transport open");
        self.session = Some(Session { connection, events, reader });
        Ok(())
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let Some(session) = self.session.as_ref() else {
            return Err(TransportError::Connection("not connected".to_owned()));
        };

        let (send, _recv) = session
            .connection
            .open_bi()
            .await
            .map_err(|e| TransportError::Stream(format!("open stream failed: {e}")))?;
        send_frame(send, &frame).await
    }

    async fn recv(&mut self) -> TransportEvent {
        let Some(session) = self.session.as_mut() else {
            return std::future::pending().await;
        };

        match session.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Closed { reason: "transport close".to_owned() },
        }
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.reader.abort();
            session.connection.close(0u32.into(), CLIENT_CLOSE_REASON.as_bytes());
        }
    }
}

/// Accept server streams until the connection dies, then report why.
async fn read_streams(connection: quinn::Connection, events: mpsc::Sender<TransportEvent>) {
    let reason = loop {
        match connection.accept_uni().await {
            Ok(recv) => {
                let tx = events.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_incoming_stream(recv, tx).await {
                        tracing::warn!(error = %e, "incoming stream error");
                    }
                });
            },
            Err(e) => break close_reason(&e),
        }
    };

    tracing::debug!(%reason, "transport closed");
    // Receiver gone means the transport was closed locally.
    let _ = events.send(TransportEvent::Closed { reason }).await;
}

/// Map a QUIC close to the disconnect reasons the connection manager
/// classifies.
fn close_reason(error: &quinn::ConnectionError) -> String {
    match error {
        quinn::ConnectionError::ApplicationClosed(close) if close.reason.is_empty() => {
            SERVER_CLOSE_REASON.to_owned()
        },
        quinn::ConnectionError::ApplicationClosed(close) => {
            String::from_utf8_lossy(&close.reason).into_owned()
        },
        quinn::ConnectionError::LocallyClosed => CLIENT_CLOSE_REASON.to_owned(),
        other => other.to_string(),
    }
}

/// Handle an incoming unidirectional stream (server -> client).
async fn handle_incoming_stream(
    mut recv: RecvStream,
    tx: mpsc::Sender<TransportEvent>,
) -> Result<(), TransportError> {
    let mut buf = BytesMut::zeroed(FrameHeader::SIZE);

    recv.read_exact(&mut buf[..FrameHeader::SIZE])
        .await
        .map_err(|e| TransportError::Stream(format!("header read failed: {e}")))?;

    let frame_len = FrameHeader::from_bytes(&buf[..FrameHeader::SIZE])
        .map_err(|e| TransportError::Protocol(format!("invalid header: {e}")))?
        .frame_len();

    buf.resize(frame_len, 0);
    recv.read_exact(&mut buf[FrameHeader::SIZE..])
        .await
        .map_err(|e| TransportError::Stream(format!("body read failed: {e}")))?;

    let frame = Frame::decode(&buf)
        .map_err(|e| TransportError::Protocol(format!("frame decode failed: {e}")))?;

    tx.send(TransportEvent::Frame(frame))
        .await
        .map_err(|e| TransportError::Stream(format!("channel send failed: {e}")))
}

/// Send a frame on a stream.
async fn send_frame(mut send: SendStream, frame: &Frame) -> Result<(), TransportError> {
    let mut buf = Vec::with_capacity(FrameHeader::SIZE + frame.event.len() + frame.payload.len());
    frame.encode(&mut buf).map_err(|e| TransportError::Protocol(format!("encode failed: {e}")))?;

    send.write_all(&buf).await.map_err(|e| TransportError::Stream(format!("write failed: {e}")))?;
    send.finish().map_err(|e| TransportError::Stream(format!("finish failed: {e}")))?;

    Ok(())
}

/// Create an insecure client config that accepts any certificate.
///
/// WARNING: Development only. Production should verify certificates.
fn insecure_client_config() -> Result<ClientConfig, TransportError> {
    let mut crypto = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
        .with_no_client_auth();
    crypto.alpn_protocols = vec![ALPN.to_vec()];

    let quic = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| TransportError::Connection(format!("invalid TLS config: {e}")))?;
    let mut config = ClientConfig::new(Arc::new(quic));

    let idle = IDLE_TIMEOUT
        .try_into()
        .map_err(|e| TransportError::Connection(format!("invalid idle timeout: {e}")))?;
    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(idle));
    config.transport_config(Arc::new(transport));

    Ok(config)
}

/// Certificate verifier that accepts any certificate (insecure, for
/// development).
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_close_maps_to_client_reason() {
        assert_eq!(close_reason(&quinn::ConnectionError::LocallyClosed), CLIENT_CLOSE_REASON);
    }

    #[test]
    fn timeout_is_a_network_reason() {
        let reason = close_reason(&quinn::ConnectionError::TimedOut);
        assert_ne!(reason, SERVER_CLOSE_REASON);
        assert_ne!(reason, CLIENT_CLOSE_REASON);
    }

    #[tokio::test]
    async fn send_without_open_fails() {
        let mut transport = QuicTransport::new("127.0.0.1:4433");
        let result = transport.send(Frame::new("join-room", Vec::new())).await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }
}
