//! Async polling helpers on top of the non-blocking engine.
//!
//! The engine never waits. These helpers run its poll loop on a tokio
//! timer so an async caller can simply `.await` a connect, a send or the
//! next inbound frame. Every helper returns as soon as the engine reports
//! a final status or an error.
//!
//! # Example
//!
//! ```
//! use picows::transport::MemoryTransport;
//! use picows::{ConnectRequest, Engine, RecvStatus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> picows::Result<()> {
//! let mut transport = MemoryTransport::new();
//! transport.queue_inbound(b"HTTP/1.1 101 Switching Protocols\r\n\r\n\x81\x02hi");
//!
//! let mut engine = Engine::new(transport);
//! let ws = engine.open()?;
//! let request = ConnectRequest::new("echo.local", 80, "/");
//! picows::driver::connect(&mut engine, ws, &request).await?;
//!
//! let mut buf = [0u8; 64];
//! let status = picows::driver::recv(&mut engine, ws, &mut buf).await?;
//! assert_eq!(status, RecvStatus::Data(2));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::config::ConnectRequest;
use crate::engine::{ConnectStatus, Engine, RecvStatus, SendStatus};
use crate::error::Result;
use crate::identifiers::SocketHandle;
use crate::transport::Transport;

// ============================================================================
// Constants
// ============================================================================

/// Delay between two polls of a pending operation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

// ============================================================================
// Connect
// ============================================================================

/// Polls [`Engine::connect`] until the handshake completes.
///
/// The handshake timeout is enforced by the engine itself.
///
/// # Errors
///
/// Any error [`Engine::connect`] returns; the slot is `Closed` afterwards.
pub async fn connect<T: Transport, const N: usize>(
    engine: &mut Engine<T, N>,
    handle: SocketHandle,
    request: &ConnectRequest,
) -> Result<()> {
    connect_with_interval(engine, handle, request, DEFAULT_POLL_INTERVAL).await
}

/// [`connect`] with a custom poll interval.
///
/// # Errors
///
/// Same as [`connect`].
pub async fn connect_with_interval<T: Transport, const N: usize>(
    engine: &mut Engine<T, N>,
    handle: SocketHandle,
    request: &ConnectRequest,
    interval: Duration,
) -> Result<()> {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        match engine.connect(handle, request)? {
            ConnectStatus::Established => {
                debug!(%handle, "Driver connect finished");
                return Ok(());
            }
            // The request can go out right away.
            ConnectStatus::ProceedToHandshake => {}
            ConnectStatus::InProgress | ConnectStatus::HandshakeInProgress => {
                ticker.tick().await;
            }
        }
    }
}

// ============================================================================
// Send
// ============================================================================

/// Sends `payload` as a binary frame, waiting for transmit space.
///
/// # Errors
///
/// Any error [`Engine::send`] returns.
pub async fn send<T: Transport, const N: usize>(
    engine: &mut Engine<T, N>,
    handle: SocketHandle,
    payload: &[u8],
) -> Result<usize> {
    loop {
        match engine.send(handle, payload)? {
            SendStatus::Sent(n) => return Ok(n),
            SendStatus::WouldBlock => time::sleep(DEFAULT_POLL_INTERVAL).await,
        }
    }
}

/// Sends `text` as a text frame, waiting for transmit space.
///
/// # Errors
///
/// Any error [`Engine::send_text`] returns.
pub async fn send_text<T: Transport, const N: usize>(
    engine: &mut Engine<T, N>,
    handle: SocketHandle,
    text: &str,
) -> Result<usize> {
    loop {
        match engine.send_text(handle, text)? {
            SendStatus::Sent(n) => return Ok(n),
            SendStatus::WouldBlock => time::sleep(DEFAULT_POLL_INTERVAL).await,
        }
    }
}

// ============================================================================
// Receive
// ============================================================================

/// Waits for the next complete inbound frame of any kind.
///
/// # Errors
///
/// Any error [`Engine::recv`] returns.
pub async fn recv<T: Transport, const N: usize>(
    engine: &mut Engine<T, N>,
    handle: SocketHandle,
    buf: &mut [u8],
) -> Result<RecvStatus> {
    loop {
        match engine.recv(handle, buf)? {
            RecvStatus::WouldBlock => time::sleep(DEFAULT_POLL_INTERVAL).await,
            status => return Ok(status),
        }
    }
}

/// Waits for the next data frame, answering Pings on the way.
///
/// Returns `None` once the peer closed the connection.
///
/// # Errors
///
/// Any error [`Engine::recv`] returns.
pub async fn recv_message<T: Transport, const N: usize>(
    engine: &mut Engine<T, N>,
    handle: SocketHandle,
    buf: &mut [u8],
) -> Result<Option<usize>> {
    loop {
        match recv(engine, handle, buf).await? {
            RecvStatus::Data(n) => return Ok(Some(n)),
            RecvStatus::Closed => return Ok(None),
            RecvStatus::Ping | RecvStatus::Pong | RecvStatus::WouldBlock => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::engine::ConnectionState;
    use crate::entropy::FixedKeySource;
    use crate::error::Error;
    use crate::protocol::frame;
    use crate::transport::{MemoryTransport, TcpTransport};

    const RESPONSE: &[u8] = b"HTTP/1.1 101 Switching Protocols\r\n\
                              Upgrade: websocket\r\n\
                              Connection: Upgrade\r\n\r\n";

    #[tokio::test]
    async fn test_connect_and_exchange_in_memory() {
        let mut transport = MemoryTransport::new().with_connect_delay(3);
        let mut inbound = RESPONSE.to_vec();
        inbound.extend_from_slice(&[0x89, 0x00, 0x81, 0x03, b'a', b'b', b'c']);
        transport.queue_inbound(&inbound);

        let mut engine = Engine::new(transport);
        let ws = engine.open().unwrap();
        connect(&mut engine, ws, &ConnectRequest::new("echo.local", 80, "/"))
            .await
            .unwrap();
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Established);

        let mut buf = [0u8; 16];
        assert_eq!(recv_message(&mut engine, ws, &mut buf).await.unwrap(), Some(3));
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(send(&mut engine, ws, b"xyz").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_connect_times_out() {
        let mut engine = Engine::new(MemoryTransport::new());
        let ws = engine.open().unwrap();
        let request = ConnectRequest::new("silent.local", 80, "/");

        let pending = time::timeout(
            Duration::from_millis(50),
            connect(&mut engine, ws, &request),
        )
        .await;
        assert!(pending.is_err());
        assert_eq!(
            engine.state(ws).unwrap(),
            ConnectionState::HandshakeAwaitStatus
        );

        // The memory clock only moves when told to.
        engine.transport_mut().advance(5_001);
        let err = connect(&mut engine, ws, &request).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_send_text_frame() {
        let mut transport = MemoryTransport::new();
        transport.queue_inbound(RESPONSE);
        let mut engine = Engine::new(transport);
        let ws = engine.open().unwrap();
        connect(&mut engine, ws, &ConnectRequest::new("echo.local", 80, "/"))
            .await
            .unwrap();

        let th = engine.connection(ws).unwrap().transport_handle().unwrap();
        engine.transport_mut().take_sent(th);
        assert_eq!(send_text(&mut engine, ws, "ok").await.unwrap(), 2);
        assert_eq!(engine.transport().sent(th)[0], 0x81);
    }

    #[tokio::test]
    async fn test_recv_reports_close() {
        let mut transport = MemoryTransport::new();
        let mut inbound = RESPONSE.to_vec();
        inbound.extend_from_slice(&[0x88, 0x00]);
        transport.queue_inbound(&inbound);

        let mut engine = Engine::new(transport);
        let ws = engine.open().unwrap();
        connect(&mut engine, ws, &ConnectRequest::new("echo.local", 80, "/"))
            .await
            .unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(recv_message(&mut engine, ws, &mut buf).await.unwrap(), None);
        assert!(matches!(
            send(&mut engine, ws, b"late").await,
            Err(Error::InvalidState { .. })
        ));
    }

    /// Minimal server: accepts the upgrade, echoes one masked frame back
    /// unmasked, then waits for the client's Close frame.
    async fn echo_server(listener: TcpListener) -> anyhow::Result<Vec<u8>> {
        let (mut socket, _) = listener.accept().await?;

        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            socket.read_exact(&mut byte).await?;
            request.push(byte[0]);
        }
        socket.write_all(RESPONSE).await?;

        let mut head = [0u8; 6];
        socket.read_exact(&mut head).await?;
        let len = usize::from(head[1] & 0x7F);
        let key = [head[2], head[3], head[4], head[5]];
        let mut payload = vec![0u8; len];
        socket.read_exact(&mut payload).await?;
        frame::apply_mask(&mut payload, key);

        let mut reply = vec![0x82, u8::try_from(len)?];
        reply.extend_from_slice(&payload);
        socket.write_all(&reply).await?;

        let mut close = [0u8; 6];
        socket.read_exact(&mut close).await?;
        anyhow::ensure!(close[0] == 0x88, "expected close frame, got {close:?}");
        Ok(request)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_loopback_session() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let server = tokio::spawn(echo_server(listener));

        let mut engine = Engine::<_, 1>::builder(TcpTransport::current()?)
            .key_source(FixedKeySource::new(b"the sample nonce\x11\x22\x33\x44".to_vec()))
            .build()?;
        let ws = engine.open()?;
        let request = ConnectRequest::from_url(&format!("ws://127.0.0.1:{port}/echo"))?;
        connect(&mut engine, ws, &request).await?;

        assert_eq!(send(&mut engine, ws, b"ping over tcp").await?, 13);
        let mut buf = [0u8; 64];
        assert_eq!(recv_message(&mut engine, ws, &mut buf).await?, Some(13));
        assert_eq!(&buf[..13], b"ping over tcp");
        engine.close(ws)?;

        let request_text = String::from_utf8(server.await??)?;
        assert!(request_text.starts_with("GET /echo HTTP/1.1\r\n"));
        assert!(request_text.contains(&format!("Host: 127.0.0.1:{port}\r\n")));
        assert!(request_text.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        Ok(())
    }
}
