//! Opening handshake driver.
//!
//! [`Engine::connect`] is re-entrant: each call performs at most one
//! state transition and returns a [`ConnectStatus`] saying whether to
//! poll again. Every failure path releases the transport handle and
//! leaves the slot `Closed`.
//!
//! | State | Action on poll |
//! |-------|----------------|
//! | `Created` | Resolve target, open transport |
//! | `TcpInProgress` | Wait for the transport to connect, start timer |
//! | `HandshakeSendRequest` | Wait for tx space, write upgrade request |
//! | `HandshakeAwaitStatus` | Wait for and check the status line |
//! | `HandshakeSkipHeaders` | Discard header lines up to the blank line |
//! | `Established` | Nothing |

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;

use tracing::{debug, info, trace, warn};

use crate::config::ConnectRequest;
use crate::error::{Error, Result};
use crate::identifiers::{SocketHandle, TransportHandle};
use crate::protocol::handshake;
use crate::transport::{Remote, Transport};

use super::connection::ConnectionState;
use super::{ConnectStatus, Engine};

// ============================================================================
// Constants
// ============================================================================

/// Line terminator searched for in the response.
const LF: u8 = b'\n';

// ============================================================================
// Engine - Handshake
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    /// Advances the opening handshake of `handle` by one step.
    ///
    /// Call repeatedly with the same request until it returns
    /// [`ConnectStatus::Established`].
    ///
    /// # Errors
    ///
    /// - [`Error::Unsupported`] if `request.secure` is set
    /// - [`Error::InvalidAddress`] / [`Error::TransportOpen`] if the stream cannot be opened
    /// - [`Error::Disconnected`] if the transport was reset
    /// - [`Error::HandshakeTimeout`], [`Error::HandshakeRejected`],
    ///   [`Error::HandshakeOverflow`] on a failed response
    /// - [`Error::TransportFault`] if the request write fails
    /// - [`Error::InvalidState`] if the slot is `Closed`, and
    ///   [`Error::Disconnected`] if it is `Disconnected`; both are fatal,
    ///   so every poll after a failed handshake keeps reporting failure
    pub fn connect(
        &mut self,
        handle: SocketHandle,
        request: &ConnectRequest,
    ) -> Result<ConnectStatus> {
        let state = self.pool.get(handle)?.state;

        if request.secure && (state == ConnectionState::Created || state.is_handshaking()) {
            self.abort(handle)?;
            return Err(Error::unsupported("secure transport (wss)"));
        }

        match state {
            ConnectionState::Created => self.open_stream(handle, request),
            ConnectionState::TcpInProgress => self.poll_tcp(handle),
            ConnectionState::HandshakeSendRequest => self.send_request(handle, request),
            ConnectionState::HandshakeAwaitStatus => self.await_status(handle),
            ConnectionState::HandshakeSkipHeaders => self.skip_headers(handle, request.masking),
            ConnectionState::Established => Ok(ConnectStatus::Established),
            ConnectionState::Closed => Err(Error::invalid_state(handle, state)),
            ConnectionState::Disconnected => Err(Error::disconnected(handle)),
        }
    }
}

// ============================================================================
// Engine - Handshake Steps
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    /// `Created`: resolve the target and start the transport connect.
    fn open_stream(
        &mut self,
        handle: SocketHandle,
        request: &ConnectRequest,
    ) -> Result<ConnectStatus> {
        let remote = if request.host_is_address {
            match request.host.parse::<IpAddr>() {
                Ok(ip) => Remote::Address(ip),
                Err(_) => {
                    self.abort(handle)?;
                    return Err(Error::invalid_address(&request.host));
                }
            }
        } else {
            Remote::Name(&request.host)
        };

        let Some(stream) = self.transport.open(remote, request.port) else {
            self.abort(handle)?;
            warn!(%handle, host = %request.host, port = request.port, "Transport open failed");
            return Err(Error::transport_open(&request.host, request.port));
        };

        let conn = self.pool.get_mut(handle)?;
        conn.transport = Some(stream);
        conn.state = ConnectionState::TcpInProgress;
        debug!(%handle, %stream, %remote, port = request.port, "TCP connect issued");
        Ok(ConnectStatus::InProgress)
    }

    /// `TcpInProgress`: wait for the transport, then start the timer.
    fn poll_tcp(&mut self, handle: SocketHandle) -> Result<ConnectStatus> {
        self.ensure_live(handle)?;
        let stream = self.stream(handle)?;

        if !self.transport.is_connected(stream) {
            return Ok(ConnectStatus::InProgress);
        }

        let now = self.transport.now();
        let conn = self.pool.get_mut(handle)?;
        conn.timer = now;
        conn.state = ConnectionState::HandshakeSendRequest;
        debug!(%handle, "TCP connected, starting handshake");
        Ok(ConnectStatus::ProceedToHandshake)
    }

    /// `HandshakeSendRequest`: write the upgrade request in one go.
    fn send_request(
        &mut self,
        handle: SocketHandle,
        request: &ConnectRequest,
    ) -> Result<ConnectStatus> {
        self.ensure_live(handle)?;
        self.check_timeout(handle)?;
        let stream = self.stream(handle)?;

        let needed = handshake::request_len(&request.uri, &request.host, request.port)
            .max(self.config.request_reserve);
        let free = self.transport.put_ready(stream);
        if free < needed {
            trace!(%handle, free, needed, "Waiting for room for upgrade request");
            return Ok(ConnectStatus::ProceedToHandshake);
        }

        let key = handshake::generate_key(self.keys.as_mut());
        let text = handshake::render_request(&request.uri, &request.host, request.port, &key);

        let written = self.transport.put(stream, text.as_bytes());
        if written != text.len() {
            self.abort(handle)?;
            return Err(Error::transport_fault(handle, written, text.len()));
        }
        self.transport.flush(stream);

        let now = self.transport.now();
        let conn = self.pool.get_mut(handle)?;
        conn.timer = now;
        conn.state = ConnectionState::HandshakeAwaitStatus;
        debug!(%handle, uri = %request.uri, len = written, "Upgrade request sent");
        Ok(ConnectStatus::HandshakeInProgress)
    }

    /// `HandshakeAwaitStatus`: read and check the status line.
    fn await_status(&mut self, handle: SocketHandle) -> Result<ConnectStatus> {
        self.ensure_live(handle)?;
        self.check_timeout(handle)?;
        let stream = self.stream(handle)?;

        let Some(end) = self.transport.find(stream, LF) else {
            return self.wait_for_line(handle, stream);
        };

        let mut line = vec![0u8; end + 1];
        let read = self.transport.get(stream, &mut line);
        if read != line.len() {
            self.abort(handle)?;
            return Err(Error::protocol("status line vanished from receive buffer"));
        }

        if let Err(e) = handshake::check_status_line(&line) {
            self.abort(handle)?;
            warn!(%handle, error = %e, "Handshake rejected");
            return Err(e);
        }

        self.pool.get_mut(handle)?.state = ConnectionState::HandshakeSkipHeaders;
        debug!(%handle, "Status 101 received");
        Ok(ConnectStatus::HandshakeInProgress)
    }

    /// `HandshakeSkipHeaders`: discard header lines until the blank line.
    fn skip_headers(&mut self, handle: SocketHandle, masking: bool) -> Result<ConnectStatus> {
        self.ensure_live(handle)?;
        self.check_timeout(handle)?;
        let stream = self.stream(handle)?;

        loop {
            let Some(end) = self.transport.find(stream, LF) else {
                return self.wait_for_line(handle, stream);
            };

            if end > 1 {
                self.transport.discard(stream, end + 1);
                continue;
            }

            let mut line = [0u8; 2];
            let line = &mut line[..=end];
            if self.transport.get(stream, line) != line.len() {
                self.abort(handle)?;
                return Err(Error::protocol("header line vanished from receive buffer"));
            }
            if handshake::is_header_terminator(line) {
                return self.finish(handle, masking);
            }
        }
    }

    /// `HandshakeSkipHeaders` → `Established`: draw the send mask.
    fn finish(&mut self, handle: SocketHandle, masking: bool) -> Result<ConnectStatus> {
        let mask = if masking { self.keys.next_u32() } else { 0 };

        let conn = self.pool.get_mut(handle)?;
        conn.send_mask = mask;
        conn.timer = 0;
        conn.clear_frame();
        conn.state = ConnectionState::Established;
        info!(%handle, masking, "WebSocket established");
        Ok(ConnectStatus::Established)
    }
}

// ============================================================================
// Engine - Handshake Failure Paths
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    /// No line terminator yet: wait, unless the receive buffer is full.
    fn wait_for_line(
        &mut self,
        handle: SocketHandle,
        stream: TransportHandle,
    ) -> Result<ConnectStatus> {
        if self.transport.rx_free(stream) == 0 {
            self.abort(handle)?;
            warn!(%handle, "Handshake response overflowed receive buffer");
            return Err(Error::HandshakeOverflow);
        }
        Ok(ConnectStatus::HandshakeInProgress)
    }

    /// Fails the handshake once the timer has run past the configured limit.
    fn check_timeout(&mut self, handle: SocketHandle) -> Result<()> {
        let started = self.pool.get(handle)?.timer;
        let elapsed = self.transport.now().wrapping_sub(started);
        let limit = self
            .config
            .handshake_timeout_ticks(self.transport.ticks_per_second());

        if elapsed > limit {
            self.abort(handle)?;
            warn!(%handle, elapsed, limit, "Handshake timed out");
            return Err(Error::handshake_timeout(self.config.handshake_timeout_ms));
        }
        Ok(())
    }

    /// Disconnects any held stream and returns the slot to `Closed`.
    pub(crate) fn abort(&mut self, handle: SocketHandle) -> Result<()> {
        let conn = self.pool.get_mut(handle)?;
        let state = conn.state;
        if let Some(stream) = conn.release() {
            self.transport.disconnect(stream);
        }
        debug!(%handle, ?state, "Slot released");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::engine::tests::{SEND_MASK, UPGRADE_RESPONSE, engine, request};
    use crate::transport::MemoryTransport;

    /// Base64 of sixteen zero bytes, the key drawn by the test engine.
    const ZERO_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAA==";

    /// Opens a slot and drives it until the upgrade request is on the wire.
    fn request_sent(
        engine: &mut Engine<MemoryTransport, 1>,
        request: &ConnectRequest,
    ) -> (SocketHandle, TransportHandle) {
        let ws = engine.open().unwrap();
        assert_eq!(engine.connect(ws, request).unwrap(), ConnectStatus::InProgress);
        assert_eq!(
            engine.connect(ws, request).unwrap(),
            ConnectStatus::ProceedToHandshake
        );
        assert_eq!(
            engine.connect(ws, request).unwrap(),
            ConnectStatus::HandshakeInProgress
        );
        let th = engine.connection(ws).unwrap().transport_handle().unwrap();
        (ws, th)
    }

    fn poll_until_done(
        engine: &mut Engine<MemoryTransport, 1>,
        ws: SocketHandle,
        request: &ConnectRequest,
    ) -> Result<ConnectStatus> {
        for _ in 0..16 {
            let status = engine.connect(ws, request)?;
            if status.is_established() {
                return Ok(status);
            }
        }
        Ok(ConnectStatus::HandshakeInProgress)
    }

    #[test]
    fn test_request_bytes() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request();
        let (ws, th) = request_sent(&mut engine, &request);

        let expected = handshake::render_request("/ws", "echo.local", 80, ZERO_KEY);
        assert_eq!(engine.transport().sent(th), expected.as_bytes());
        assert_eq!(
            engine.state(ws).unwrap(),
            ConnectionState::HandshakeAwaitStatus
        );
        assert_eq!(engine.transport().opened()[0].remote, "echo.local");
    }

    #[test]
    fn test_step_sequence() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request();
        let (ws, th) = request_sent(&mut engine, &request);
        engine.transport_mut().deliver(th, UPGRADE_RESPONSE);

        assert_eq!(
            engine.connect(ws, &request).unwrap(),
            ConnectStatus::HandshakeInProgress
        );
        assert_eq!(
            engine.state(ws).unwrap(),
            ConnectionState::HandshakeSkipHeaders
        );
        assert_eq!(engine.connect(ws, &request).unwrap(), ConnectStatus::Established);
        assert_eq!(engine.connect(ws, &request).unwrap(), ConnectStatus::Established);

        let conn = engine.connection(ws).unwrap();
        assert_eq!(conn.send_mask(), u32::from_be_bytes(SEND_MASK));
        assert_eq!(engine.transport().rx_len(th), 0);
    }

    #[test]
    fn test_connect_delay() {
        let mut engine = engine::<1>(MemoryTransport::new().with_connect_delay(2));
        let request = request();
        let ws = engine.open().unwrap();

        assert_eq!(engine.connect(ws, &request).unwrap(), ConnectStatus::InProgress);
        assert_eq!(engine.connect(ws, &request).unwrap(), ConnectStatus::InProgress);
        assert_eq!(engine.connect(ws, &request).unwrap(), ConnectStatus::InProgress);
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::TcpInProgress);
        assert_eq!(
            engine.connect(ws, &request).unwrap(),
            ConnectStatus::ProceedToHandshake
        );
    }

    #[test]
    fn test_rejected_status_releases_slot() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request();
        let (ws, th) = request_sent(&mut engine, &request);
        engine
            .transport_mut()
            .deliver(th, b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n");

        let err = engine.connect(ws, &request).unwrap_err();
        assert!(matches!(err, Error::HandshakeRejected { ref status } if status == "400"));
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert!(!engine.transport().is_open(th));
        assert_eq!(engine.transport().disconnect_count(), 1);
        assert_eq!(engine.open().unwrap(), ws);
    }

    #[test]
    fn test_timeout_fires_once() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request();
        let (ws, _) = request_sent(&mut engine, &request);

        engine.transport_mut().advance(5000);
        assert_eq!(
            engine.connect(ws, &request).unwrap(),
            ConnectStatus::HandshakeInProgress
        );

        engine.transport_mut().advance(1);
        let err = engine.connect(ws, &request).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert_eq!(engine.transport().disconnect_count(), 1);

        for _ in 0..3 {
            let err = engine.connect(ws, &request).unwrap_err();
            assert!(matches!(err, Error::InvalidState { .. }));
            assert!(err.is_fatal());
        }
        assert_eq!(engine.transport().disconnect_count(), 1);
    }

    #[test]
    fn test_timeout_across_clock_wrap() {
        let transport = MemoryTransport::new().with_start_tick(u32::MAX - 10);
        let mut engine = engine::<1>(transport);
        let request = request();
        let (ws, _) = request_sent(&mut engine, &request);

        engine.transport_mut().advance(100);
        assert!(engine.connect(ws, &request).is_ok());

        engine.transport_mut().advance(5000);
        assert!(engine.connect(ws, &request).unwrap_err().is_timeout());
    }

    #[test]
    fn test_configured_timeout() {
        let mut engine = Engine::<_, 1>::builder(MemoryTransport::new())
            .handshake_timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let request = request();
        let (ws, _) = request_sent(&mut engine, &request);

        engine.transport_mut().advance(201);
        let err = engine.connect(ws, &request).unwrap_err();
        assert!(matches!(err, Error::HandshakeTimeout { timeout_ms: 200 }));
    }

    #[test]
    fn test_response_overflow() {
        let mut engine = engine::<1>(MemoryTransport::new().with_capacity(16, 1024));
        let request = request();
        let (ws, th) = request_sent(&mut engine, &request);
        assert_eq!(engine.transport_mut().deliver(th, b"HTTP/1.1 101 Switching"), 16);

        let err = engine.connect(ws, &request).unwrap_err();
        assert!(matches!(err, Error::HandshakeOverflow));
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
    }

    #[test]
    fn test_secure_rejected() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request().with_secure(true);
        let ws = engine.open().unwrap();

        let err = engine.connect(ws, &request).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert!(engine.transport().opened().is_empty());
    }

    #[test]
    fn test_open_refused() {
        let mut transport = MemoryTransport::new();
        transport.set_refuse_open(true);
        let mut engine = engine::<1>(transport);
        let ws = engine.open().unwrap();

        let err = engine.connect(ws, &request()).unwrap_err();
        assert!(matches!(err, Error::TransportOpen { port: 80, .. }));
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
    }

    #[test]
    fn test_literal_address() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let ws = engine.open().unwrap();
        let request = ConnectRequest::new("192.168.1.20", 8080, "/").with_address();

        assert_eq!(engine.connect(ws, &request).unwrap(), ConnectStatus::InProgress);
        let opened = &engine.transport().opened()[0];
        assert_eq!(opened.remote, "192.168.1.20");
        assert_eq!(opened.port, 8080);
    }

    #[test]
    fn test_ipv6_literal_request() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = ConnectRequest::from_url("ws://[::1]:9001/feed").unwrap();
        let (_, th) = request_sent(&mut engine, &request);

        assert_eq!(engine.transport().opened()[0].remote, "::1");
        let text = String::from_utf8(engine.transport().sent(th).to_vec()).unwrap();
        assert!(text.contains("Host: [::1]:9001\r\n"));
        assert!(text.contains("Origin: ws://[::1]\r\n"));
    }

    #[test]
    fn test_bad_literal_address() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let ws = engine.open().unwrap();
        let request = ConnectRequest::new("echo.local", 80, "/").with_address();

        let err = engine.connect(ws, &request).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert!(engine.transport().opened().is_empty());
    }

    #[test]
    fn test_reset_during_handshake() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request();
        let (ws, th) = request_sent(&mut engine, &request);
        engine.transport_mut().reset(th);

        assert!(matches!(
            engine.connect(ws, &request),
            Err(Error::Disconnected { .. })
        ));
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert_eq!(engine.transport().close_count(), 1);
    }

    #[test]
    fn test_waits_for_request_space() {
        let mut engine = engine::<1>(MemoryTransport::new().with_capacity(1024, 100));
        let request = request();
        let ws = engine.open().unwrap();
        engine.connect(ws, &request).unwrap();
        engine.connect(ws, &request).unwrap();
        let th = engine.connection(ws).unwrap().transport_handle().unwrap();

        for _ in 0..3 {
            assert_eq!(
                engine.connect(ws, &request).unwrap(),
                ConnectStatus::ProceedToHandshake
            );
        }
        assert!(engine.transport().sent(th).is_empty());

        engine.transport_mut().set_tx_capacity(th, 1024);
        assert_eq!(
            engine.connect(ws, &request).unwrap(),
            ConnectStatus::HandshakeInProgress
        );
        engine.transport_mut().deliver(th, UPGRADE_RESPONSE);
        poll_until_done(&mut engine, ws, &request).unwrap();

        // Blocked polls drew no key material.
        let conn = engine.connection(ws).unwrap();
        assert_eq!(conn.send_mask(), u32::from_be_bytes(SEND_MASK));
    }

    #[test]
    fn test_masking_disabled() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request().with_masking(false);
        let (ws, th) = request_sent(&mut engine, &request);
        engine.transport_mut().deliver(th, UPGRADE_RESPONSE);

        poll_until_done(&mut engine, ws, &request).unwrap();
        assert_eq!(engine.connection(ws).unwrap().send_mask(), 0);
    }

    #[test]
    fn test_short_header_read_aborts() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request();
        let (ws, th) = request_sent(&mut engine, &request);
        engine.transport_mut().deliver(th, UPGRADE_RESPONSE);
        assert_eq!(
            engine.connect(ws, &request).unwrap(),
            ConnectStatus::HandshakeInProgress
        );

        engine.transport_mut().fail_reads_after(th, 0);
        let err = engine.connect(ws, &request).unwrap_err();
        assert!(err.is_protocol_error());
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert!(!engine.transport().is_open(th));
    }

    #[test]
    fn test_response_byte_by_byte() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request();
        let (ws, th) = request_sent(&mut engine, &request);

        let mut wire = UPGRADE_RESPONSE.to_vec();
        wire.extend_from_slice(&[0x82, 0x00]);
        let mut established_at = None;
        for (i, byte) in wire.iter().enumerate() {
            engine.transport_mut().deliver(th, &[*byte]);
            if engine.connect(ws, &request).unwrap().is_established() {
                established_at = Some(i);
                break;
            }
        }

        assert_eq!(established_at, Some(UPGRADE_RESPONSE.len() - 1));
        engine.transport_mut().deliver(th, &wire[UPGRADE_RESPONSE.len()..]);
        assert_eq!(engine.transport().rx_len(th), 2);
    }

    #[test]
    fn test_trailing_frame_left_for_receiver() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let request = request();
        let (ws, th) = request_sent(&mut engine, &request);
        engine.transport_mut().deliver(th, UPGRADE_RESPONSE);
        engine.transport_mut().deliver(th, &[0x81, 0x01, b'!']);

        poll_until_done(&mut engine, ws, &request).unwrap();
        assert_eq!(engine.transport().rx_len(th), 3);
    }

    proptest! {
        #[test]
        fn prop_response_split_anywhere(split in 0usize..UPGRADE_RESPONSE.len()) {
            let mut engine = engine::<1>(MemoryTransport::new());
            let request = request();
            let (ws, th) = request_sent(&mut engine, &request);

            engine.transport_mut().deliver(th, &UPGRADE_RESPONSE[..split]);
            for _ in 0..4 {
                let status = engine.connect(ws, &request).unwrap();
                prop_assert!(!status.is_established());
            }

            engine.transport_mut().deliver(th, &UPGRADE_RESPONSE[split..]);
            engine.transport_mut().deliver(th, &[0x82, 0x00]);
            let status = poll_until_done(&mut engine, ws, &request).unwrap();
            prop_assert_eq!(status, ConnectStatus::Established);
            prop_assert_eq!(engine.transport().rx_len(th), 2);
        }

        #[test]
        fn prop_response_in_arbitrary_chunks(
            mut cuts in prop::collection::vec(0usize..UPGRADE_RESPONSE.len(), 0..12)
        ) {
            let mut engine = engine::<1>(MemoryTransport::new());
            let request = request();
            let (ws, th) = request_sent(&mut engine, &request);

            cuts.sort_unstable();
            cuts.dedup();
            let mut start = 0;
            for cut in cuts {
                engine.transport_mut().deliver(th, &UPGRADE_RESPONSE[start..cut]);
                start = cut;
                for _ in 0..3 {
                    let status = engine.connect(ws, &request).unwrap();
                    prop_assert!(!status.is_established());
                }
            }

            engine.transport_mut().deliver(th, &UPGRADE_RESPONSE[start..]);
            engine.transport_mut().deliver(th, &[0x82, 0x00]);
            let status = poll_until_done(&mut engine, ws, &request).unwrap();
            prop_assert_eq!(status, ConnectStatus::Established);
            prop_assert_eq!(engine.transport().rx_len(th), 2);
        }
    }
}
