//! Frame transmitter.
//!
//! Every outbound frame is final and masked with the connection's send
//! mask. A frame is written only once the transport confirms room for
//! all of it, so a blocked send leaves nothing half-written.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{SocketHandle, TransportHandle};
use crate::protocol::frame::{self, MAX_HEADER_LEN};
use crate::protocol::OpCode;
use crate::transport::Transport;

use super::connection::ConnectionState;
use super::monitor::Disconnection;
use super::{Engine, SendStatus};

// ============================================================================
// Constants
// ============================================================================

/// Payload bytes masked per transport write. Multiple of the key length.
const CHUNK_LEN: usize = 128;

// ============================================================================
// Engine - Transmit
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    /// Sends `payload` as one binary frame.
    ///
    /// An empty payload writes nothing and returns `Sent(0)`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] / [`Error::Disconnected`] unless established
    /// - [`Error::PayloadTooLarge`] above the configured maximum; nothing is written
    /// - [`Error::TransportFault`] if the transport drops bytes after
    ///   confirming space; the connection becomes `Disconnected`
    pub fn send(&mut self, handle: SocketHandle, payload: &[u8]) -> Result<SendStatus> {
        self.send_data(handle, OpCode::Binary, payload)
    }

    /// Sends `text` as one text frame.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::send`].
    pub fn send_text(&mut self, handle: SocketHandle, text: &str) -> Result<SendStatus> {
        self.send_data(handle, OpCode::Text, text.as_bytes())
    }

    /// Sends an empty Ping.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::send`], minus the size check.
    pub fn ping(&mut self, handle: SocketHandle) -> Result<SendStatus> {
        let stream = self.ensure_established(handle)?;
        self.flush_owed_pong(handle, stream)?;
        self.write_frame(handle, stream, OpCode::Ping, &[])
    }

    /// Sends an empty, unsolicited Pong.
    ///
    /// A Pong owed to an earlier Ping counts as answered once this succeeds.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::ping`].
    pub fn pong(&mut self, handle: SocketHandle) -> Result<SendStatus> {
        let stream = self.ensure_established(handle)?;
        let status = self.write_frame(handle, stream, OpCode::Pong, &[])?;
        if status != SendStatus::WouldBlock {
            self.pool.get_mut(handle)?.pong_owed = false;
        }
        Ok(status)
    }

    /// Closes the connection from any state and frees the slot.
    ///
    /// An established connection gets a Close frame first when there is
    /// room for it. Closing a `Closed` slot is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if the handle is out of range.
    pub fn close(&mut self, handle: SocketHandle) -> Result<()> {
        let state = self.pool.get(handle)?.state;
        match state {
            ConnectionState::Closed => return Ok(()),
            ConnectionState::Created | ConnectionState::Disconnected => {}
            _ => {
                if self.check_disconnect(handle)? == Disconnection::Handled {
                    return Ok(());
                }
            }
        }

        if state == ConnectionState::Established {
            self.write_close_frame(handle)?;
        }

        self.abort(handle)?;
        info!(%handle, ?state, "WebSocket closed");
        Ok(())
    }
}

// ============================================================================
// Engine - Frame Writing
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    fn send_data(
        &mut self,
        handle: SocketHandle,
        opcode: OpCode,
        payload: &[u8],
    ) -> Result<SendStatus> {
        let stream = self.ensure_established(handle)?;
        self.flush_owed_pong(handle, stream)?;

        if payload.is_empty() {
            return Ok(SendStatus::Sent(0));
        }
        let max = self.config.max_payload;
        if payload.len() > max {
            return Err(Error::payload_too_large(payload.len(), max));
        }

        self.write_frame(handle, stream, opcode, payload)
    }

    /// Writes one masked frame if the transport has room for all of it.
    pub(crate) fn write_frame(
        &mut self,
        handle: SocketHandle,
        stream: TransportHandle,
        opcode: OpCode,
        payload: &[u8],
    ) -> Result<SendStatus> {
        let needed = frame::frame_len(payload.len());
        let free = self.transport.put_ready(stream);
        if free < needed {
            trace!(%handle, ?opcode, free, needed, "Transmit buffer full");
            return Ok(SendStatus::WouldBlock);
        }

        let key = frame::mask_key(self.pool.get(handle)?.send_mask);
        let mut header = [0u8; MAX_HEADER_LEN];
        let header_len = frame::encode_header(opcode, payload.len(), key, &mut header);
        self.put_all(handle, stream, &header[..header_len])?;

        let mut chunk = [0u8; CHUNK_LEN];
        for part in payload.chunks(CHUNK_LEN) {
            let masked = &mut chunk[..part.len()];
            masked.copy_from_slice(part);
            frame::apply_mask(masked, key);
            self.put_all(handle, stream, masked)?;
        }

        self.transport.flush(stream);
        trace!(%handle, ?opcode, len = payload.len(), "Frame sent");
        Ok(SendStatus::Sent(payload.len()))
    }

    /// Answers a Ping, or remembers the Pong when there is no room yet.
    pub(crate) fn reply_pong(&mut self, handle: SocketHandle, stream: TransportHandle) -> Result<()> {
        if self.write_frame(handle, stream, OpCode::Pong, &[])? == SendStatus::WouldBlock {
            self.pool.get_mut(handle)?.pong_owed = true;
            debug!(%handle, "Pong deferred until transmit space frees up");
        }
        Ok(())
    }

    /// Sends a Pong deferred by an earlier [`Engine::reply_pong`].
    pub(crate) fn flush_owed_pong(
        &mut self,
        handle: SocketHandle,
        stream: TransportHandle,
    ) -> Result<()> {
        if !self.pool.get(handle)?.pong_owed {
            return Ok(());
        }
        if let SendStatus::Sent(_) = self.write_frame(handle, stream, OpCode::Pong, &[])? {
            self.pool.get_mut(handle)?.pong_owed = false;
            debug!(%handle, "Deferred pong sent");
        }
        Ok(())
    }

    /// Best effort: a close frame that does not fit is skipped.
    fn write_close_frame(&mut self, handle: SocketHandle) -> Result<()> {
        let stream = self.stream(handle)?;
        let key = frame::mask_key(self.pool.get(handle)?.send_mask);
        let mut header = [0u8; MAX_HEADER_LEN];
        let len = frame::encode_header(OpCode::Close, 0, key, &mut header);

        if self.transport.put_ready(stream) < len {
            warn!(%handle, "No room for close frame, disconnecting without it");
            return Ok(());
        }
        let written = self.transport.put(stream, &header[..len]);
        if written == len {
            self.transport.flush(stream);
        } else {
            warn!(%handle, written, expected = len, "Close frame truncated");
        }
        Ok(())
    }

    /// Queues `bytes` in full or marks the connection failed.
    fn put_all(
        &mut self,
        handle: SocketHandle,
        stream: TransportHandle,
        bytes: &[u8],
    ) -> Result<()> {
        let written = self.transport.put(stream, bytes);
        if written == bytes.len() {
            return Ok(());
        }

        self.pool.get_mut(handle)?.fail();
        warn!(%handle, %stream, written, expected = bytes.len(), "Transport fault during send");
        Err(Error::transport_fault(handle, written, bytes.len()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::config::EngineConfig;
    use crate::engine::tests::{SEND_MASK, engine, established, request};
    use crate::entropy::FixedKeySource;
    use crate::protocol::{FrameHead, FrameKind, LengthCode};
    use crate::transport::MemoryTransport;

    /// Splits a client frame from the wire into its head and unmasked payload.
    fn decode(wire: &[u8]) -> (FrameHead, Vec<u8>) {
        let head = FrameHead::parse([wire[0], wire[1]]);
        let (len, mut pos) = match head.length {
            LengthCode::Short(len) => (len, 2),
            LengthCode::Extended16 => (usize::from(u16::from_be_bytes([wire[2], wire[3]])), 4),
            LengthCode::Extended64 => panic!("client never emits 64-bit lengths"),
        };
        let key = [wire[pos], wire[pos + 1], wire[pos + 2], wire[pos + 3]];
        pos += 4;
        assert_eq!(wire.len(), pos + len, "frame length mismatch");

        let mut payload = wire[pos..].to_vec();
        frame::apply_mask(&mut payload, key);
        (head, payload)
    }

    #[test]
    fn test_short_frame_layout() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let (ws, th) = established(&mut engine);

        assert_eq!(engine.send(ws, b"hi").unwrap(), SendStatus::Sent(2));
        let wire = engine.transport_mut().take_sent(th);
        assert_eq!(
            wire,
            [
                0x82,
                0x82,
                SEND_MASK[0],
                SEND_MASK[1],
                SEND_MASK[2],
                SEND_MASK[3],
                b'h' ^ SEND_MASK[0],
                b'i' ^ SEND_MASK[1],
            ]
        );
    }

    #[test]
    fn test_extended_length_layout() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let (ws, th) = established(&mut engine);
        let payload = vec![0x5A; 300];

        assert_eq!(engine.send(ws, &payload).unwrap(), SendStatus::Sent(300));
        let wire = engine.transport_mut().take_sent(th);
        assert_eq!(&wire[..4], &[0x82, 0xFE, 0x01, 0x2C]);
        assert_eq!(&wire[4..8], &SEND_MASK);
        assert_eq!(wire.len(), 308);
        assert_eq!(decode(&wire).1, payload);
    }

    #[test]
    fn test_send_text_opcode() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let (ws, th) = established(&mut engine);

        engine.send_text(ws, "héllo").unwrap();
        let wire = engine.transport_mut().take_sent(th);
        assert_eq!(wire[0], 0x81);
        assert_eq!(decode(&wire).1, "héllo".as_bytes());
    }

    #[test]
    fn test_empty_payload_writes_nothing() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let (ws, th) = established(&mut engine);

        assert_eq!(engine.send(ws, &[]).unwrap(), SendStatus::Sent(0));
        assert!(engine.transport().sent(th).is_empty());
        assert!(engine.transport().unflushed(th).is_empty());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut engine = engine::<1>(MemoryTransport::new().with_capacity(2048, 2048));
        let (ws, th) = established(&mut engine);

        let err = engine.send(ws, &[0u8; 1001]).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { len: 1001, max: 1000 }));
        assert!(engine.transport().sent(th).is_empty());
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Established);
        assert_eq!(engine.send(ws, &[0u8; 1000]).unwrap(), SendStatus::Sent(1000));
    }

    #[test]
    fn test_configured_max_payload() {
        let mut keys = vec![0u8; 16];
        keys.extend_from_slice(&SEND_MASK);
        let mut engine = Engine::<_, 1>::builder(MemoryTransport::new())
            .config(EngineConfig::new().with_max_payload(64))
            .key_source(FixedKeySource::new(keys))
            .build()
            .unwrap();
        let (ws, _) = established(&mut engine);

        assert!(engine.send(ws, &[1u8; 64]).is_ok());
        assert!(matches!(
            engine.send(ws, &[1u8; 65]),
            Err(Error::PayloadTooLarge { max: 64, .. })
        ));
    }

    #[test]
    fn test_would_block_leaves_state() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let (ws, th) = established(&mut engine);
        engine.transport_mut().set_tx_capacity(th, 15);

        assert_eq!(engine.send(ws, &[7u8; 10]).unwrap(), SendStatus::WouldBlock);
        assert!(engine.transport().unflushed(th).is_empty());
        assert!(engine.transport().sent(th).is_empty());
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Established);

        engine.transport_mut().set_tx_capacity(th, 16);
        assert_eq!(engine.send(ws, &[7u8; 10]).unwrap(), SendStatus::Sent(10));
    }

    #[test]
    fn test_transport_fault() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let (ws, th) = established(&mut engine);
        engine.transport_mut().fail_writes_after(th, 3);

        let err = engine.send(ws, b"payload").unwrap_err();
        assert!(matches!(
            err,
            Error::TransportFault { written: 3, expected: 6, .. }
        ));
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Disconnected);
        assert!(matches!(engine.send(ws, b"x"), Err(Error::Disconnected { .. })));

        engine.close(ws).unwrap();
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert_eq!(engine.transport().disconnect_count(), 1);
    }

    #[test]
    fn test_control_frames() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let (ws, th) = established(&mut engine);

        assert_eq!(engine.ping(ws).unwrap(), SendStatus::Sent(0));
        assert_eq!(engine.pong(ws).unwrap(), SendStatus::Sent(0));
        let wire = engine.transport_mut().take_sent(th);
        assert_eq!(&wire[..2], &[0x89, 0x80]);
        assert_eq!(&wire[2..6], &SEND_MASK);
        assert_eq!(&wire[6..8], &[0x8A, 0x80]);
        assert_eq!(wire.len(), 12);

        engine.close(ws).unwrap();
        let wire = engine.transport().sent(th);
        assert_eq!(&wire[..2], &[0x88, 0x80]);
        assert_eq!(wire.len(), 6);
    }

    #[test]
    fn test_close_clears_slot() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let (ws, th) = established(&mut engine);

        engine.close(ws).unwrap();
        let conn = engine.connection(ws).unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.send_mask(), 0);
        assert!(conn.transport_handle().is_none());
        assert!(!engine.transport().is_open(th));

        engine.close(ws).unwrap();
        assert_eq!(engine.transport().disconnect_count(), 1);
    }

    #[test]
    fn test_close_without_room_still_disconnects() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let (ws, th) = established(&mut engine);
        engine.transport_mut().set_tx_capacity(th, 4);

        engine.close(ws).unwrap();
        assert!(engine.transport().sent(th).is_empty());
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert_eq!(engine.transport().disconnect_count(), 1);
    }

    #[test]
    fn test_close_mid_handshake() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let ws = engine.open().unwrap();
        let request = request();
        engine.connect(ws, &request).unwrap();
        engine.connect(ws, &request).unwrap();
        engine.connect(ws, &request).unwrap();
        let th = engine.connection(ws).unwrap().transport_handle().unwrap();
        let request_bytes = engine.transport().sent(th).len();

        engine.close(ws).unwrap();
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert_eq!(engine.transport().sent(th).len(), request_bytes);
        assert_eq!(engine.transport().disconnect_count(), 1);
    }

    #[test]
    fn test_close_created_slot() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let ws = engine.open().unwrap();

        engine.close(ws).unwrap();
        assert_eq!(engine.state(ws).unwrap(), ConnectionState::Closed);
        assert_eq!(engine.transport().disconnect_count(), 0);
    }

    #[test]
    fn test_send_requires_established() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let ws = engine.open().unwrap();
        assert!(matches!(
            engine.send(ws, b"early"),
            Err(Error::InvalidState { state: ConnectionState::Created, .. })
        ));
        assert!(matches!(engine.ping(ws), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn test_unmasked_mode_sends_clear_payload() {
        let mut engine = engine::<1>(MemoryTransport::new());
        let ws = engine.open().unwrap();
        let request = request().with_masking(false);
        engine.connect(ws, &request).unwrap();
        let th = engine.connection(ws).unwrap().transport_handle().unwrap();
        engine
            .transport_mut()
            .deliver(th, crate::engine::tests::UPGRADE_RESPONSE);
        while !engine.connect(ws, &request).unwrap().is_established() {}
        engine.transport_mut().take_sent(th);

        engine.send(ws, b"abc").unwrap();
        assert_eq!(
            engine.transport().sent(th),
            &[0x82, 0x83, 0, 0, 0, 0, b'a', b'b', b'c']
        );
    }

    proptest! {
        #[test]
        fn prop_payload_survives_masking(payload in prop::collection::vec(any::<u8>(), 1..=1000)) {
            let mut engine = engine::<1>(MemoryTransport::new());
            let (ws, th) = established(&mut engine);

            prop_assert_eq!(engine.send(ws, &payload).unwrap(), SendStatus::Sent(payload.len()));
            let wire = engine.transport_mut().take_sent(th);
            let (head, decoded) = decode(&wire);
            prop_assert!(head.fin && head.masked);
            prop_assert_eq!(head.kind, FrameKind::Data);
            prop_assert_eq!(decoded, payload);
        }
    }
}
