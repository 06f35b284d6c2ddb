//! Incremental frame receiver.
//!
//! The decoder position lives in the connection slot, so a frame may
//! arrive across any number of [`Engine::recv`] calls. Each sub-state
//! consumes its bytes only once all of them are buffered.
//!
//! | Sub-state | Needs | Next |
//! |-----------|-------|------|
//! | `AwaitHeader` | 2 bytes | `AwaitExtendedLength`, `AwaitMask` or `AwaitPayload` |
//! | `AwaitExtendedLength` | 2 bytes | `AwaitMask` or `AwaitPayload` |
//! | `AwaitMask` | 4 bytes | `AwaitPayload` |
//! | `AwaitPayload` | payload length | `AwaitHeader` |

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{SocketHandle, TransportHandle};
use crate::protocol::frame::{self, MASK_KEY_LEN};
use crate::protocol::{FrameHead, FrameKind, LengthCode};
use crate::transport::Transport;

use super::connection::RecvState;
use super::{Engine, RecvStatus};

// ============================================================================
// Step
// ============================================================================

/// Result of one decoder sub-state.
enum Step {
    /// Bytes were consumed; run the next sub-state.
    Continue,
    /// Stop and report to the caller.
    Done(RecvStatus),
}

// ============================================================================
// Engine - Receive
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    /// Makes as much progress on the inbound frame as buffered bytes allow.
    ///
    /// Returns after at most one complete frame. Ping frames are answered
    /// with a Pong before returning.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] / [`Error::Disconnected`] unless established
    /// - [`Error::Protocol`] for a fragmented frame; the connection is closed
    /// - [`Error::PayloadTooLarge`] for a frame above the configured
    ///   maximum; the connection becomes `Disconnected`
    /// - [`Error::BufferTooSmall`] if `buf` cannot hold the data payload;
    ///   nothing is consumed, retry with a larger buffer
    pub fn recv(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Result<RecvStatus> {
        let stream = self.ensure_established(handle)?;
        self.flush_owed_pong(handle, stream)?;

        loop {
            let step = match self.pool.get(handle)?.recv_state {
                RecvState::AwaitHeader => self.read_header(handle, stream)?,
                RecvState::AwaitExtendedLength => self.read_extended_length(handle, stream)?,
                RecvState::AwaitMask => self.read_mask(handle, stream)?,
                RecvState::AwaitPayload => self.read_payload(handle, stream, buf)?,
            };
            if let Step::Done(status) = step {
                return Ok(status);
            }
        }
    }
}

// ============================================================================
// Engine - Decoder Sub-states
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    fn read_header(&mut self, handle: SocketHandle, stream: TransportHandle) -> Result<Step> {
        let mut bytes = [0u8; 2];
        if !self.take_exact(stream, &mut bytes) {
            return Ok(Step::Done(RecvStatus::WouldBlock));
        }
        let head = FrameHead::parse(bytes);

        if !head.fin {
            warn!(%handle, "Fragmented frame received, closing");
            self.close(handle)?;
            return Err(Error::protocol("fragmented frames are not supported"));
        }
        if head.kind == FrameKind::Close {
            debug!(%handle, "Close frame received");
            self.close(handle)?;
            return Ok(Step::Done(RecvStatus::Closed));
        }

        let len = match head.length {
            LengthCode::Short(len) if len > self.config.max_payload => {
                return self.reject_oversize(handle, len);
            }
            LengthCode::Short(len) => Some(len),
            LengthCode::Extended16 => None,
            // A 64-bit length announces at least 65536 bytes.
            LengthCode::Extended64 => {
                return self.reject_oversize(handle, usize::from(u16::MAX) + 1);
            }
        };

        let conn = self.pool.get_mut(handle)?;
        conn.frame_kind = head.kind;
        conn.mask_present = head.masked;
        match len {
            Some(len) => {
                conn.pending_len = len;
                conn.recv_state = payload_or_mask(head.masked);
            }
            None => conn.recv_state = RecvState::AwaitExtendedLength,
        }
        trace!(%handle, kind = ?head.kind, masked = head.masked, ?len, "Frame header");
        Ok(Step::Continue)
    }

    fn read_extended_length(
        &mut self,
        handle: SocketHandle,
        stream: TransportHandle,
    ) -> Result<Step> {
        let mut bytes = [0u8; 2];
        if !self.take_exact(stream, &mut bytes) {
            return Ok(Step::Done(RecvStatus::WouldBlock));
        }

        let len = usize::from(u16::from_be_bytes(bytes));
        if len > self.config.max_payload {
            return self.reject_oversize(handle, len);
        }

        let conn = self.pool.get_mut(handle)?;
        conn.pending_len = len;
        conn.recv_state = payload_or_mask(conn.mask_present);
        Ok(Step::Continue)
    }

    fn read_mask(&mut self, handle: SocketHandle, stream: TransportHandle) -> Result<Step> {
        let mut bytes = [0u8; MASK_KEY_LEN];
        if !self.take_exact(stream, &mut bytes) {
            return Ok(Step::Done(RecvStatus::WouldBlock));
        }

        let conn = self.pool.get_mut(handle)?;
        conn.pending_mask = u32::from_be_bytes(bytes);
        conn.recv_state = RecvState::AwaitPayload;
        Ok(Step::Continue)
    }

    fn read_payload(
        &mut self,
        handle: SocketHandle,
        stream: TransportHandle,
        buf: &mut [u8],
    ) -> Result<Step> {
        let conn = self.pool.get(handle)?;
        let (kind, len, mask) = (conn.frame_kind, conn.pending_len, conn.pending_mask());

        if self.transport.get_ready(stream) < len {
            return Ok(Step::Done(RecvStatus::WouldBlock));
        }

        let status = match kind {
            FrameKind::Data => {
                if buf.len() < len {
                    return Err(Error::buffer_too_small(len, buf.len()));
                }
                let out = &mut buf[..len];
                let read = self.transport.get(stream, out);
                if read != len {
                    self.pool.get_mut(handle)?.fail();
                    warn!(%handle, read, len, "Short payload read");
                    return Err(Error::disconnected(handle));
                }
                if let Some(mask) = mask {
                    frame::apply_mask(out, frame::mask_key(mask));
                }
                self.pool.get_mut(handle)?.clear_frame();
                trace!(%handle, len, "Data frame received");
                RecvStatus::Data(len)
            }
            FrameKind::Ping => {
                self.transport.discard(stream, len);
                self.pool.get_mut(handle)?.clear_frame();
                debug!(%handle, len, "Ping received");
                self.reply_pong(handle, stream)?;
                RecvStatus::Ping
            }
            FrameKind::Pong => {
                self.transport.discard(stream, len);
                self.pool.get_mut(handle)?.clear_frame();
                debug!(%handle, len, "Pong received");
                RecvStatus::Pong
            }
            FrameKind::Close => {
                self.close(handle)?;
                RecvStatus::Closed
            }
        };
        Ok(Step::Done(status))
    }

    /// Reads exactly `buf.len()` bytes, or nothing when fewer are buffered.
    fn take_exact(&mut self, stream: TransportHandle, buf: &mut [u8]) -> bool {
        if self.transport.get_ready(stream) < buf.len() {
            return false;
        }
        self.transport.get(stream, buf) == buf.len()
    }

    /// Fails the connection over a frame too large for this engine.
    fn reject_oversize(&mut self, handle: SocketHandle, len: usize) -> Result<Step> {
        let max = self.config.max_payload;
        self.pool.get_mut(handle)?.fail();
        warn!(%handle, len, max, "Inbound frame too large");
        Err(Error::payload_too_large(len, max))
    }
}

#[inline]
const fn payload_or_mask(masked: bool) -> RecvState {
    if masked {
        RecvState::AwaitMask
    } else {
        RecvState::AwaitPayload
    }
}

// ============================================================================
// Tests
// ============================================================================
