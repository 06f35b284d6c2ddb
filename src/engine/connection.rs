//! Per-slot connection record.
//!
//! A [`Connection`] is owned by its pool slot for the slot's whole life;
//! allocation resets it and every close path returns it to
//! [`ConnectionState::Closed`].
//!
//! # Lifecycle
//!
//! ```text
//! Closed ─open─► Created ─► TcpInProgress ─► HandshakeSendRequest
//!   ▲                                              │
//!   │                          HandshakeAwaitStatus ◄┘
//!   │                                  │
//!   │                          HandshakeSkipHeaders ─► Established
//!   │                                                      │
//!   └────────── close / abort / reset ◄── Disconnected ◄───┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::TransportHandle;
use crate::protocol::FrameKind;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Free slot.
    #[default]
    Closed,
    /// Allocated, no transport yet.
    Created,
    /// Transport connect issued, not yet connected.
    TcpInProgress,
    /// Connected, upgrade request not yet written.
    HandshakeSendRequest,
    /// Request written, waiting for the status line.
    HandshakeAwaitStatus,
    /// Status accepted, discarding response headers.
    HandshakeSkipHeaders,
    /// Frames may flow.
    Established,
    /// Failed; the transport handle is held until the caller closes.
    Disconnected,
}

impl ConnectionState {
    /// Whether the state belongs to the opening handshake.
    #[inline]
    #[must_use]
    pub const fn is_handshaking(self) -> bool {
        matches!(
            self,
            Self::TcpInProgress
                | Self::HandshakeSendRequest
                | Self::HandshakeAwaitStatus
                | Self::HandshakeSkipHeaders
        )
    }
}

// ============================================================================
// RecvState
// ============================================================================

/// Position of the frame receiver within the current inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecvState {
    /// Waiting for the two fixed header bytes.
    #[default]
    AwaitHeader,
    /// Waiting for the 16-bit extended length.
    AwaitExtendedLength,
    /// Waiting for the 4-byte masking key.
    AwaitMask,
    /// Waiting for the whole payload.
    AwaitPayload,
}

// ============================================================================
// Connection
// ============================================================================

/// State of one pool slot.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    pub(crate) state: ConnectionState,
    pub(crate) transport: Option<TransportHandle>,
    pub(crate) send_mask: u32,
    pub(crate) timer: u32,
    pub(crate) recv_state: RecvState,
    pub(crate) pending_len: usize,
    pub(crate) pending_mask: u32,
    pub(crate) mask_present: bool,
    pub(crate) frame_kind: FrameKind,
    pub(crate) pong_owed: bool,
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Transport stream held by this slot, if any.
    #[inline]
    #[must_use]
    pub fn transport_handle(&self) -> Option<TransportHandle> {
        self.transport
    }

    /// Masking key applied to outbound frames.
    #[inline]
    #[must_use]
    pub fn send_mask(&self) -> u32 {
        self.send_mask
    }

    /// Receiver position within the current inbound frame.
    #[inline]
    #[must_use]
    pub fn recv_state(&self) -> RecvState {
        self.recv_state
    }

    /// Payload length of the frame being received.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending_len
    }

    /// Masking key of the frame being received, if it carries one.
    #[inline]
    #[must_use]
    pub fn pending_mask(&self) -> Option<u32> {
        self.mask_present.then_some(self.pending_mask)
    }

    /// Classification of the frame being received.
    #[inline]
    #[must_use]
    pub fn frame_kind(&self) -> FrameKind {
        self.frame_kind
    }

    /// Whether a Pong reply is waiting for transmit space.
    #[inline]
    #[must_use]
    pub fn pong_owed(&self) -> bool {
        self.pong_owed
    }
}

// ============================================================================
// Connection - Transitions
// ============================================================================

impl Connection {
    /// Claims a free slot.
    pub(crate) fn allocate(&mut self) {
        *self = Self {
            state: ConnectionState::Created,
            ..Self::default()
        };
    }

    /// Forgets the frame being received.
    pub(crate) fn clear_frame(&mut self) {
        self.recv_state = RecvState::AwaitHeader;
        self.pending_len = 0;
        self.pending_mask = 0;
        self.mask_present = false;
        self.frame_kind = FrameKind::Data;
    }

    /// Returns the slot to `Closed` and hands back the transport handle,
    /// which the caller must disconnect or close.
    pub(crate) fn release(&mut self) -> Option<TransportHandle> {
        let transport = self.transport.take();
        *self = Self::default();
        transport
    }

    /// Marks the connection failed, keeping the transport handle for `close`.
    pub(crate) fn fail(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.pong_owed = false;
        self.clear_frame();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_closed() {
        let conn = Connection::default();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.recv_state(), RecvState::AwaitHeader);
        assert!(conn.transport_handle().is_none());
    }

    #[test]
    fn test_allocate_resets() {
        let mut conn = Connection {
            send_mask: 0xDEAD_BEEF,
            recv_state: RecvState::AwaitPayload,
            pending_len: 9,
            ..Connection::default()
        };
        conn.allocate();
        assert_eq!(conn.state(), ConnectionState::Created);
        assert_eq!(conn.send_mask(), 0);
        assert_eq!(conn.recv_state(), RecvState::AwaitHeader);
        assert_eq!(conn.pending_len(), 0);
    }

    #[test]
    fn test_release_returns_handle() {
        let mut conn = Connection::default();
        conn.allocate();
        conn.transport = Some(TransportHandle::from_raw(4));
        conn.send_mask = 7;
        conn.timer = 99;

        assert_eq!(conn.release(), Some(TransportHandle::from_raw(4)));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.send_mask(), 0);
        assert_eq!(conn.timer, 0);
        assert_eq!(conn.release(), None);
    }

    #[test]
    fn test_fail_keeps_handle() {
        let mut conn = Connection::default();
        conn.allocate();
        conn.transport = Some(TransportHandle::from_raw(1));
        conn.recv_state = RecvState::AwaitMask;
        conn.mask_present = true;

        conn.fail();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.transport_handle().is_some());
        assert_eq!(conn.recv_state(), RecvState::AwaitHeader);
        assert_eq!(conn.pending_mask(), None);
    }

    #[test]
    fn test_handshaking_states() {
        assert!(ConnectionState::TcpInProgress.is_handshaking());
        assert!(ConnectionState::HandshakeSkipHeaders.is_handshaking());
        assert!(!ConnectionState::Established.is_handshaking());
        assert!(!ConnectionState::Created.is_handshaking());
    }
}
