//! Error types for the WebSocket engine.
//!
//! Only fatal conditions are errors. "Not ready yet" outcomes are
//! first-class variants of [`ConnectStatus`], [`SendStatus`] and
//! [`RecvStatus`] and never surface here.
//!
//! [`ConnectStatus`]: crate::engine::ConnectStatus
//! [`SendStatus`]: crate::engine::SendStatus
//! [`RecvStatus`]: crate::engine::RecvStatus
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Handle | [`Error::InvalidHandle`], [`Error::NoDescriptor`], [`Error::InvalidState`] |
//! | Transport | [`Error::TransportOpen`], [`Error::TransportFault`], [`Error::Disconnected`], [`Error::InvalidAddress`] |
//! | Handshake | [`Error::HandshakeTimeout`], [`Error::HandshakeRejected`], [`Error::HandshakeOverflow`] |
//! | Framing | [`Error::Protocol`], [`Error::PayloadTooLarge`], [`Error::BufferTooSmall`], [`Error::Unsupported`] |
//! | Configuration | [`Error::Config`], [`Error::Json`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::engine::ConnectionState;
use crate::identifiers::SocketHandle;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Handle Errors
    // ========================================================================
    /// Handle does not address a slot of this engine.
    #[error("Invalid socket handle: {handle} (capacity {capacity})")]
    InvalidHandle {
        /// The rejected handle.
        handle: SocketHandle,
        /// Number of slots in the pool.
        capacity: usize,
    },

    /// Every pool slot is in use.
    #[error("No socket descriptor available (capacity {capacity})")]
    NoDescriptor {
        /// Number of slots in the pool.
        capacity: usize,
    },

    /// Operation is not allowed in the connection's current state.
    #[error("Operation not allowed on {handle} in state {state:?}")]
    InvalidState {
        /// Connection the operation targeted.
        handle: SocketHandle,
        /// State the connection was in.
        state: ConnectionState,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The transport refused to open a stream.
    #[error("Transport open failed: {host}:{port}")]
    TransportOpen {
        /// Host that was requested.
        host: String,
        /// Port that was requested.
        port: u16,
    },

    /// A write failed after the transport confirmed buffer space.
    #[error("Transport fault on {handle}: wrote {written} of {expected} bytes")]
    TransportFault {
        /// Connection whose write failed.
        handle: SocketHandle,
        /// Bytes the transport accepted.
        written: usize,
        /// Bytes that should have been accepted.
        expected: usize,
    },

    /// The peer reset the stream, or the connection already failed.
    #[error("Connection {handle} disconnected")]
    Disconnected {
        /// Connection that was lost.
        handle: SocketHandle,
    },

    /// The request flagged the host as a literal address but it does not parse.
    #[error("Invalid host address: {host}")]
    InvalidAddress {
        /// The unparsable host text.
        host: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// No complete handshake response arrived in time.
    #[error("Handshake timeout after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Configured handshake timeout.
        timeout_ms: u64,
    },

    /// The server answered with something other than `101`.
    #[error("Handshake rejected with status {status:?}")]
    HandshakeRejected {
        /// Status token from the response line.
        status: String,
    },

    /// The receive buffer filled up before a line terminator arrived.
    #[error("Handshake response overflowed the receive buffer")]
    HandshakeOverflow,

    // ========================================================================
    // Framing Errors
    // ========================================================================
    /// Protocol violation by the peer.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// Payload exceeds what this engine supports.
    #[error("Payload of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Offending payload length.
        len: usize,
        /// Maximum supported payload length.
        max: usize,
    },

    /// Caller buffer cannot hold the pending payload. Nothing was consumed.
    #[error("Receive buffer too small: need {needed}, have {available}")]
    BufferTooSmall {
        /// Bytes the pending frame carries.
        needed: usize,
        /// Bytes the caller offered.
        available: usize,
    },

    /// Requested feature is not implemented.
    #[error("Unsupported: {feature}")]
    Unsupported {
        /// Name of the feature.
        feature: &'static str,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid engine configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// JSON configuration could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection URL could not be parsed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid handle error.
    #[inline]
    pub fn invalid_handle(handle: SocketHandle, capacity: usize) -> Self {
        Self::InvalidHandle { handle, capacity }
    }

    /// Creates a pool exhaustion error.
    #[inline]
    pub fn no_descriptor(capacity: usize) -> Self {
        Self::NoDescriptor { capacity }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(handle: SocketHandle, state: ConnectionState) -> Self {
        Self::InvalidState { handle, state }
    }

    /// Creates a transport open error.
    #[inline]
    pub fn transport_open(host: impl Into<String>, port: u16) -> Self {
        Self::TransportOpen {
            host: host.into(),
            port,
        }
    }

    /// Creates a transport fault error.
    #[inline]
    pub fn transport_fault(handle: SocketHandle, written: usize, expected: usize) -> Self {
        Self::TransportFault {
            handle,
            written,
            expected,
        }
    }

    /// Creates a disconnected error.
    #[inline]
    pub fn disconnected(handle: SocketHandle) -> Self {
        Self::Disconnected { handle }
    }

    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(host: impl Into<String>) -> Self {
        Self::InvalidAddress { host: host.into() }
    }

    /// Creates a handshake timeout error.
    #[inline]
    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::HandshakeTimeout { timeout_ms }
    }

    /// Creates a handshake rejection error.
    #[inline]
    pub fn handshake_rejected(status: impl Into<String>) -> Self {
        Self::HandshakeRejected {
            status: status.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a payload too large error.
    #[inline]
    pub fn payload_too_large(len: usize, max: usize) -> Self {
        Self::PayloadTooLarge { len, max }
    }

    /// Creates a buffer too small error.
    #[inline]
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Self::BufferTooSmall { needed, available }
    }

    /// Creates an unsupported feature error.
    #[inline]
    pub fn unsupported(feature: &'static str) -> Self {
        Self::Unsupported { feature }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::HandshakeTimeout { .. })
    }

    /// Returns `true` if the peer violated the framing rules.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::PayloadTooLarge { .. }
        )
    }

    /// Returns `true` if the connection cannot be used any further.
    ///
    /// Such a connection has either been forced to `Closed` already or
    /// waits in `Disconnected` for the caller to `close` it. A rejected
    /// operation on a `Closed` or `Disconnected` slot counts too.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidState {
                state: ConnectionState::Closed | ConnectionState::Disconnected,
                ..
            } | Self::TransportOpen { .. }
                | Self::TransportFault { .. }
                | Self::Disconnected { .. }
                | Self::InvalidAddress { .. }
                | Self::HandshakeTimeout { .. }
                | Self::HandshakeRejected { .. }
                | Self::HandshakeOverflow
                | Self::Protocol { .. }
                | Self::PayloadTooLarge { .. }
                | Self::Unsupported { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
