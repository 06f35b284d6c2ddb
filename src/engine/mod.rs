//! The WebSocket client engine.
//!
//! An [`Engine`] owns a fixed pool of connection slots and the transport
//! they run on. Every public operation is non-blocking: it either
//! completes, fails with a fatal [`Error`], or returns a status telling
//! the caller to poll again.
//!
//! # Polling Model
//!
//! ```text
//! open() ──► connect() … connect() ──► Established
//!                                        │
//!                      ┌─────────────────┼────────────────┐
//!                      ▼                 ▼                ▼
//!                  send()/ping()      recv()           close()
//! ```
//!
//! Each operation first asks the disconnection monitor whether the
//! transport was reset; a reset forces the slot to `Closed`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`EngineBuilder`] |
//! | `connection` | Slot record and state enums |
//! | `handshake` | Opening handshake driver (`connect`) |
//! | `monitor` | Transport reset detection |
//! | `pool` | Fixed-capacity slot table |
//! | `receive` | Incremental frame decoder (`recv`) |
//! | `transmit` | Frame encoder (`send`, `send_text`, `ping`, `pong`, `close`) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::config::{EngineConfig, WEB_SOCKET_COUNT};
use crate::entropy::{KeySource, UuidKeySource};
use crate::error::{Error, Result};
use crate::identifiers::{SocketHandle, TransportHandle};
use crate::transport::Transport;

// ============================================================================
// Submodules
// ============================================================================

/// Fluent engine construction.
pub mod builder;

/// Connection slot record.
pub mod connection;

/// Opening handshake driver.
mod handshake;

/// Transport reset detection.
mod monitor;

/// Connection slot table.
pub mod pool;

/// Frame receiver.
mod receive;

/// Frame transmitter.
mod transmit;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::EngineBuilder;
pub use connection::{Connection, ConnectionState, RecvState};
pub use pool::ConnectionPool;

// ============================================================================
// Status Types
// ============================================================================

/// Progress reported by [`Engine::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// Transport connect still running; poll again.
    InProgress,
    /// Transport connected; the upgrade request is next. Poll again.
    ProceedToHandshake,
    /// Request sent; waiting for the response. Poll again.
    HandshakeInProgress,
    /// Handshake complete; frames may flow.
    Established,
}

impl ConnectStatus {
    /// Whether the connection is ready for frames.
    #[inline]
    #[must_use]
    pub const fn is_established(self) -> bool {
        matches!(self, Self::Established)
    }
}

/// Outcome of a frame write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Frame written and flushed; carries the payload length.
    Sent(usize),
    /// Not enough transmit space; nothing was written. Retry later.
    WouldBlock,
}

impl SendStatus {
    /// Payload bytes written, zero when blocked.
    #[inline]
    #[must_use]
    pub const fn written(self) -> usize {
        match self {
            Self::Sent(n) => n,
            Self::WouldBlock => 0,
        }
    }
}

/// Outcome of a receive poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    /// Not enough bytes for progress; nothing was produced. Poll again.
    WouldBlock,
    /// A data frame was copied into the caller's buffer, unmasked.
    Data(usize),
    /// A Ping was consumed and answered with a Pong.
    Ping,
    /// A Pong was consumed.
    Pong,
    /// The peer closed; the slot is `Closed` now.
    Closed,
}

impl RecvStatus {
    /// Payload bytes produced into the caller's buffer.
    #[inline]
    #[must_use]
    pub const fn produced(self) -> usize {
        match self {
            Self::Data(n) => n,
            _ => 0,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Client-side WebSocket engine over a polled transport.
///
/// `N` is the number of connection slots.
pub struct Engine<T: Transport, const N: usize = WEB_SOCKET_COUNT> {
    pool: ConnectionPool<N>,
    transport: T,
    keys: Box<dyn KeySource + Send>,
    config: EngineConfig,
}

impl<T: Transport, const N: usize> fmt::Debug for Engine<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Engine - Constructor
// ============================================================================

impl<T: Transport> Engine<T> {
    /// Creates a single-slot engine with default configuration and
    /// UUID-backed key material.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::from_parts(transport, EngineConfig::default(), Box::new(UuidKeySource))
    }
}

impl<T: Transport, const N: usize> Engine<T, N> {
    /// Starts building an engine over `transport`.
    #[inline]
    #[must_use]
    pub fn builder(transport: T) -> EngineBuilder<T, N> {
        EngineBuilder::new(transport)
    }

    pub(crate) fn from_parts(
        transport: T,
        config: EngineConfig,
        keys: Box<dyn KeySource + Send>,
    ) -> Self {
        Self {
            pool: ConnectionPool::new(),
            transport,
            keys,
            config,
        }
    }
}

// ============================================================================
// Engine - Public API
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    /// Allocates a connection slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDescriptor`] when every slot is in use. Existing
    /// connections are left untouched.
    pub fn open(&mut self) -> Result<SocketHandle> {
        self.pool.allocate().ok_or_else(|| Error::no_descriptor(N))
    }

    /// State of the connection behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if the handle is out of range.
    pub fn state(&self, handle: SocketHandle) -> Result<ConnectionState> {
        Ok(self.pool.get(handle)?.state)
    }

    /// Read-only view of the connection behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if the handle is out of range.
    pub fn connection(&self, handle: SocketHandle) -> Result<&Connection> {
        self.pool.get(handle)
    }

    /// The slot table.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ConnectionPool<N> {
        &self.pool
    }

    /// The engine configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably.
    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

// ============================================================================
// Engine - Internal Helpers
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    /// Transport handle of a slot that must hold one.
    fn stream(&self, handle: SocketHandle) -> Result<TransportHandle> {
        let conn = self.pool.get(handle)?;
        conn.transport
            .ok_or_else(|| Error::invalid_state(handle, conn.state))
    }

    /// Requires `Established`, then consults the disconnection monitor.
    fn ensure_established(&mut self, handle: SocketHandle) -> Result<TransportHandle> {
        match self.pool.get(handle)?.state {
            ConnectionState::Established => {}
            ConnectionState::Disconnected => return Err(Error::disconnected(handle)),
            state => return Err(Error::invalid_state(handle, state)),
        }
        self.ensure_live(handle)?;
        self.stream(handle)
    }
}

// ============================================================================
// Tests
// ============================================================================
