//! Non-blocking byte-stream transport consumed by the engine.
//!
//! The engine never blocks and never owns sockets itself. Every stream
//! operation goes through the [`Transport`] trait, which mirrors what a
//! small embedded TCP/IP stack offers: readiness queries, byte FIFOs with
//! find/peek, graceful disconnect, reset detection and a tick counter.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   Transport trait   ┌──────────────────────┐
//! │ Engine           │────────────────────►│ MemoryTransport      │
//! │  pool + slots    │                     │  (simulation/tests)  │
//! │  handshake       │                     ├──────────────────────┤
//! │  tx / rx         │                     │ TcpTransport (tokio) │
//! └──────────────────┘                     └──────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | Deterministic in-memory transport with a manual clock |
//! | `tcp` | tokio-backed TCP transport with bounded FIFOs |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::IpAddr;

use crate::identifiers::TransportHandle;

// ============================================================================
// Submodules
// ============================================================================

/// In-memory simulated transport.
pub mod memory;

/// tokio-backed TCP transport.
pub mod tcp;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

// ============================================================================
// Remote
// ============================================================================

/// Destination of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remote<'a> {
    /// Literal address, no resolution needed.
    Address(IpAddr),
    /// Host name the transport resolves itself.
    Name(&'a str),
}

impl fmt::Display for Remote<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(ip) => write!(f, "{ip}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Non-blocking stream primitives.
///
/// No method may block. Queries that need fresh data from the network
/// take `&mut self` so implementations can pump their buffers.
pub trait Transport {
    /// Starts connecting to `remote:port`.
    ///
    /// A returned handle does not mean the stream is connected; poll
    /// [`Transport::is_connected`]. Returns `None` if no stream can be opened.
    fn open(&mut self, remote: Remote<'_>, port: u16) -> Option<TransportHandle>;

    /// Whether the stream finished connecting.
    fn is_connected(&mut self, handle: TransportHandle) -> bool;

    /// Whether the peer reset or dropped the stream.
    fn was_reset(&mut self, handle: TransportHandle) -> bool;

    /// Free space in the outbound buffer.
    fn put_ready(&mut self, handle: TransportHandle) -> usize;

    /// Queues bytes for sending and returns how many were accepted.
    fn put(&mut self, handle: TransportHandle, bytes: &[u8]) -> usize;

    /// Pushes queued outbound bytes onto the wire.
    fn flush(&mut self, handle: TransportHandle);

    /// Bytes available to read.
    fn get_ready(&mut self, handle: TransportHandle) -> usize;

    /// Reads up to `buf.len()` bytes and returns how many were read.
    fn get(&mut self, handle: TransportHandle, buf: &mut [u8]) -> usize;

    /// Drops up to `len` buffered inbound bytes and returns how many went.
    fn discard(&mut self, handle: TransportHandle, len: usize) -> usize;

    /// Offset of the next `byte` in the inbound buffer, without consuming.
    fn find(&mut self, handle: TransportHandle, byte: u8) -> Option<usize>;

    /// Free space in the inbound buffer.
    fn rx_free(&mut self, handle: TransportHandle) -> usize;

    /// Gracefully closes the stream and invalidates the handle.
    fn disconnect(&mut self, handle: TransportHandle);

    /// Drops the stream without a graceful shutdown and invalidates the handle.
    fn close(&mut self, handle: TransportHandle);

    /// Current value of the monotonic tick counter. Wraps around.
    fn now(&self) -> u32;

    /// Ticks per second of [`Transport::now`].
    fn ticks_per_second(&self) -> u32;

    /// Reads a single byte.
    fn get_byte(&mut self, handle: TransportHandle) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.get(handle, &mut byte) == 1).then_some(byte[0])
    }
}

// ============================================================================
// Tests
// ============================================================================
