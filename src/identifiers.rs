//! Type-safe handles for engine and transport resources.
//!
//! Newtype wrappers keep a pool slot index from being mixed up with a
//! transport-side stream id at compile time.
//!
//! | Type | Owner | Meaning |
//! |------|-------|---------|
//! | [`SocketHandle`] | [`Engine`](crate::Engine) | Index of a connection slot |
//! | [`TransportHandle`] | [`Transport`](crate::transport::Transport) | Opaque stream id |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// SocketHandle
// ============================================================================

/// Descriptor of one connection slot, returned by [`Engine::open`].
///
/// [`Engine::open`]: crate::Engine::open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketHandle(usize);

impl SocketHandle {
    /// Creates a handle for the given slot index.
    ///
    /// The engine validates the index on every call, so a handle built
    /// by hand for a slot that does not exist is rejected, not trusted.
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws#{}", self.0)
    }
}

// ============================================================================
// TransportHandle
// ============================================================================

/// Opaque reference to a stream owned by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportHandle(u32);

impl TransportHandle {
    /// Wraps a raw transport id.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw transport id.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp#{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
