//! Fixed-capacity table of connection slots.
//!
//! The capacity is a compile-time constant. A slot leaves
//! [`ConnectionState::Closed`] only through [`ConnectionPool::allocate`]
//! and becomes reusable again once a close path releases it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        ConnectionPool<N>                │
//! │  ┌─────────────────────────────────┐    │
//! │  │ ws#0 → Connection (Established) │    │
//! │  │ ws#1 → Connection (Closed)      │    │
//! │  │ ...                             │    │
//! │  │ ws#N-1 → Connection (Created)   │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::array;

use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::SocketHandle;

use super::connection::{Connection, ConnectionState};

// ============================================================================
// ConnectionPool
// ============================================================================

/// Arena of `N` connection slots addressed by [`SocketHandle`].
#[derive(Debug, Clone)]
pub struct ConnectionPool<const N: usize> {
    slots: [Connection; N],
}

impl<const N: usize> Default for ConnectionPool<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ConnectionPool - Public API
// ============================================================================

impl<const N: usize> ConnectionPool<N> {
    /// Creates a pool with every slot closed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: array::from_fn(|_| Connection::default()),
        }
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of slots not in `Closed`.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state != ConnectionState::Closed)
            .count()
    }

    /// Claims the first closed slot.
    ///
    /// The slot is reset (no mask, receiver at frame start) and moved to
    /// `Created`. Returns `None` when every slot is taken.
    pub fn allocate(&mut self) -> Option<SocketHandle> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.state == ConnectionState::Closed)?;

        self.slots[index].allocate();
        let handle = SocketHandle::new(index);
        debug!(%handle, "Socket allocated");
        Some(handle)
    }

    /// Returns the slot behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if the index is out of range.
    pub fn get(&self, handle: SocketHandle) -> Result<&Connection> {
        self.slots
            .get(handle.index())
            .ok_or_else(|| Error::invalid_handle(handle, N))
    }

    /// Returns the slot behind `handle` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if the index is out of range.
    pub(crate) fn get_mut(&mut self, handle: SocketHandle) -> Result<&mut Connection> {
        self.slots
            .get_mut(handle.index())
            .ok_or_else(|| Error::invalid_handle(handle, N))
    }
}

// ============================================================================
// Tests
// ============================================================================
