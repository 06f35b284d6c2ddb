//! Transport reset detection.
//!
//! Consulted at the start of every operation that touches the transport.
//! A reset forces the slot straight to `Closed`; a later explicit
//! `close` on that handle is a no-op success.

// ============================================================================
// Imports
// ============================================================================

use tracing::warn;

use crate::error::{Error, Result};
use crate::identifiers::SocketHandle;
use crate::transport::Transport;

use super::Engine;
use super::connection::ConnectionState;

// ============================================================================
// Disconnection
// ============================================================================

/// Verdict of the disconnection monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disconnection {
    /// The connection had already failed before this call.
    AlreadyHandled,
    /// A reset was detected now; the slot has been closed.
    Handled,
    /// No reset; the operation may proceed.
    NotHandled,
}

// ============================================================================
// Engine - Monitor
// ============================================================================

impl<T: Transport, const N: usize> Engine<T, N> {
    /// Checks the slot's transport for an externally initiated reset.
    ///
    /// Has no side effects when it reports [`Disconnection::NotHandled`].
    pub(crate) fn check_disconnect(&mut self, handle: SocketHandle) -> Result<Disconnection> {
        let conn = self.pool.get(handle)?;
        if conn.state == ConnectionState::Disconnected {
            return Ok(Disconnection::AlreadyHandled);
        }
        let Some(stream) = conn.transport else {
            return Ok(Disconnection::NotHandled);
        };
        if !self.transport.was_reset(stream) {
            return Ok(Disconnection::NotHandled);
        }

        let state = conn.state;
        self.transport.close(stream);
        self.pool.get_mut(handle)?.release();
        warn!(%handle, %stream, ?state, "Transport reset by peer, socket closed");
        Ok(Disconnection::Handled)
    }

    /// Runs the monitor and turns any disconnection into an error.
    pub(crate) fn ensure_live(&mut self, handle: SocketHandle) -> Result<()> {
        match self.check_disconnect(handle)? {
            Disconnection::NotHandled => Ok(()),
            Disconnection::Handled | Disconnection::AlreadyHandled => {
                Err(Error::disconnected(handle))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
