//! Stateless wire formats.
//!
//! Everything here is a pure function over bytes; connection state lives
//! in [`engine`](crate::engine).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Frame header layout, opcodes, masking |
//! | `handshake` | Upgrade request rendering, status-line check |

// ============================================================================
// Submodules
// ============================================================================

/// Frame header layout and masking.
pub mod frame;

/// Opening handshake request and response helpers.
pub mod handshake;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{FrameHead, FrameKind, LengthCode, OpCode};
