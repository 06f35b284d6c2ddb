//! Randomness for handshake keys and outbound masking keys.
//!
//! The engine never picks key material on its own; it draws from an
//! injected [`KeySource`]. [`UuidKeySource`] is the default.
//! [`FixedKeySource`] replays caller-provided bytes for deterministic
//! tests.

// ============================================================================
// Imports
// ============================================================================

use uuid::Uuid;

// ============================================================================
// KeySource
// ============================================================================

/// Supplier of key material.
pub trait KeySource {
    /// Fills `dest` with key bytes.
    fn fill(&mut self, dest: &mut [u8]);

    /// Draws a 32-bit value, most significant byte first.
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill(&mut bytes);
        u32::from_be_bytes(bytes)
    }
}

// ============================================================================
// UuidKeySource
// ============================================================================

/// Draws bytes from random (v4) UUIDs.
///
/// Each UUID contributes 16 bytes of which 122 bits are random; the
/// version and variant bits are fixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidKeySource;

impl KeySource for UuidKeySource {
    fn fill(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(16) {
            let id = Uuid::new_v4();
            chunk.copy_from_slice(&id.as_bytes()[..chunk.len()]);
        }
    }
}

// ============================================================================
// FixedKeySource
// ============================================================================

/// Replays a fixed byte sequence, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct FixedKeySource {
    bytes: Vec<u8>,
    pos: usize,
}

impl FixedKeySource {
    /// Creates a source replaying `bytes`. An empty sequence yields zeros.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            pos: 0,
        }
    }

    /// Creates a source that always yields zero bytes.
    #[inline]
    #[must_use]
    pub fn zeros() -> Self {
        Self::new(Vec::new())
    }
}

impl KeySource for FixedKeySource {
    fn fill(&mut self, dest: &mut [u8]) {
        if self.bytes.is_empty() {
            dest.fill(0);
            return;
        }
        for byte in dest.iter_mut() {
            *byte = self.bytes[self.pos];
            self.pos = (self.pos + 1) % self.bytes.len();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
