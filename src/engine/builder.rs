//! Builder pattern for engine configuration.
//!
//! Provides a fluent API for configuring and creating [`Engine`] instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use picows::transport::MemoryTransport;
//! use picows::{Engine, FixedKeySource};
//!
//! # fn example() -> picows::Result<()> {
//! let engine = Engine::<_, 4>::builder(MemoryTransport::new())
//!     .handshake_timeout(Duration::from_secs(2))
//!     .key_source(FixedKeySource::zeros())
//!     .build()?;
//! assert_eq!(engine.pool().capacity(), 4);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::config::EngineConfig;
use crate::entropy::{KeySource, UuidKeySource};
use crate::error::{Error, Result};
use crate::transport::Transport;

use super::Engine;

// ============================================================================
// EngineBuilder
// ============================================================================

/// Builder for configuring an [`Engine`] instance.
///
/// Use [`Engine::builder()`] to create a new builder.
pub struct EngineBuilder<T: Transport, const N: usize> {
    /// Transport the engine drives.
    transport: T,
    /// Limits and timeouts.
    config: EngineConfig,
    /// Key material source, UUID-backed when unset.
    keys: Option<Box<dyn KeySource + Send>>,
}

// ============================================================================
// EngineBuilder Implementation
// ============================================================================

impl<T: Transport, const N: usize> EngineBuilder<T, N> {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: EngineConfig::default(),
            keys: None,
        }
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the opening handshake deadline.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_handshake_timeout(timeout);
        self
    }

    /// Sets the largest payload accepted in either direction.
    #[inline]
    #[must_use]
    pub fn max_payload(mut self, max_payload: usize) -> Self {
        self.config = self.config.with_max_payload(max_payload);
        self
    }

    /// Sets the source of handshake keys and send masks.
    ///
    /// # Arguments
    ///
    /// * `keys` - Any [`KeySource`]; use [`crate::FixedKeySource`] for
    ///   reproducible wire bytes
    #[inline]
    #[must_use]
    pub fn key_source(mut self, keys: impl KeySource + Send + 'static) -> Self {
        self.keys = Some(Box::new(keys));
        self
    }

    /// Builds the engine with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the pool has no slots
    /// - [`Error::Config`] if a configured limit is unusable
    pub fn build(self) -> Result<Engine<T, N>> {
        if N == 0 {
            return Err(Error::config(
                "Connection pool needs at least one slot.\n\
                 Example: Engine::<_, 1>::builder(transport)",
            ));
        }
        self.config.validate()?;

        let keys = self.keys.unwrap_or_else(|| Box::new(UuidKeySource));
        Ok(Engine::from_parts(self.transport, self.config, keys))
    }
}

// ============================================================================
// Tests
// ============================================================================
