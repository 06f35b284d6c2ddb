//! Engine configuration and per-connection requests.
//!
//! [`EngineConfig`] holds the limits shared by every connection of an
//! engine. [`ConnectRequest`] describes one connection attempt and is
//! supplied to every [`Engine::connect`](crate::Engine::connect) poll.
//!
//! # Example
//!
//! ```
//! use picows::{ConnectRequest, EngineConfig};
//!
//! let config = EngineConfig::new().with_handshake_timeout_ms(2_000);
//! assert_eq!(config.handshake_timeout_ms, 2_000);
//!
//! let request = ConnectRequest::from_url("ws://192.168.1.20:8080/feed").unwrap();
//! assert!(request.host_is_address);
//! assert_eq!(request.port, 8080);
//! assert_eq!(request.uri, "/feed");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Number of connection slots in the default engine.
pub const WEB_SOCKET_COUNT: usize = 1;

/// Largest payload this engine sends or accepts.
pub const MAX_PAYLOAD: usize = 1000;

/// Default handshake timeout in milliseconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5_000;

/// Default minimum free transmit space before the upgrade request is written.
pub const DEFAULT_REQUEST_RESERVE: usize = 125;

/// Port used when a `ws://` URL carries none.
const DEFAULT_WS_PORT: u16 = 80;

// ============================================================================
// EngineConfig
// ============================================================================

/// Limits shared by every connection of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time allowed for the server's handshake response.
    pub handshake_timeout_ms: u64,

    /// Payload limit for both directions. May be lowered below
    /// [`MAX_PAYLOAD`], never raised above it.
    pub max_payload: usize,

    /// Free transmit space required before the upgrade request is written.
    pub request_reserve: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Creates a configuration with default limits.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            max_payload: MAX_PAYLOAD,
            request_reserve: DEFAULT_REQUEST_RESERVE,
        }
    }

    /// Parses and validates a JSON configuration.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document does not parse
    /// - [`Error::Config`] if a value is out of range
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the handshake timeout in milliseconds.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.handshake_timeout_ms = timeout_ms;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(self, timeout: Duration) -> Self {
        self.with_handshake_timeout_ms(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    }

    /// Sets the payload limit.
    #[inline]
    #[must_use]
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Sets the transmit space required before writing the upgrade request.
    #[inline]
    #[must_use]
    pub fn with_request_reserve(mut self, reserve: usize) -> Self {
        self.request_reserve = reserve;
        self
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.handshake_timeout_ms == 0 {
            return Err(Error::config("handshake_timeout_ms must be greater than 0"));
        }
        if self.max_payload == 0 || self.max_payload > MAX_PAYLOAD {
            return Err(Error::config(format!(
                "max_payload must be within 1..={MAX_PAYLOAD}, got {}",
                self.max_payload
            )));
        }
        Ok(())
    }

    /// Converts the handshake timeout into transport ticks.
    pub(crate) fn handshake_timeout_ticks(&self, ticks_per_second: u32) -> u32 {
        let ticks = self
            .handshake_timeout_ms
            .saturating_mul(u64::from(ticks_per_second))
            / 1000;
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}

// ============================================================================
// ConnectRequest
// ============================================================================

/// Parameters of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Host name, or literal IP address when `host_is_address` is set.
    pub host: String,

    /// Whether `host` is a literal address rather than a name to resolve.
    pub host_is_address: bool,

    /// Remote TCP port.
    pub port: u16,

    /// Resource path sent in the request line.
    pub uri: String,

    /// Request a secure (`wss`) transport. Always rejected.
    pub secure: bool,

    /// Draw a random masking key for outbound frames. When clear, frames
    /// still carry the mask bit but with an all-zero key.
    pub masking: bool,
}

impl ConnectRequest {
    /// Creates a plain request for a named host.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, uri: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            host_is_address: false,
            port,
            uri: uri.into(),
            secure: false,
            masking: true,
        }
    }

    /// Parses a `ws://` or `wss://` URL.
    ///
    /// Literal IPv4/IPv6 hosts are flagged as addresses. `wss://` yields a
    /// request with `secure` set, which the engine refuses at connect time.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the text is not a URL
    /// - [`Error::Config`] if the scheme is not `ws`/`wss` or the host is missing
    pub fn from_url(text: &str) -> Result<Self> {
        let url = Url::parse(text)?;

        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => {
                return Err(Error::config(format!(
                    "unsupported URL scheme {other:?}, expected ws or wss"
                )));
            }
        };

        let (host, host_is_address) = match url.host() {
            Some(Host::Domain(name)) => (name.to_owned(), false),
            Some(Host::Ipv4(ip)) => (ip.to_string(), true),
            Some(Host::Ipv6(ip)) => (ip.to_string(), true),
            None => return Err(Error::config(format!("URL has no host: {text}"))),
        };

        let port = url.port_or_known_default().unwrap_or(DEFAULT_WS_PORT);

        let mut uri = url.path().to_owned();
        if let Some(query) = url.query() {
            uri.push('?');
            uri.push_str(query);
        }

        Ok(Self {
            host,
            host_is_address,
            port,
            uri,
            secure,
            masking: true,
        })
    }

    /// Marks the host as a literal IP address.
    #[inline]
    #[must_use]
    pub fn with_address(mut self) -> Self {
        self.host_is_address = true;
        self
    }

    /// Requests a secure transport.
    #[inline]
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Enables or disables random outbound masking keys.
    #[inline]
    #[must_use]
    pub fn with_masking(mut self, masking: bool) -> Self {
        self.masking = masking;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
