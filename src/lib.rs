//! picows - Polled client-side WebSocket engine.
//!
//! This library implements the client side of RFC6455 on top of a
//! non-blocking, polled byte-stream transport, the kind a small embedded
//! TCP/IP stack offers.
//!
//! # Architecture
//!
//! The engine is sans-IO: it never blocks and never owns a socket.
//!
//! - **Engine**: fixed pool of connection slots, each with its own state machine
//! - **Transport**: trait the engine polls for stream readiness and bytes
//! - **Driver**: optional tokio helpers that run the poll loop for you
//!
//! Key design principles:
//!
//! - Every operation returns promptly with a result or a "poll again" status
//! - Connection state lives in the slot, so any call may resume where the last stopped
//! - Transport resets are detected on every operation and close the slot
//! - Single unfragmented frames of at most [`MAX_PAYLOAD`] bytes
//!
//! # Quick Start
//!
//! ```no_run
//! use picows::transport::TcpTransport;
//! use picows::{ConnectRequest, Engine, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut engine = Engine::new(TcpTransport::current()?);
//!     let ws = engine.open()?;
//!
//!     // Drive the opening handshake
//!     let request = ConnectRequest::from_url("ws://192.168.1.20:8080/feed")?;
//!     picows::driver::connect(&mut engine, ws, &request).await?;
//!
//!     // Exchange frames
//!     picows::driver::send(&mut engine, ws, b"hello").await?;
//!     let mut buf = [0u8; 1000];
//!     if let Some(n) = picows::driver::recv_message(&mut engine, ws, &mut buf).await? {
//!         println!("received {n} bytes");
//!     }
//!
//!     engine.close(ws)
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`EngineConfig`] limits and [`ConnectRequest`] |
//! | [`driver`] | Async poll loops over the engine |
//! | [`engine`] | [`Engine`], connection pool and state machines |
//! | [`entropy`] | Key material for handshake keys and send masks |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe handle wrappers |
//! | [`protocol`] | Frame and handshake codecs |
//! | [`transport`] | [`Transport`] trait, in-memory and TCP implementations |

// ============================================================================
// Modules
// ============================================================================

/// Engine limits and connection requests.
pub mod config;

/// Async polling helpers.
///
/// Requires a tokio runtime.
pub mod driver;

/// The WebSocket client engine.
///
/// Use [`Engine::new`] or [`Engine::builder`] to create one.
pub mod engine;

/// Key material sources.
pub mod entropy;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for sockets and transport streams.
pub mod identifiers;

/// RFC6455 frame and handshake codecs.
pub mod protocol;

/// Non-blocking stream transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{ConnectRequest, EngineConfig, MAX_PAYLOAD, WEB_SOCKET_COUNT};

// Engine types
pub use engine::{
    ConnectStatus, Connection, ConnectionState, Engine, EngineBuilder, RecvState, RecvStatus,
    SendStatus,
};

// Key material
pub use entropy::{FixedKeySource, KeySource, UuidKeySource};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{SocketHandle, TransportHandle};

// Transport types
pub use transport::{Remote, Transport};
