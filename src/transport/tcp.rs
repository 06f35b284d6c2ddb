//! tokio-backed TCP transport.
//!
//! Connecting runs as a spawned task on the given runtime; everything
//! else is non-blocking `try_read`/`try_write` into bounded FIFOs, so the
//! engine can be polled from any thread while the runtime's reactor
//! keeps socket readiness up to date.
//!
//! # Example
//!
//! ```no_run
//! use picows::transport::TcpTransport;
//! use picows::{ConnectRequest, Engine};
//!
//! # async fn example() -> picows::Result<()> {
//! let mut engine = Engine::new(TcpTransport::current()?);
//! let ws = engine.open()?;
//! let request = ConnectRequest::from_url("ws://127.0.0.1:9001/")?;
//! picows::driver::connect(&mut engine, ws, &request).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::TransportHandle;

use super::{Remote, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Default inbound FIFO size.
pub const DEFAULT_RX_CAPACITY: usize = 2048;

/// Default outbound FIFO size.
pub const DEFAULT_TX_CAPACITY: usize = 2048;

/// Ticks per second of the millisecond clock.
const TICKS_PER_SECOND: u32 = 1000;

/// Scratch size for a single `try_read`.
const READ_CHUNK: usize = 512;

// ============================================================================
// Types
// ============================================================================

/// Outcome of a spawned connect task, filled in when it finishes.
type ConnectSlot = Arc<Mutex<Option<std::io::Result<TcpStream>>>>;

enum Link {
    Pending(ConnectSlot),
    Open(TcpStream),
    Failed,
}

struct Stream {
    link: Link,
    rx: VecDeque<u8>,
    rx_capacity: usize,
    tx: Vec<u8>,
    tx_capacity: usize,
    eof: bool,
    reset: bool,
}

impl Stream {
    fn tx_free(&self) -> usize {
        self.tx_capacity.saturating_sub(self.tx.len())
    }

    fn rx_free(&self) -> usize {
        self.rx_capacity.saturating_sub(self.rx.len())
    }
}

// ============================================================================
// TcpTransport
// ============================================================================

/// [`Transport`] over tokio TCP streams.
pub struct TcpTransport {
    runtime: Handle,
    streams: FxHashMap<TransportHandle, Stream>,
    next_id: u32,
    epoch: Instant,
    rx_capacity: usize,
    tx_capacity: usize,
}

// ============================================================================
// TcpTransport - Constructor
// ============================================================================

impl TcpTransport {
    /// Creates a transport spawning connect tasks on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            streams: FxHashMap::default(),
            next_id: 1,
            epoch: Instant::now(),
            rx_capacity: DEFAULT_RX_CAPACITY,
            tx_capacity: DEFAULT_TX_CAPACITY,
        }
    }

    /// Creates a transport on the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when called outside a tokio runtime.
    pub fn current() -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("TcpTransport needs a tokio runtime: {e}")))?;
        Ok(Self::new(runtime))
    }

    /// Sets FIFO sizes for streams opened afterwards.
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, rx_capacity: usize, tx_capacity: usize) -> Self {
        self.rx_capacity = rx_capacity;
        self.tx_capacity = tx_capacity;
        self
    }

    /// Number of streams currently held.
    #[inline]
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

// ============================================================================
// TcpTransport - Pumping
// ============================================================================

impl TcpTransport {
    /// Moves a finished connect outcome into the stream.
    fn settle(stream: &mut Stream, handle: TransportHandle) {
        let Link::Pending(slot) = &stream.link else {
            return;
        };
        let Some(outcome) = slot.lock().take() else {
            return;
        };
        match outcome {
            Ok(tcp) => {
                debug!(%handle, "TCP connected");
                stream.link = Link::Open(tcp);
            }
            Err(e) => {
                warn!(%handle, error = %e, "TCP connect failed");
                stream.link = Link::Failed;
                stream.reset = true;
            }
        }
    }

    /// Reads what the socket has into the inbound FIFO and writes what
    /// the outbound FIFO holds, without blocking.
    fn pump(&mut self, handle: TransportHandle) {
        let Some(stream) = self.streams.get_mut(&handle) else {
            return;
        };
        Self::settle(stream, handle);

        let Link::Open(tcp) = &stream.link else {
            return;
        };

        let mut chunk = [0u8; READ_CHUNK];
        while !stream.eof && stream.rx_free() > 0 {
            let want = READ_CHUNK.min(stream.rx_free());
            match tcp.try_read(&mut chunk[..want]) {
                Ok(0) => {
                    debug!(%handle, "TCP peer closed");
                    stream.eof = true;
                }
                Ok(n) => {
                    trace!(%handle, n, "TCP read");
                    stream.rx.extend(&chunk[..n]);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(%handle, error = %e, "TCP read failed");
                    stream.reset = true;
                    break;
                }
            }
        }

        Self::drain_tx(tcp, &mut stream.tx, &mut stream.reset, handle);
    }

    fn drain_tx(tcp: &TcpStream, tx: &mut Vec<u8>, reset: &mut bool, handle: TransportHandle) {
        while !tx.is_empty() {
            match tcp.try_write(tx) {
                Ok(0) => break,
                Ok(n) => {
                    trace!(%handle, n, "TCP write");
                    tx.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(%handle, error = %e, "TCP write failed");
                    *reset = true;
                    break;
                }
            }
        }
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for TcpTransport {
    fn open(&mut self, remote: Remote<'_>, port: u16) -> Option<TransportHandle> {
        let handle = TransportHandle::from_raw(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let slot: ConnectSlot = Arc::new(Mutex::new(None));
        let task_slot = Arc::clone(&slot);

        match remote {
            Remote::Address(ip) => {
                let addr = SocketAddr::new(ip, port);
                self.runtime.spawn(async move {
                    let outcome = TcpStream::connect(addr).await;
                    *task_slot.lock() = Some(outcome);
                });
            }
            Remote::Name(name) => {
                let host = name.to_owned();
                self.runtime.spawn(async move {
                    let outcome = TcpStream::connect((host.as_str(), port)).await;
                    *task_slot.lock() = Some(outcome);
                });
            }
        }

        debug!(%handle, %remote, port, "TCP connect started");

        self.streams.insert(
            handle,
            Stream {
                link: Link::Pending(slot),
                rx: VecDeque::with_capacity(self.rx_capacity),
                rx_capacity: self.rx_capacity,
                tx: Vec::with_capacity(self.tx_capacity),
                tx_capacity: self.tx_capacity,
                eof: false,
                reset: false,
            },
        );

        Some(handle)
    }

    fn is_connected(&mut self, handle: TransportHandle) -> bool {
        self.pump(handle);
        self.streams
            .get(&handle)
            .is_some_and(|stream| matches!(stream.link, Link::Open(_)) && !stream.reset)
    }

    fn was_reset(&mut self, handle: TransportHandle) -> bool {
        self.pump(handle);
        self.streams
            .get(&handle)
            .is_some_and(|stream| stream.reset || (stream.eof && stream.rx.is_empty()))
    }

    fn put_ready(&mut self, handle: TransportHandle) -> usize {
        self.pump(handle);
        self.streams.get(&handle).map_or(0, Stream::tx_free)
    }

    fn put(&mut self, handle: TransportHandle, bytes: &[u8]) -> usize {
        let Some(stream) = self.streams.get_mut(&handle) else {
            return 0;
        };
        if !matches!(stream.link, Link::Open(_)) {
            return 0;
        }
        let n = bytes.len().min(stream.tx_free());
        stream.tx.extend_from_slice(&bytes[..n]);
        n
    }

    fn flush(&mut self, handle: TransportHandle) {
        if let Some(stream) = self.streams.get_mut(&handle)
            && let Link::Open(tcp) = &stream.link
        {
            Self::drain_tx(tcp, &mut stream.tx, &mut stream.reset, handle);
        }
    }

    fn get_ready(&mut self, handle: TransportHandle) -> usize {
        self.pump(handle);
        self.streams.get(&handle).map_or(0, |stream| stream.rx.len())
    }

    fn get(&mut self, handle: TransportHandle, buf: &mut [u8]) -> usize {
        let Some(stream) = self.streams.get_mut(&handle) else {
            return 0;
        };
        let n = buf.len().min(stream.rx.len());
        for (slot, byte) in buf.iter_mut().zip(stream.rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn discard(&mut self, handle: TransportHandle, len: usize) -> usize {
        let Some(stream) = self.streams.get_mut(&handle) else {
            return 0;
        };
        let n = len.min(stream.rx.len());
        stream.rx.drain(..n);
        n
    }

    fn find(&mut self, handle: TransportHandle, byte: u8) -> Option<usize> {
        self.pump(handle);
        self.streams
            .get(&handle)
            .and_then(|stream| stream.rx.iter().position(|&b| b == byte))
    }

    fn rx_free(&mut self, handle: TransportHandle) -> usize {
        self.streams.get(&handle).map_or(0, Stream::rx_free)
    }

    fn disconnect(&mut self, handle: TransportHandle) {
        self.flush(handle);
        let Some(stream) = self.streams.remove(&handle) else {
            return;
        };
        if let Link::Open(tcp) = stream.link {
            match tcp.into_std() {
                Ok(std_stream) => {
                    if let Err(e) = std_stream.shutdown(Shutdown::Both) {
                        trace!(%handle, error = %e, "TCP shutdown failed");
                    }
                }
                Err(e) => trace!(%handle, error = %e, "TCP deregister failed"),
            }
        }
        debug!(%handle, "TCP disconnected");
    }

    fn close(&mut self, handle: TransportHandle) {
        if self.streams.remove(&handle).is_some() {
            debug!(%handle, "TCP closed");
        }
    }

    fn now(&self) -> u32 {
        // Truncation makes the counter wrap, which tick arithmetic expects.
        self.epoch.elapsed().as_millis() as u32
    }

    fn ticks_per_second(&self) -> u32 {
        TICKS_PER_SECOND
    }
}

// ============================================================================
// Tests
// ============================================================================
