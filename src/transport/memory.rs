//! In-memory transport for simulation and tests.
//!
//! Each opened stream is a pair of bounded FIFOs. The test (or a host-side
//! simulator) plays the server: it delivers inbound bytes, inspects what
//! the engine flushed, injects resets and advances the tick counter.
//!
//! # Example
//!
//! ```
//! use picows::transport::{MemoryTransport, Remote, Transport};
//!
//! let mut transport = MemoryTransport::new();
//! let handle = transport.open(Remote::Name("example.org"), 80).unwrap();
//! assert!(transport.is_connected(handle));
//!
//! transport.deliver(handle, b"hi");
//! assert_eq!(transport.get_ready(handle), 2);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::identifiers::TransportHandle;

use super::{Remote, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Default inbound FIFO size.
pub const DEFAULT_RX_CAPACITY: usize = 1024;

/// Default outbound FIFO size.
pub const DEFAULT_TX_CAPACITY: usize = 1024;

/// Default tick rate of the manual clock.
pub const DEFAULT_TICKS_PER_SECOND: u32 = 1000;

/// Closed streams whose wire bytes stay inspectable, oldest dropped first.
pub const RETIRED_LIMIT: usize = 16;

// ============================================================================
// OpenRecord
// ============================================================================

/// A stream the engine asked to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRecord {
    /// Handle handed back to the engine.
    pub handle: TransportHandle,
    /// Destination as text.
    pub remote: String,
    /// Destination port.
    pub port: u16,
}

// ============================================================================
// Pipe
// ============================================================================

#[derive(Debug)]
struct Pipe {
    rx: VecDeque<u8>,
    rx_capacity: usize,
    tx: Vec<u8>,
    tx_capacity: usize,
    wire: Vec<u8>,
    polls_until_connected: usize,
    reset: bool,
    write_budget: Option<usize>,
    read_budget: Option<usize>,
}

impl Pipe {
    fn tx_free(&self) -> usize {
        self.tx_capacity.saturating_sub(self.tx.len())
    }

    fn rx_free(&self) -> usize {
        self.rx_capacity.saturating_sub(self.rx.len())
    }
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// Deterministic [`Transport`] backed by in-memory FIFOs and a manual clock.
#[derive(Debug)]
pub struct MemoryTransport {
    pipes: FxHashMap<TransportHandle, Pipe>,
    retired: VecDeque<(TransportHandle, Vec<u8>)>,
    next_id: u32,
    tick: u32,
    ticks_per_second: u32,
    rx_capacity: usize,
    tx_capacity: usize,
    connect_delay: usize,
    refuse_open: bool,
    queued_inbound: Vec<u8>,
    opened: Vec<OpenRecord>,
    disconnects: usize,
    closes: usize,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTransport - Constructor
// ============================================================================

impl MemoryTransport {
    /// Creates a transport with default FIFO sizes whose streams connect
    /// on the first poll.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipes: FxHashMap::default(),
            retired: VecDeque::new(),
            next_id: 1,
            tick: 0,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            rx_capacity: DEFAULT_RX_CAPACITY,
            tx_capacity: DEFAULT_TX_CAPACITY,
            connect_delay: 0,
            refuse_open: false,
            queued_inbound: Vec::new(),
            opened: Vec::new(),
            disconnects: 0,
            closes: 0,
        }
    }

    /// Sets FIFO sizes for streams opened afterwards.
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, rx_capacity: usize, tx_capacity: usize) -> Self {
        self.rx_capacity = rx_capacity;
        self.tx_capacity = tx_capacity;
        self
    }

    /// Sets how many `is_connected` polls report `false` before connecting.
    #[inline]
    #[must_use]
    pub fn with_connect_delay(mut self, polls: usize) -> Self {
        self.connect_delay = polls;
        self
    }

    /// Sets the clock rate.
    #[inline]
    #[must_use]
    pub fn with_ticks_per_second(mut self, ticks_per_second: u32) -> Self {
        self.ticks_per_second = ticks_per_second;
        self
    }

    /// Starts the clock at `tick`.
    #[inline]
    #[must_use]
    pub fn with_start_tick(mut self, tick: u32) -> Self {
        self.tick = tick;
        self
    }
}

// ============================================================================
// MemoryTransport - Peer Controls
// ============================================================================

impl MemoryTransport {
    /// Makes subsequent `open` calls fail.
    pub fn set_refuse_open(&mut self, refuse: bool) {
        self.refuse_open = refuse;
    }

    /// Queues bytes that the next opened stream starts with in its inbound FIFO.
    pub fn queue_inbound(&mut self, bytes: &[u8]) {
        self.queued_inbound.extend_from_slice(bytes);
    }

    /// Delivers bytes from the peer, as many as fit. Returns the count.
    pub fn deliver(&mut self, handle: TransportHandle, bytes: &[u8]) -> usize {
        let Some(pipe) = self.pipes.get_mut(&handle) else {
            return 0;
        };
        let n = bytes.len().min(pipe.rx_free());
        pipe.rx.extend(&bytes[..n]);
        trace!(%handle, n, "Delivered inbound bytes");
        n
    }

    /// Bytes flushed onto the wire so far. Still readable after the
    /// stream was disconnected or closed.
    #[must_use]
    pub fn sent(&self, handle: TransportHandle) -> &[u8] {
        match self.pipes.get(&handle) {
            Some(pipe) => pipe.wire.as_slice(),
            None => self
                .retired
                .iter()
                .find(|(retired, _)| *retired == handle)
                .map_or(&[][..], |(_, wire)| wire.as_slice()),
        }
    }

    /// Takes and clears the bytes flushed onto the wire.
    pub fn take_sent(&mut self, handle: TransportHandle) -> Vec<u8> {
        if let Some(pipe) = self.pipes.get_mut(&handle) {
            return std::mem::take(&mut pipe.wire);
        }
        let index = self.retired.iter().position(|(retired, _)| *retired == handle);
        index
            .and_then(|index| self.retired.remove(index))
            .map(|(_, wire)| wire)
            .unwrap_or_default()
    }

    /// Bytes queued but not yet flushed.
    #[must_use]
    pub fn unflushed(&self, handle: TransportHandle) -> &[u8] {
        self.pipes.get(&handle).map_or(&[][..], |pipe| pipe.tx.as_slice())
    }

    /// Bytes waiting in the inbound FIFO.
    #[must_use]
    pub fn rx_len(&self, handle: TransportHandle) -> usize {
        self.pipes.get(&handle).map_or(0, |pipe| pipe.rx.len())
    }

    /// Simulates a reset by the peer.
    pub fn reset(&mut self, handle: TransportHandle) {
        if let Some(pipe) = self.pipes.get_mut(&handle) {
            pipe.reset = true;
        }
    }

    /// Changes the outbound FIFO size of an open stream.
    pub fn set_tx_capacity(&mut self, handle: TransportHandle, capacity: usize) {
        if let Some(pipe) = self.pipes.get_mut(&handle) {
            pipe.tx_capacity = capacity;
        }
    }

    /// Lets only `bytes` more bytes be accepted by `put`, even when space
    /// is reported. Simulates a transport fault.
    pub fn fail_writes_after(&mut self, handle: TransportHandle, bytes: usize) {
        if let Some(pipe) = self.pipes.get_mut(&handle) {
            pipe.write_budget = Some(bytes);
        }
    }

    /// Lets only `bytes` more bytes be returned by `get`, even when more
    /// are buffered. Simulates a misbehaving receive path.
    pub fn fail_reads_after(&mut self, handle: TransportHandle, bytes: usize) {
        if let Some(pipe) = self.pipes.get_mut(&handle) {
            pipe.read_budget = Some(bytes);
        }
    }

    /// Number of closed streams still holding their wire bytes.
    #[inline]
    #[must_use]
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    fn retire(&mut self, handle: TransportHandle, wire: Vec<u8>) {
        if self.retired.len() == RETIRED_LIMIT {
            self.retired.pop_front();
        }
        self.retired.push_back((handle, wire));
    }

    /// Advances the clock.
    pub fn advance(&mut self, ticks: u32) {
        self.tick = self.tick.wrapping_add(ticks);
    }

    /// Whether the handle still refers to an open stream.
    #[must_use]
    pub fn is_open(&self, handle: TransportHandle) -> bool {
        self.pipes.contains_key(&handle)
    }

    /// Every open request received, oldest first.
    #[must_use]
    pub fn opened(&self) -> &[OpenRecord] {
        &self.opened
    }

    /// Handle of the most recently opened stream.
    #[must_use]
    pub fn last_handle(&self) -> Option<TransportHandle> {
        self.opened.last().map(|record| record.handle)
    }

    /// Number of graceful disconnects performed.
    #[inline]
    #[must_use]
    pub fn disconnect_count(&self) -> usize {
        self.disconnects
    }

    /// Number of hard closes performed.
    #[inline]
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for MemoryTransport {
    fn open(&mut self, remote: Remote<'_>, port: u16) -> Option<TransportHandle> {
        if self.refuse_open {
            return None;
        }

        let handle = TransportHandle::from_raw(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let mut rx = VecDeque::with_capacity(self.rx_capacity);
        let queued = std::mem::take(&mut self.queued_inbound);
        let n = queued.len().min(self.rx_capacity);
        rx.extend(&queued[..n]);

        self.pipes.insert(
            handle,
            Pipe {
                rx,
                rx_capacity: self.rx_capacity,
                tx: Vec::with_capacity(self.tx_capacity),
                tx_capacity: self.tx_capacity,
                wire: Vec::new(),
                polls_until_connected: self.connect_delay,
                reset: false,
                write_budget: None,
                read_budget: None,
            },
        );
        self.opened.push(OpenRecord {
            handle,
            remote: remote.to_string(),
            port,
        });

        Some(handle)
    }

    fn is_connected(&mut self, handle: TransportHandle) -> bool {
        let Some(pipe) = self.pipes.get_mut(&handle) else {
            return false;
        };
        if pipe.reset {
            return false;
        }
        if pipe.polls_until_connected > 0 {
            pipe.polls_until_connected -= 1;
            return false;
        }
        true
    }

    fn was_reset(&mut self, handle: TransportHandle) -> bool {
        self.pipes.get(&handle).is_some_and(|pipe| pipe.reset)
    }

    fn put_ready(&mut self, handle: TransportHandle) -> usize {
        self.pipes.get(&handle).map_or(0, Pipe::tx_free)
    }

    fn put(&mut self, handle: TransportHandle, bytes: &[u8]) -> usize {
        let Some(pipe) = self.pipes.get_mut(&handle) else {
            return 0;
        };
        let mut n = bytes.len().min(pipe.tx_free());
        if let Some(budget) = pipe.write_budget.as_mut() {
            n = n.min(*budget);
            *budget -= n;
        }
        pipe.tx.extend_from_slice(&bytes[..n]);
        n
    }

    fn flush(&mut self, handle: TransportHandle) {
        if let Some(pipe) = self.pipes.get_mut(&handle) {
            pipe.wire.append(&mut pipe.tx);
        }
    }

    fn get_ready(&mut self, handle: TransportHandle) -> usize {
        self.rx_len(handle)
    }

    fn get(&mut self, handle: TransportHandle, buf: &mut [u8]) -> usize {
        let Some(pipe) = self.pipes.get_mut(&handle) else {
            return 0;
        };
        let mut n = buf.len().min(pipe.rx.len());
        if let Some(budget) = pipe.read_budget.as_mut() {
            n = n.min(*budget);
            *budget -= n;
        }
        for (slot, byte) in buf.iter_mut().zip(pipe.rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn discard(&mut self, handle: TransportHandle, len: usize) -> usize {
        let Some(pipe) = self.pipes.get_mut(&handle) else {
            return 0;
        };
        let n = len.min(pipe.rx.len());
        pipe.rx.drain(..n);
        n
    }

    fn find(&mut self, handle: TransportHandle, byte: u8) -> Option<usize> {
        self.pipes
            .get(&handle)
            .and_then(|pipe| pipe.rx.iter().position(|&b| b == byte))
    }

    fn rx_free(&mut self, handle: TransportHandle) -> usize {
        self.pipes.get(&handle).map_or(0, Pipe::rx_free)
    }

    fn disconnect(&mut self, handle: TransportHandle) {
        if let Some(mut pipe) = self.pipes.remove(&handle) {
            pipe.wire.append(&mut pipe.tx);
            self.retire(handle, pipe.wire);
            self.disconnects += 1;
            trace!(%handle, "Memory stream disconnected");
        }
    }

    fn close(&mut self, handle: TransportHandle) {
        if let Some(pipe) = self.pipes.remove(&handle) {
            self.retire(handle, pipe.wire);
            self.closes += 1;
            trace!(%handle, "Memory stream closed");
        }
    }

    fn now(&self) -> u32 {
        self.tick
    }

    fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }
}

// ============================================================================
// Tests
// ============================================================================
