//! Append-only line buffer with a drain cursor and probe cursors.
//!
//! Every line pushed by the output pump is retained in arrival order and
//! read through cursors instead of being removed and put back:
//!
//! - The classification drain owns one cursor and receives each line
//!   exactly once, in arrival order.
//! - A command/response probe pins a transient cursor while it holds the
//!   probe lock and reads windows of lines without consuming them.
//!
//! A line is evicted only once the drain has passed it and no probe cursor
//! still points at or before it.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard, Notify};

/// A single output line and its arrival sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    seq: u64,
    text: String,
}

impl LineRecord {
    /// Arrival order, starting at 0 for the first line ever pushed.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The line text, without its trailing newline.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the record, returning the line text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Debug, Default)]
struct BusState {
    /// Retained lines. `lines[i].seq == first_seq + i`.
    lines: VecDeque<LineRecord>,
    first_seq: u64,
    next_seq: u64,
    drain_seq: u64,
    probe_seq: Option<u64>,
}

impl BusState {
    fn get(&self, seq: u64) -> Option<&LineRecord> {
        let index = usize::try_from(seq.checked_sub(self.first_seq)?).ok()?;
        self.lines.get(index)
    }

    fn window(&self, from: u64, max: usize) -> Vec<LineRecord> {
        let start = usize::try_from(from.saturating_sub(self.first_seq))
            .unwrap_or(usize::MAX)
            .min(self.lines.len());
        self.lines.range(start..).take(max).cloned().collect()
    }

    fn evict(&mut self) {
        let floor = self
            .probe_seq
            .map_or(self.drain_seq, |probe| probe.min(self.drain_seq));
        while self.first_seq < floor && self.lines.pop_front().is_some() {
            self.first_seq += 1;
        }
    }
}

/// Single-producer, multi-reader buffer of output lines.
#[derive(Debug, Default)]
pub struct LineBus {
    state: Mutex<BusState>,
    probe_lock: AsyncMutex<()>,
    arrived: Notify,
}

impl LineBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and wake the drain. Returns the line's sequence number.
    pub fn push(&self, text: impl Into<String>) -> u64 {
        let seq = {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.lines.push_back(LineRecord {
                seq,
                text: text.into(),
            });
            seq
        };
        self.arrived.notify_waiters();
        seq
    }

    /// Take the oldest unclassified line without waiting.
    pub fn try_next_line(&self) -> Option<LineRecord> {
        let mut state = self.state.lock();
        let record = state.get(state.drain_seq)?.clone();
        state.drain_seq += 1;
        state.evict();
        Some(record)
    }

    /// Wait for and take the oldest unclassified line.
    ///
    /// Each line is returned exactly once across all callers, in arrival
    /// order. An empty buffer is retried after the next push.
    pub async fn next_line(&self) -> LineRecord {
        loop {
            let arrived = self.arrived.notified();
            if let Some(record) = self.try_next_line() {
                return record;
            }
            arrived.await;
        }
    }

    /// Read up to `max` of the oldest unclassified lines without consuming them.
    #[must_use]
    pub fn peek(&self, max: usize) -> Vec<LineRecord> {
        let state = self.state.lock();
        state.window(state.drain_seq, max)
    }

    /// Number of lines not yet taken by the drain.
    #[must_use]
    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        usize::try_from(state.next_seq - state.drain_seq).unwrap_or(usize::MAX)
    }

    /// Number of lines currently held in memory.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.state.lock().lines.len()
    }

    /// Acquire the probe lock and pin a cursor at the oldest unclassified line.
    ///
    /// Only one probe exists at a time; concurrent callers queue here. The
    /// drain keeps running while a probe is held, but pinned lines are not
    /// evicted until the guard is dropped.
    pub async fn lock_probe(&self) -> ProbeGuard<'_> {
        let lock = self.probe_lock.lock().await;
        let cursor = {
            let mut state = self.state.lock();
            let cursor = state.drain_seq;
            state.probe_seq = Some(cursor);
            cursor
        };
        tracing::trace!(cursor, "Probe cursor pinned");
        ProbeGuard {
            bus: self,
            cursor,
            _lock: lock,
        }
    }
}

/// Exclusive command/response window over a [`LineBus`].
#[must_use = "dropping the guard releases the probe lock"]
#[derive(Debug)]
pub struct ProbeGuard<'a> {
    bus: &'a LineBus,
    cursor: u64,
    _lock: MutexGuard<'a, ()>,
}

impl ProbeGuard<'_> {
    /// Sequence number the probe window starts at.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Read up to `max` lines from the pinned cursor without consuming them.
    ///
    /// Returns fewer lines when fewer are buffered; never blocks.
    #[must_use]
    pub fn peek(&self, max: usize) -> Vec<LineRecord> {
        self.bus.state.lock().window(self.cursor, max)
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.bus.state.lock();
        state.probe_seq = None;
        state.evict();
    }
}
