//! Radio power trace
//!
//! Keeps the most recent radio on/off transitions with their timestamps, so
//! the duty cycle can be inspected on a running node.

use circular_queue::CircularQueue;

use crate::time::Ticks;

pub const TRACE_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    RadioOn,
    RadioOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    pub at: Ticks,
    pub kind: TraceKind,
}

pub struct Trace {
    events: CircularQueue<TraceEvent>,
}

impl Trace {
    pub fn new() -> Self {
        Self::with_capacity(TRACE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: CircularQueue::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, at: Ticks, kind: TraceKind) {
        self.events.push(TraceEvent { at, kind });
    }

    /// Events from the oldest to the newest.
    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.asc_iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}
