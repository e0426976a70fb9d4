//! Counters shared by every stream of one plugin instance.
//!
//! A plugin instance runs on a single thread and the host delivers one event
//! at a time, so plain `Cell`s behind an `Rc` are enough.

use std::cell::Cell;

#[derive(Debug, Default)]
pub struct Counters {
    requests: Cell<u64>,
    ticks: Cell<u64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the request counter and returns the new value.
    pub fn next_request(&self) -> u64 {
        let next = self.requests.get() + 1;
        self.requests.set(next);
        next
    }

    pub fn requests(&self) -> u64 {
        self.requests.get()
    }

    /// Records one timer firing.
    pub fn tick(&self) {
        self.ticks.set(self.ticks.get() + 1);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }
}
