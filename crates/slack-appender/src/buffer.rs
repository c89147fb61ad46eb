// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded holding area for events waiting to be flushed.
//!
//! Producers push from any thread while the timer task drains. Both operations
//! take the same short-lived lock and never perform I/O while holding it, so
//! a drain is atomic: an event is either in the drained batch or stays for the
//! next one.
//!
//! When the buffer is full, new events are dropped (not the oldest ones) and
//! only counted. The count travels with the next drained batch so the
//! rendered message can say how many events were left out.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::event::{LogEvent, Severity};

/// Events drained from the buffer in one go.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    pub events: Vec<LogEvent>,
    /// Events dropped by overflow since the previous drain.
    pub dropped: usize,
}

impl Batch {
    #[must_use]
    pub fn single(event: LogEvent) -> Self {
        Self {
            events: vec![event],
            dropped: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Highest severity in the batch.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.events.iter().map(LogEvent::severity).max()
    }
}

#[derive(Debug, Default)]
struct State {
    events: VecDeque<LogEvent>,
    dropped: usize,
}

#[derive(Debug)]
pub struct EventBuffer {
    state: Mutex<State>,
    capacity: usize,
}

impl EventBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                events: VecDeque::with_capacity(capacity),
                dropped: 0,
            }),
            capacity,
        }
    }

    /// Appends `event` unless the buffer is full.
    ///
    /// Returns `false` when the event was dropped.
    pub fn push(&self, event: LogEvent) -> bool {
        let mut state = self.lock();
        if state.events.len() >= self.capacity {
            state.dropped += 1;
            return false;
        }
        state.events.push_back(event);
        true
    }

    /// Takes every buffered event and resets the overflow count.
    pub fn drain(&self) -> Batch {
        let mut state = self.lock();
        let dropped = std::mem::take(&mut state.dropped);
        Batch {
            events: state.events.drain(..).collect(),
            dropped,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic while holding this lock cannot leave the queue half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
