// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Flush decisions for incoming events.
//!
//! The scheduler owns the [`EventBuffer`] and the coalescing window state and
//! decides, for every event, whether the previous window must be flushed.
//! It never performs I/O: callers receive an [`Outcome`] and hand any batch to
//! the dispatcher themselves.
//!
//! # Coalescing window
//!
//! ```text
//!   Idle ──event──> WindowOpen{start}
//!                     │  event, now - start <  time_frame  -> coalesce
//!                     │  event, now - start >= time_frame  -> flush previous, start = now
//!                     │  deadline (timer)                  -> flush, Idle
//! ```
//!
//! The boundary is inclusive: an event arriving exactly `time_frame` after the
//! window opened closes it and starts the next one.

use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::buffer::{Batch, EventBuffer};
use crate::constants::{DEFAULT_BATCHING_INTERVAL, DEFAULT_BATCHING_TIME_FRAME};
use crate::error::ConfigError;
use crate::event::LogEvent;

/// When buffered events are flushed.
///
/// Parses from `window[,<millis>]`, `interval[,<secs>]` or `immediate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchingPolicy {
    /// Coalesce events arriving within `time_frame` of the first one.
    Window { time_frame: Duration },
    /// Flush whatever is buffered every `every`.
    Interval { every: Duration },
    /// Send every event on its own.
    Immediate,
}

impl Default for BatchingPolicy {
    fn default() -> Self {
        BatchingPolicy::Window {
            time_frame: DEFAULT_BATCHING_TIME_FRAME,
        }
    }
}

impl FromStr for BatchingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let mut parts = normalized.splitn(2, ',').map(str::trim);
        let kind = parts.next().unwrap_or_default();
        let amount = parts
            .next()
            .map(|value| {
                value
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidBatching(s.to_string()))
            })
            .transpose()?;

        match (kind, amount) {
            ("window", None) => Ok(BatchingPolicy::default()),
            ("window", Some(ms)) => Ok(BatchingPolicy::Window {
                time_frame: Duration::from_millis(ms),
            }),
            ("interval", None) => Ok(BatchingPolicy::Interval {
                every: DEFAULT_BATCHING_INTERVAL,
            }),
            ("interval", Some(secs)) => Ok(BatchingPolicy::Interval {
                every: Duration::from_secs(secs),
            }),
            ("immediate", None) => Ok(BatchingPolicy::Immediate),
            _ => Err(ConfigError::InvalidBatching(s.to_string())),
        }
    }
}

impl BatchingPolicy {
    /// Rejects zero-length windows and intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            BatchingPolicy::Window { time_frame } if time_frame.is_zero() => Err(
                ConfigError::Invalid("batching window must be greater than 0".to_string()),
            ),
            BatchingPolicy::Interval { every } if every.is_zero() => Err(ConfigError::Invalid(
                "batching interval must be greater than 0".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// An in-progress coalescing period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchWindow {
    pub start: Instant,
    pub notice_emitted: bool,
}

impl BatchWindow {
    fn open(start: Instant) -> Self {
        Self {
            start,
            notice_emitted: false,
        }
    }
}

/// What the caller has to do after an event was offered.
#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
    /// A closed window (or single event) to render and send.
    pub flush: Option<Batch>,
    /// Send the one-time "events are being batched" notice.
    pub announce: bool,
    /// A new window started; the timer must pick up the new deadline.
    pub window_opened: bool,
    /// The event was stored or sent. `false` when the buffer was full or the
    /// scheduler is closed.
    pub accepted: bool,
}

#[derive(Debug)]
struct State {
    policy: BatchingPolicy,
    window: Option<BatchWindow>,
    closed: bool,
}

#[derive(Debug)]
pub struct Scheduler {
    buffer: EventBuffer,
    state: Mutex<State>,
    announce_batching: bool,
}

impl Scheduler {
    #[must_use]
    pub fn new(policy: BatchingPolicy, capacity: usize, announce_batching: bool) -> Self {
        Self {
            buffer: EventBuffer::new(capacity),
            state: Mutex::new(State {
                policy,
                window: None,
                closed: false,
            }),
            announce_batching,
        }
    }

    /// Offers an event that arrived at `now`.
    pub fn on_event(&self, event: LogEvent, now: Instant) -> Outcome {
        let mut state = self.lock();
        if state.closed {
            return Outcome::default();
        }

        let time_frame = match state.policy {
            BatchingPolicy::Immediate => {
                return Outcome {
                    flush: Some(Batch::single(event)),
                    accepted: true,
                    ..Outcome::default()
                };
            }
            BatchingPolicy::Interval { .. } => {
                return Outcome {
                    accepted: self.buffer.push(event),
                    ..Outcome::default()
                };
            }
            BatchingPolicy::Window { time_frame } => time_frame,
        };

        let mut outcome = Outcome::default();
        let expired = state
            .window
            .map(|window| now.saturating_duration_since(window.start) >= time_frame);
        match expired {
            None => {
                outcome.accepted = self.buffer.push(event);
                state.window = Some(BatchWindow::open(now));
                outcome.window_opened = true;
            }
            Some(true) => {
                let batch = self.buffer.drain();
                if !batch.is_empty() {
                    debug!("Window expired, flushing {} events", batch.len());
                    outcome.flush = Some(batch);
                }
                outcome.accepted = self.buffer.push(event);
                state.window = Some(BatchWindow::open(now));
                outcome.window_opened = true;
            }
            Some(false) => {
                outcome.accepted = self.buffer.push(event);
                if let Some(window) = state.window.as_mut() {
                    if self.announce_batching && !window.notice_emitted {
                        window.notice_emitted = true;
                        outcome.announce = true;
                    }
                }
            }
        }
        outcome
    }

    /// Flushes on behalf of the timer.
    ///
    /// For a window this only flushes once the window has expired and returns
    /// the scheduler to idle. For an interval it flushes whatever is buffered.
    pub fn on_deadline(&self, now: Instant) -> Option<Batch> {
        let mut state = self.lock();
        let batch = match state.policy {
            BatchingPolicy::Immediate => return None,
            BatchingPolicy::Interval { .. } => self.buffer.drain(),
            BatchingPolicy::Window { time_frame } => {
                let window = state.window?;
                if now.saturating_duration_since(window.start) < time_frame {
                    return None;
                }
                state.window = None;
                self.buffer.drain()
            }
        };
        (!batch.is_empty()).then_some(batch)
    }

    /// Instant at which the open window expires, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let state = self.lock();
        match (state.policy, state.window) {
            (BatchingPolicy::Window { time_frame }, Some(window)) => {
                Some(window.start + time_frame)
            }
            _ => None,
        }
    }

    /// Switches policy without losing buffered events.
    ///
    /// Switching to [`BatchingPolicy::Immediate`] returns the pending events so
    /// they can be sent right away. Switching to a window while events are
    /// pending opens a window starting `now` for them.
    pub fn set_policy(&self, policy: BatchingPolicy, now: Instant) -> Option<Batch> {
        let mut state = self.lock();
        state.policy = policy;
        match policy {
            BatchingPolicy::Immediate => {
                state.window = None;
                let batch = self.buffer.drain();
                (!batch.is_empty()).then_some(batch)
            }
            BatchingPolicy::Interval { .. } => {
                state.window = None;
                None
            }
            BatchingPolicy::Window { .. } => {
                if state.window.is_none() && !self.buffer.is_empty() {
                    state.window = Some(BatchWindow::open(now));
                }
                None
            }
        }
    }

    #[must_use]
    pub fn policy(&self) -> BatchingPolicy {
        self.lock().policy
    }

    #[must_use]
    pub fn window(&self) -> Option<BatchWindow> {
        self.lock().window
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Takes everything buffered now and ends the open window, if any.
    pub fn flush_pending(&self) -> Option<Batch> {
        let mut state = self.lock();
        state.window = None;
        let batch = self.buffer.drain();
        (!batch.is_empty()).then_some(batch)
    }

    /// Stops accepting events and returns everything still buffered.
    pub fn close(&self) -> Batch {
        let mut state = self.lock();
        state.closed = true;
        state.window = None;
        self.buffer.drain()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
