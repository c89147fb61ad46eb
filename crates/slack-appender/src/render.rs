// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns a drained [`Batch`] into the text of one chat message.
//!
//! Every event is rendered and cut to the per-event limit, the entries are
//! joined in arrival order under a batching notice, and the result is fitted
//! to the per-message limit. The message-level cut keeps whole entries and
//! replaces the rest with a marker carrying the number of left out events:
//!
//! ```text
//! 3 log events batched:
//! ERROR app - first failure
//! ERROR app - second failure..
//! .. and 2 more
//! ```
//!
//! Only when not even the first entry fits is the text cut mid-entry.

use std::sync::Arc;

use crate::buffer::Batch;
use crate::constants::EVENT_TRUNCATION_MARKER;
use crate::event::LogEvent;
use crate::layout::Layout;
use crate::truncate::{char_len, truncate};

#[derive(Clone)]
pub struct Renderer {
    layout: Arc<dyn Layout>,
    max_event_length: usize,
    max_text_length: usize,
}

impl Renderer {
    pub fn new(layout: Arc<dyn Layout>, max_event_length: usize, max_text_length: usize) -> Self {
        Self {
            layout,
            max_event_length,
            max_text_length,
        }
    }

    /// Renders a single event cut to the per-event limit.
    #[must_use]
    pub fn render_entry(&self, event: &LogEvent) -> String {
        let text = self.layout.render(event);
        truncate(&text, self.max_event_length, EVENT_TRUNCATION_MARKER).into_owned()
    }

    /// Renders `batch` into at most `max_text_length` characters.
    ///
    /// Pure: rendering the same batch twice gives the same text.
    #[must_use]
    pub fn render(&self, batch: &Batch) -> String {
        if batch.is_empty() {
            return String::new();
        }

        let entries: Vec<String> = batch.events.iter().map(|e| self.render_entry(e)).collect();
        let mut parts: Vec<&str> = Vec::with_capacity(entries.len() + 1);
        let notice = (entries.len() > 1).then(|| batching_notice(entries.len()));
        if let Some(notice) = notice.as_deref() {
            parts.push(notice);
        }
        let header_parts = parts.len();
        parts.extend(entries.iter().map(String::as_str));

        // length of parts[..=i] joined by '\n'
        let mut joined_len = 0;
        let mut fitting_entries = None;
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                joined_len += 1;
            }
            joined_len += char_len(part);
            if i < header_parts {
                continue;
            }
            let shown = i + 1 - header_parts;
            let elided = entries.len() - shown + batch.dropped;
            let needed = joined_len + marker_len(elided);
            if needed <= self.max_text_length {
                fitting_entries = Some(shown);
            } else if joined_len > self.max_text_length {
                break;
            }
        }

        match fitting_entries {
            Some(shown) => {
                let elided = entries.len() - shown + batch.dropped;
                let mut text = parts[..header_parts + shown].join("\n");
                if elided > 0 {
                    text.push_str(&continuation_marker(elided));
                }
                text
            }
            None => {
                let full = parts.join("\n");
                let marker = continuation_marker(entries.len() - 1 + batch.dropped);
                truncate(&full, self.max_text_length, &marker).into_owned()
            }
        }
    }

    #[must_use]
    pub fn max_text_length(&self) -> usize {
        self.max_text_length
    }
}

/// First line of a message carrying more than one event.
#[must_use]
pub fn batching_notice(count: usize) -> String {
    format!("{count} log events batched:")
}

/// Marker appended when `elided` events did not fit.
#[must_use]
pub fn continuation_marker(elided: usize) -> String {
    if elided == 0 {
        EVENT_TRUNCATION_MARKER.to_string()
    } else {
        format!("{EVENT_TRUNCATION_MARKER}\n{EVENT_TRUNCATION_MARKER} and {elided} more")
    }
}

fn marker_len(elided: usize) -> usize {
    if elided == 0 {
        0
    } else {
        char_len(&continuation_marker(elided))
    }
}
