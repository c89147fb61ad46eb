// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::event::LogEvent;

/// Renders a [`LogEvent`] to the text that ends up in the chat message.
///
/// Implementations must be pure and cheap: rendering runs on the flushing
/// path and the same batch may be rendered more than once.
pub trait Layout: Send + Sync {
    fn render(&self, event: &LogEvent) -> String;
}

impl<F> Layout for F
where
    F: Fn(&LogEvent) -> String + Send + Sync,
{
    fn render(&self, event: &LogEvent) -> String {
        self(event)
    }
}

/// `LEVEL target - message key=value ...`
#[derive(Clone, Copy, Debug)]
pub struct PatternLayout {
    include_target: bool,
    include_fields: bool,
}

impl Default for PatternLayout {
    fn default() -> Self {
        Self {
            include_target: true,
            include_fields: true,
        }
    }
}

impl PatternLayout {
    #[must_use]
    pub fn without_target(mut self) -> Self {
        self.include_target = false;
        self
    }

    #[must_use]
    pub fn without_fields(mut self) -> Self {
        self.include_fields = false;
        self
    }
}

impl Layout for PatternLayout {
    fn render(&self, event: &LogEvent) -> String {
        let mut out = String::with_capacity(event.message().len() + 32);
        out.push_str(event.severity().as_str());
        out.push(' ');
        if self.include_target && !event.target().is_empty() {
            out.push_str(event.target());
            out.push_str(" - ");
        }
        out.push_str(event.message());
        if self.include_fields {
            for (name, value) in event.fields() {
                out.push(' ');
                out.push_str(name);
                out.push('=');
                out.push_str(value);
            }
        }
        out
    }
}

/// Renders the bare message.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageLayout;

impl Layout for MessageLayout {
    fn render(&self, event: &LogEvent) -> String {
        event.message().to_string()
    }
}
