// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration.
//!
//! [`SlackLayer`] turns `tracing` events at or above a minimum severity into
//! [`LogEvent`]s and appends them:
//!
//! ```no_run
//! use slack_appender::{Appender, AppenderConfig, SlackLayer};
//! use tracing_subscriber::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let appender = Appender::start(AppenderConfig::from_env()?)?;
//! tracing_subscriber::registry()
//!     .with(SlackLayer::new(appender.clone()))
//!     .init();
//!
//! tracing::error!(order_id = 42, "payment failed");
//! appender.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::appender::Appender;
use crate::event::{LogEvent, Severity};

// Events from the delivery path itself would feed back into the appender.
const IGNORED_TARGETS: &[&str] = &[
    env!("CARGO_CRATE_NAME"),
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
];

pub struct SlackLayer {
    appender: Appender,
    min_severity: Severity,
}

impl SlackLayer {
    /// Forwards `WARN` and `ERROR` events.
    #[must_use]
    pub fn new(appender: Appender) -> Self {
        Self {
            appender,
            min_severity: Severity::Warn,
        }
    }

    #[must_use]
    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target
            .strip_prefix(ignored)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

impl<S: Subscriber> Layer<S> for SlackLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if Severity::from(metadata.level()) < self.min_severity || is_ignored(metadata.target())
        {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut log_event = LogEvent::new(
            Severity::from(metadata.level()),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        );
        for (name, value) in visitor.fields {
            log_event = log_event.with_field(name, value);
        }
        self.appender.append(log_event);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }
}
