// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::{error, warn};

use crate::constants::REPORT_PAYLOAD_EXCERPT_LENGTH;
use crate::error::{DeliveryError, NotifyError};
use crate::payload::Payload;
use crate::truncate::truncate;

/// A dropped message and why it was dropped.
#[derive(Debug)]
pub struct ErrorReport {
    pub message: String,
    pub cause: NotifyError,
    pub channel: Option<String>,
    /// Serialized payload, cut to a readable size.
    pub payload: String,
}

impl ErrorReport {
    #[must_use]
    pub fn new(message: impl Into<String>, cause: impl Into<NotifyError>, payload: &Payload) -> Self {
        let serialized = serde_json::to_string(payload).unwrap_or_else(|_| format!("{payload:?}"));
        Self {
            message: message.into(),
            cause: cause.into(),
            channel: payload.channel.clone(),
            payload: truncate(&serialized, REPORT_PAYLOAD_EXCERPT_LENGTH, "...").into_owned(),
        }
    }
}

/// Receives every delivery-path failure.
///
/// Reports are the only way failures leave the pipeline: nothing is returned
/// to the code that logged the event.
pub trait ErrorSink: Send + Sync {
    fn report(&self, report: ErrorReport);
}

impl<F> ErrorSink for F
where
    F: Fn(ErrorReport) + Send + Sync,
{
    fn report(&self, report: ErrorReport) {
        self(report);
    }
}

/// Logs reports through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, report: ErrorReport) {
        if let NotifyError::Delivery(e @ DeliveryError::Transport { .. }) = &report.cause {
            if e.is_unreachable() {
                warn!(
                    "Cannot reach webhook, are you offline? Dropped {}",
                    report.payload
                );
                return;
            }
        }
        error!(
            "{} ({}): {}. Payload: {}",
            report.message,
            report.channel.as_deref().unwrap_or("default channel"),
            report.cause,
            report.payload
        );
    }
}
