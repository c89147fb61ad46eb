// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while validating an [`AppenderConfig`](crate::config::AppenderConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid webhook URL '{url}': {reason}")]
    InvalidWebhookUrl { url: String, reason: String },

    #[error("Invalid batching policy '{0}'. Expected 'window[,<millis>]', 'interval[,<secs>]' or 'immediate'")]
    InvalidBatching(String),
}

/// Errors raised by the appender lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum AppenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("A tokio runtime is required to start the appender: {0}")]
    NoRuntime(String),
}

/// Outcome of a single failed webhook POST.
///
/// Every variant is terminal for the attempt: the message is reported and
/// dropped, never retried.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// DNS, connect, reset or timeout. `unreachable` is set when no
    /// connection could be established at all.
    #[error("Unable to reach webhook: {message}")]
    Transport { message: String, unreachable: bool },

    /// The endpoint answered with anything but HTTP 200.
    #[error("Webhook rejected message: HTTP {status}")]
    Rejected { status: u16, body: String },

    #[error("Unable to encode payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeliveryError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                unreachable: true,
                ..
            }
        )
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        DeliveryError::Transport {
            unreachable: e.is_connect(),
            message: e.to_string(),
        }
    }
}

/// Failures of the hand-off between the scheduler and the dispatch worker.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch lane is full, message dropped")]
    LaneFull,

    #[error("Dispatch lane is closed, message dropped")]
    LaneClosed,
}

/// Any failure that ends up in an [`ErrorSink`](crate::sink::ErrorSink).
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl NotifyError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Delivery(e) => e.status(),
            Self::Dispatch(_) => None,
        }
    }
}
