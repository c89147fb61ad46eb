// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::client::parse_webhook_url;
use crate::constants::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_LANE_CAPACITY, DEFAULT_MAX_EVENT_LENGTH,
    DEFAULT_MAX_TEXT_LENGTH, DEFAULT_REQUEST_TIMEOUT,
};
use crate::dispatch::DeliveryMode;
use crate::error::ConfigError;
use crate::payload::MessageStyle;
use crate::scheduler::BatchingPolicy;

/// Configuration of an [`Appender`](crate::appender::Appender).
///
/// Fixed once the appender started, except for the batching policy which can
/// be replaced with [`Appender::set_batching`](crate::appender::Appender::set_batching).
#[derive(Debug, Clone, PartialEq)]
pub struct AppenderConfig {
    /// Incoming-webhook URL messages are posted to
    pub webhook_url: String,
    /// Channel override, e.g. `#ops`
    pub channel: Option<String>,
    /// Sender name override
    pub username: Option<String>,
    /// Sender icon override, e.g. `:ghost:`
    pub icon_emoji: Option<String>,
    /// Characters kept per rendered event
    pub max_event_length: usize,
    /// Characters kept per outbound message
    pub max_text_length: usize,
    pub batching: BatchingPolicy,
    /// Events held per batch before new ones are dropped
    pub buffer_capacity: usize,
    pub delivery_mode: DeliveryMode,
    pub message_style: MessageStyle,
    /// Send a one-time notice when a window starts coalescing events
    pub announce_batching: bool,
    /// Payloads that may wait for the dispatch worker
    pub lane_capacity: usize,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            channel: None,
            username: None,
            icon_emoji: None,
            max_event_length: DEFAULT_MAX_EVENT_LENGTH,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            batching: BatchingPolicy::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            delivery_mode: DeliveryMode::default(),
            message_style: MessageStyle::default(),
            announce_batching: false,
            lane_capacity: DEFAULT_LANE_CAPACITY,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl AppenderConfig {
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from any key lookup using the `SLACK_*` names.
    ///
    /// Malformed numbers and enum values fall back to their defaults with a
    /// warning; a malformed batching policy or webhook URL is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        let webhook_url = non_empty("SLACK_WEBHOOK_URL")
            .ok_or_else(|| ConfigError::Invalid("SLACK_WEBHOOK_URL is not set".to_string()))?;
        let batching = match non_empty("SLACK_BATCHING") {
            Some(val) => val.parse::<BatchingPolicy>()?,
            None => defaults.batching,
        };

        let config = Self {
            webhook_url,
            channel: non_empty("SLACK_CHANNEL"),
            username: non_empty("SLACK_USERNAME"),
            icon_emoji: non_empty("SLACK_ICON_EMOJI"),
            max_event_length: parse_or(
                "SLACK_MAX_EVENT_LENGTH",
                non_empty("SLACK_MAX_EVENT_LENGTH"),
                defaults.max_event_length,
            ),
            max_text_length: parse_or(
                "SLACK_MAX_TEXT_LENGTH",
                non_empty("SLACK_MAX_TEXT_LENGTH"),
                defaults.max_text_length,
            ),
            batching,
            buffer_capacity: parse_or(
                "SLACK_BUFFER_CAPACITY",
                non_empty("SLACK_BUFFER_CAPACITY"),
                defaults.buffer_capacity,
            ),
            delivery_mode: parse_or(
                "SLACK_DELIVERY_MODE",
                non_empty("SLACK_DELIVERY_MODE"),
                defaults.delivery_mode,
            ),
            message_style: parse_or(
                "SLACK_MESSAGE_STYLE",
                non_empty("SLACK_MESSAGE_STYLE"),
                defaults.message_style,
            ),
            announce_batching: non_empty("SLACK_ANNOUNCE_BATCHING")
                .map(|val| val.to_lowercase() == "true")
                .unwrap_or(defaults.announce_batching),
            lane_capacity: defaults.lane_capacity,
            timeout: Duration::from_secs(parse_or(
                "SLACK_TIMEOUT_SECS",
                non_empty("SLACK_TIMEOUT_SECS"),
                defaults.timeout.as_secs(),
            )),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_webhook_url(&self.webhook_url)?;

        let positive = [
            ("max event length", self.max_event_length),
            ("max text length", self.max_text_length),
            ("buffer capacity", self.buffer_capacity),
            ("lane capacity", self.lane_capacity),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        self.batching.validate()
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match value {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Ignoring invalid {key} '{raw}', using default {default:?}");
            default
        }),
        None => default,
    }
}
