// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards log events to a Slack-compatible incoming webhook.
//!
//! Events are buffered, coalesced into time windows (or flushed on a fixed
//! interval, or sent one by one), rendered into a single size-limited
//! message and posted from a background worker. Delivery is best effort:
//! each message gets one attempt, and failures go to an [`ErrorSink`]
//! instead of the code that logged the event.
//!
//! The entry point is [`Appender`]; [`SlackLayer`] plugs it into a
//! `tracing` subscriber and [`Poster`] sends single messages directly.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod appender;
pub mod buffer;
pub mod client;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod layer;
pub mod layout;
pub mod payload;
pub mod poster;
pub mod render;
pub mod scheduler;
pub mod sink;
pub mod truncate;

pub use appender::{Appender, AppenderBuilder};
pub use client::{Deliver, WebhookClient};
pub use config::AppenderConfig;
pub use dispatch::DeliveryMode;
pub use error::{AppenderError, ConfigError, DeliveryError, DispatchError, NotifyError};
pub use event::{LogEvent, Severity};
pub use layer::SlackLayer;
pub use layout::{Layout, MessageLayout, PatternLayout};
pub use payload::{MessageStyle, Payload};
pub use poster::Poster;
pub use scheduler::BatchingPolicy;
pub use sink::{ErrorReport, ErrorSink, TracingErrorSink};
