// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Default limits and intervals for webhook delivery.
//!
//! Slack incoming webhooks reject or silently cut overly long messages, so
//! every outbound message is bounded twice: once per rendered event and once
//! for the whole message.

use std::time::Duration;

/// Maximum characters kept from a single rendered log event.
pub const DEFAULT_MAX_EVENT_LENGTH: usize = 256;

/// Maximum characters of the whole outbound message text.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 1024;

/// Number of events held per batch before new events are dropped.
pub const DEFAULT_BUFFER_CAPACITY: usize = 20;

/// Length of a coalescing window.
pub const DEFAULT_BATCHING_TIME_FRAME: Duration = Duration::from_secs(2);

/// Period of the fixed-rate polling flush.
pub const DEFAULT_BATCHING_INTERVAL: Duration = Duration::from_secs(10);

/// Number of built payloads that may wait for the dispatch worker.
///
/// Anything beyond this is dropped and reported; the producer never waits.
pub const DEFAULT_LANE_CAPACITY: usize = 64;

/// Per-request timeout for webhook POSTs.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Suffix appended to a rendered event that was cut.
pub const EVENT_TRUNCATION_MARKER: &str = "..";

/// Maximum characters of a payload kept in an error report.
pub(crate) const REPORT_PAYLOAD_EXCERPT_LENGTH: usize = 512;
