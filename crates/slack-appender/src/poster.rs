// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::appender::Appender;
use crate::config::AppenderConfig;
use crate::constants::EVENT_TRUNCATION_MARKER;
use crate::error::AppenderError;
use crate::payload::Payload;
use crate::scheduler::BatchingPolicy;
use crate::truncate::truncate;

/// Fire-and-forget posting of single messages, bypassing the batching
/// window.
///
/// Messages go through the same dispatch lane as batches, so they are
/// delivered in order with them and failures reach the same error sink.
#[derive(Clone)]
pub struct Poster {
    appender: Appender,
}

impl Poster {
    /// Starts a standalone poster. The batching policy of `config` is ignored.
    pub fn start(config: AppenderConfig) -> Result<Self, AppenderError> {
        let config = AppenderConfig {
            batching: BatchingPolicy::Immediate,
            ..config
        };
        Appender::start(config).map(Self::from_appender)
    }

    pub(crate) fn from_appender(appender: Appender) -> Self {
        Self { appender }
    }

    /// Posts `text`, to `channel` when given, otherwise to the configured one.
    pub fn post(&self, text: &str, channel: Option<&str>) {
        let payload = self.envelope(self.appender.core().payloads.text(self.fit(text)), channel);
        self.submit(payload);
    }

    /// Posts `text` under a different sender identity.
    pub fn post_as(
        &self,
        text: &str,
        channel: Option<&str>,
        username: &str,
        icon_emoji: Option<&str>,
    ) {
        let mut payload =
            self.envelope(self.appender.core().payloads.text(self.fit(text)), channel);
        payload.username = Some(username.to_string());
        if let Some(icon) = icon_emoji {
            payload.icon_emoji = Some(icon.to_string());
        }
        self.submit(payload);
    }

    /// Posts `text` as an attachment with a colored bar, e.g. `good`,
    /// `warning`, `danger` or a `#rrggbb` value.
    pub fn post_with_color(&self, text: &str, channel: Option<&str>, color: &str) {
        let payload = self.envelope(
            self.appender
                .core()
                .payloads
                .colored(self.fit(text), color),
            channel,
        );
        self.submit(payload);
    }

    /// Waits until every message posted so far has been attempted.
    pub async fn flush(&self) {
        self.appender.flush().await;
    }

    pub async fn shutdown(&self) {
        self.appender.shutdown().await;
    }

    fn fit(&self, text: &str) -> String {
        let max = self.appender.core().renderer.max_text_length();
        truncate(text, max, EVENT_TRUNCATION_MARKER).into_owned()
    }

    fn envelope(&self, mut payload: Payload, channel: Option<&str>) -> Payload {
        if let Some(channel) = channel {
            payload.channel = Some(channel.to_string());
        }
        payload
    }

    fn submit(&self, payload: Payload) {
        self.appender.core().dispatcher.submit(payload);
    }
}
