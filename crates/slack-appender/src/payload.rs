// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Incoming-webhook message bodies.
//!
//! Plain messages carry the text in `text`. Colored messages carry it in a
//! single attachment field so the chat client draws a severity-colored bar:
//!
//! ```json
//! {"username": "alerts", "channel": "#ops",
//!  "attachments": [{"color": "danger", "fields": [{"value": "..."}]}]}
//! ```
//!
//! Sender identity keys are only present when configured.

use serde::Serialize;

use crate::event::Severity;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Payload {
    /// The message text, wherever it is carried.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or_else(|| {
            self.attachments
                .first()
                .and_then(|a| a.fields.first())
                .map(|f| f.value.as_str())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub color: String,
    pub fields: Vec<AttachmentField>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttachmentField {
    pub value: String,
}

/// How batch text is carried in the payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageStyle {
    #[default]
    Plain,
    /// Attachment colored by the highest severity in the batch.
    Colored,
}

impl std::str::FromStr for MessageStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(MessageStyle::Plain),
            "colored" | "color" | "attachment" => Ok(MessageStyle::Colored),
            other => Err(format!("unknown message style '{other}'")),
        }
    }
}

/// Attachment color for a severity.
#[must_use]
pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "danger",
        Severity::Warn => "warning",
        _ => "good",
    }
}

/// Default sender identity stamped on every payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PayloadBuilder {
    username: Option<String>,
    icon_emoji: Option<String>,
    channel: Option<String>,
}

impl PayloadBuilder {
    #[must_use]
    pub fn new(
        username: Option<String>,
        icon_emoji: Option<String>,
        channel: Option<String>,
    ) -> Self {
        Self {
            username,
            icon_emoji,
            channel,
        }
    }

    #[must_use]
    pub fn text(&self, text: impl Into<String>) -> Payload {
        Payload {
            text: Some(text.into()),
            ..self.envelope()
        }
    }

    #[must_use]
    pub fn colored(&self, text: impl Into<String>, color: impl Into<String>) -> Payload {
        Payload {
            attachments: vec![Attachment {
                color: color.into(),
                fields: vec![AttachmentField { value: text.into() }],
            }],
            ..self.envelope()
        }
    }

    /// Builds the payload for a rendered batch.
    #[must_use]
    pub fn batch(&self, text: String, style: MessageStyle, severity: Option<Severity>) -> Payload {
        match style {
            MessageStyle::Plain => self.text(text),
            MessageStyle::Colored => {
                self.colored(text, severity_color(severity.unwrap_or(Severity::Info)))
            }
        }
    }

    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    fn envelope(&self) -> Payload {
        Payload {
            username: self.username.clone(),
            icon_emoji: self.icon_emoji.clone(),
            channel: self.channel.clone(),
            ..Payload::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> PayloadBuilder {
        PayloadBuilder::new(
            Some("alerts".to_string()),
            Some(":rotating_light:".to_string()),
            Some("#ops".to_string()),
        )
    }

    #[test]
    fn test_text_payload() {
        let payload = builder().text("hello");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "username": "alerts",
                "icon_emoji": ":rotating_light:",
                "channel": "#ops",
                "text": "hello"
            })
        );
    }

    #[test]
    fn test_unset_identity_is_omitted() {
        let payload = PayloadBuilder::default().text("hello");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "text": "hello" })
        );
    }

    #[test]
    fn test_colored_payload() {
        let payload = builder().colored("it broke", "#ff0000");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "username": "alerts",
                "icon_emoji": ":rotating_light:",
                "channel": "#ops",
                "attachments": [{ "color": "#ff0000", "fields": [{ "value": "it broke" }] }]
            })
        );
        assert_eq!(payload.body(), Some("it broke"));
    }

    #[test]
    fn test_batch_payload_uses_severity_color() {
        let payload = builder().batch(
            "boom".to_string(),
            MessageStyle::Colored,
            Some(Severity::Error),
        );
        assert_eq!(payload.attachments[0].color, "danger");
        assert!(payload.text.is_none());

        let payload = builder().batch("meh".to_string(), MessageStyle::Colored, None);
        assert_eq!(payload.attachments[0].color, "good");

        let payload = builder().batch(
            "plain".to_string(),
            MessageStyle::Plain,
            Some(Severity::Error),
        );
        assert_eq!(payload.text.as_deref(), Some("plain"));
        assert!(payload.attachments.is_empty());
    }

    #[test]
    fn test_message_style_from_str() {
        assert_eq!("colored".parse::<MessageStyle>(), Ok(MessageStyle::Colored));
        assert_eq!("PLAIN".parse::<MessageStyle>(), Ok(MessageStyle::Plain));
        assert!("fancy".parse::<MessageStyle>().is_err());
    }
}
