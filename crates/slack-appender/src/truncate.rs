// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Length limiting for chat text.
//!
//! Lengths are counted in `char`s, which is what chat endpoints count, and a
//! cut never lands inside a multi-byte character.

use std::borrow::Cow;

/// Cuts `text` to at most `max_len` characters, ending with `marker` when cut.
///
/// Returns `text` untouched when it already fits. When `max_len` is not larger
/// than the marker itself, the result is the marker cut to `max_len`.
///
/// # Examples
///
/// ```
/// use slack_appender::truncate::truncate;
///
/// assert_eq!(truncate("hello", 10, ".."), "hello");
/// assert_eq!(truncate("hello world", 7, ".."), "hello..");
/// assert_eq!(truncate("hello world", 1, ".."), ".");
/// ```
#[must_use]
pub fn truncate<'a>(text: &'a str, max_len: usize, marker: &str) -> Cow<'a, str> {
    // byte length bounds char length, skip counting for the common case
    if text.len() <= max_len || char_len(text) <= max_len {
        return Cow::Borrowed(text);
    }

    let marker_len = char_len(marker);
    if max_len <= marker_len {
        return Cow::Owned(marker.chars().take(max_len).collect());
    }

    let cut = byte_offset(text, max_len - marker_len);
    let mut out = String::with_capacity(cut + marker.len());
    out.push_str(&text[..cut]);
    out.push_str(marker);
    Cow::Owned(out)
}

/// Number of characters in `text`.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the `n`-th character, or the end of `text`.
fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map_or(text.len(), |(offset, _)| offset)
}
