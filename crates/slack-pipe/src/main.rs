// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::process::ExitCode;

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use slack_appender::{Appender, AppenderConfig, LogEvent, Severity};

const TARGET: &str = "slack_pipe";

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("SLACK_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match AppenderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let default_severity = env::var("SLACK_PIPE_SEVERITY")
        .ok()
        .and_then(|val| val.parse::<Severity>().ok())
        .unwrap_or(Severity::Info);

    let appender = match Appender::start(config) {
        Ok(appender) => appender,
        Err(e) => {
            error!("Unable to start appender: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("Forwarding stdin to webhook");

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut forwarded: u64 = 0;
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(event) = parse_line(&line, default_severity) {
                        appender.append(event);
                        forwarded += 1;
                    }
                }
                Ok(None) => {
                    debug!("Reached end of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }

    appender.shutdown().await;
    info!("Forwarded {forwarded} lines");
    ExitCode::SUCCESS
}

/// Turns an input line into an event. A leading severity word such as
/// `ERROR` or `warn:` sets the severity; blank lines are skipped.
fn parse_line(line: &str, default_severity: Severity) -> Option<LogEvent> {
    let line = line.trim_end();
    if line.trim().is_empty() {
        return None;
    }
    let (first, rest) = line
        .trim_start()
        .split_once(char::is_whitespace)
        .unwrap_or((line.trim_start(), ""));
    match first.trim_end_matches(':').parse::<Severity>() {
        Ok(severity) if !rest.trim().is_empty() => {
            Some(LogEvent::new(severity, TARGET, rest.trim_start()))
        }
        _ => Some(LogEvent::new(default_severity, TARGET, line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_with_severity() {
        let event = parse_line("ERROR disk full on /var", Severity::Info).unwrap();
        assert_eq!(event.severity(), Severity::Error);
        assert_eq!(event.message(), "disk full on /var");

        let event = parse_line("warn: cache miss rate high", Severity::Info).unwrap();
        assert_eq!(event.severity(), Severity::Warn);
        assert_eq!(event.message(), "cache miss rate high");
    }

    #[test]
    fn test_parse_line_without_severity() {
        let event = parse_line("backup finished in 42s", Severity::Info).unwrap();
        assert_eq!(event.severity(), Severity::Info);
        assert_eq!(event.message(), "backup finished in 42s");

        // a lone severity word is the message itself
        let event = parse_line("error", Severity::Debug).unwrap();
        assert_eq!(event.severity(), Severity::Debug);
        assert_eq!(event.message(), "error");
    }

    #[test]
    fn test_parse_line_skips_blank() {
        assert!(parse_line("", Severity::Info).is_none());
        assert!(parse_line("   \t", Severity::Info).is_none());
    }
}
