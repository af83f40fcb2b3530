//! Forwards log events to an operator Telegram chat.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const MAX_LOG_CHARS: usize = 4000;
const INFO_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const INFO_BUFFER_LIMIT: usize = 50;

/// Log message with priority.
#[derive(Debug, PartialEq, Eq)]
enum LogMessage {
    /// WARN/ERROR - send immediately
    Urgent(String),
    /// INFO - batch and send periodically
    Info(String),
}

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogMessage>,
    forward_info: bool,
}

impl TelegramLogLayer {
    /// Must be called inside a tokio runtime. INFO events are only forwarded
    /// when `forward_info` is set.
    pub fn new(bot: Bot, chat_id: ChatId, forward_info: bool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogMessage>();

        tokio::spawn(async move {
            let mut info_buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(INFO_FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    msg = rx.recv() => {
                        match msg {
                            Some(LogMessage::Urgent(text)) => send_log(&bot, chat_id, &text).await,
                            Some(LogMessage::Info(text)) => {
                                info_buffer.push(text);
                                if info_buffer.len() >= INFO_BUFFER_LIMIT {
                                    flush_buffer(&bot, chat_id, &mut info_buffer).await;
                                }
                            }
                            None => break,
                        }
                    }
                    _ = interval.tick() => {
                        if !info_buffer.is_empty() {
                            flush_buffer(&bot, chat_id, &mut info_buffer).await;
                        }
                    }
                }
            }
        });

        Self { tx, forward_info }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_LOG_CHARS {
        let truncated: String = text.chars().take(MAX_LOG_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

async fn send_log(bot: &Bot, chat_id: ChatId, text: &str) {
    // eprintln, not tracing: a failed send must not log back into this layer
    if let Err(e) = bot.send_message(chat_id, truncate(text)).await {
        eprintln!("Failed to send log to Telegram: {e}");
    }
}

async fn flush_buffer(bot: &Bot, chat_id: ChatId, buffer: &mut Vec<String>) {
    let combined = buffer.join("\n");
    buffer.clear();
    send_log(bot, chat_id, &combined).await;
}

/// Decide whether and how an event is forwarded. Only events from this
/// crate go out; library chatter stays in the local logs.
fn classify(level: Level, target: &str, message: String, forward_info: bool) -> Option<LogMessage> {
    if !target.starts_with(env!("CARGO_CRATE_NAME")) {
        return None;
    }
    match level {
        Level::ERROR => Some(LogMessage::Urgent(format!("❌ {message}"))),
        Level::WARN => Some(LogMessage::Urgent(format!("⚠️ {message}"))),
        Level::INFO if forward_info => Some(LogMessage::Info(message)),
        _ => None,
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message
                .push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > Level::INFO {
            return;
        }

        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        let Some(msg) = classify(*metadata.level(), metadata.target(), visitor.message, self.forward_info)
        else {
            return;
        };
        if self.tx.send(msg).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "piribot::chatbot::flow";

    #[test]
    fn test_warn_and_error_are_urgent() {
        assert_eq!(
            classify(Level::WARN, TARGET, "slow".into(), false),
            Some(LogMessage::Urgent("⚠️ slow".into()))
        );
        assert_eq!(
            classify(Level::ERROR, TARGET, "down".into(), false),
            Some(LogMessage::Urgent("❌ down".into()))
        );
    }

    #[test]
    fn test_info_only_when_enabled() {
        assert_eq!(classify(Level::INFO, TARGET, "hi".into(), false), None);
        assert_eq!(
            classify(Level::INFO, TARGET, "hi".into(), true),
            Some(LogMessage::Info("hi".into()))
        );
        assert_eq!(classify(Level::DEBUG, TARGET, "x".into(), true), None);
    }

    #[test]
    fn test_foreign_targets_ignored() {
        assert_eq!(classify(Level::ERROR, "hyper::proto", "reset".into(), true), None);
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        let long = "ñ".repeat(MAX_LOG_CHARS + 10);
        let out = truncate(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), MAX_LOG_CHARS + 3);
        assert_eq!(truncate("corto"), "corto");
    }
}
