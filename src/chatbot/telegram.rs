//! Telegram client using teloxide.

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup};
use tracing::{info, warn};

use crate::chatbot::language::LanguageCode;
use crate::chatbot::message::{ImagePayload, ImageRef, Markup, OutgoingMessage};
use crate::chatbot::transport::{Transport, TransportError};

/// Telegram rejects messages over 4096 chars; stay below with some margin.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn reply_markup(markup: Markup) -> ReplyMarkup {
    match markup {
        Markup::LanguageKeyboard => {
            let rows: Vec<Vec<KeyboardButton>> = LanguageCode::ALL
                .iter()
                .map(|lang| vec![KeyboardButton::new(lang.label())])
                .collect();
            ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard().one_time_keyboard())
        }
        Markup::RemoveKeyboard => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

/// Split text into pieces of at most `max` chars, preferring paragraph and
/// line breaks, then spaces.
pub fn split_chunks(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > max {
        // byte offset of the max-th char
        let limit = rest.char_indices().nth(max).map(|(i, _)| i).unwrap_or(rest.len());
        let window = &rest[..limit];
        let cut = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);
        chunks.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

fn media_type(file_path: &str) -> &'static str {
    let lower = file_path.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg" // Telegram photos are JPEG
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send(&self, chat_id: i64, message: &OutgoingMessage) -> Result<(), TransportError> {
        let chunks = split_chunks(&message.text, MAX_MESSAGE_CHARS);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut request = self.bot.send_message(ChatId(chat_id), chunk);
            // keyboard goes with the final piece
            if i == last {
                if let Some(markup) = message.markup {
                    request = request.reply_markup(reply_markup(markup));
                }
            }
            request.await.map_err(|e| {
                let msg = format!("chat {chat_id}: {e}");
                warn!("Failed to send: {}", msg);
                TransportError::Send(msg)
            })?;
        }
        Ok(())
    }

    async fn typing(&self, chat_id: i64) -> Result<(), TransportError> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Send(format!("typing indicator: {e}")))
    }

    async fn fetch_image(&self, image: &ImageRef) -> Result<ImagePayload, TransportError> {
        let file = self
            .bot
            .get_file(FileId(image.file_id.clone()))
            .await
            .map_err(|e| TransportError::Download(format!("failed to get file info: {e}")))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut data)
            .await
            .map_err(|e| TransportError::Download(format!("failed to download file: {e}")))?;

        let mime_type = media_type(&file.path);
        info!("📥 Downloaded image ({} bytes, {})", data.len(), mime_type);
        Ok(ImagePayload {
            data,
            mime_type: mime_type.to_string(),
        })
    }
}
