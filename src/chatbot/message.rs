//! Inbound events and outbound messages, independent of the Telegram types.

use thiserror::Error;

/// Opaque transport handle for a photo, resolved by [`Transport::fetch_image`].
///
/// [`Transport::fetch_image`]: crate::chatbot::transport::Transport::fetch_image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub file_id: String,
}

/// Downloaded image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// One message from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: i64,
    /// Chat ID where this message was sent (positive = DM).
    pub chat_id: i64,
    pub text: Option<String>,
    pub image: Option<ImageRef>,
    pub caption: Option<String>,
}

/// The transport handed over something the flow cannot use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed inbound event: {0}")]
pub struct MalformedEvent(pub &'static str);

impl InboundEvent {
    pub fn text(chat_id: i64, user_id: i64, text: &str) -> Self {
        Self {
            user_id,
            chat_id,
            text: Some(text.to_string()),
            image: None,
            caption: None,
        }
    }

    pub fn photo(chat_id: i64, user_id: i64, file_id: &str, caption: Option<&str>) -> Self {
        Self {
            user_id,
            chat_id,
            text: None,
            image: Some(ImageRef {
                file_id: file_id.to_string(),
            }),
            caption: caption.map(str::to_string),
        }
    }

    /// Reject events that carry neither text nor a photo.
    pub fn validate(self) -> Result<Self, MalformedEvent> {
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !has_text && self.image.is_none() {
            return Err(MalformedEvent("no text and no photo"));
        }
        Ok(self)
    }

    /// Text body, or the photo caption when there is no text.
    pub fn body(&self) -> &str {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .unwrap_or("")
            .trim()
    }
}

/// Reply keyboard attached to an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    /// One-time keyboard with the three language labels.
    LanguageKeyboard,
    RemoveKeyboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub markup: Option<Markup>,
}

impl OutgoingMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    pub fn with_markup(text: impl Into<String>, markup: Markup) -> Self {
        Self {
            text: text.into(),
            markup: Some(markup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_prefers_text_over_caption() {
        let mut event = InboundEvent::photo(1, 2, "file", Some("  resultado  "));
        assert_eq!(event.body(), "resultado");
        event.text = Some("hola".into());
        assert_eq!(event.body(), "hola");
    }

    #[test]
    fn test_validate_rejects_empty_event() {
        let event = InboundEvent {
            user_id: 1,
            chat_id: 1,
            text: Some("   ".into()),
            image: None,
            caption: None,
        };
        assert_eq!(event.validate(), Err(MalformedEvent("no text and no photo")));
    }

    #[test]
    fn test_validate_accepts_photo_without_caption() {
        let event = InboundEvent::photo(1, 2, "file", None);
        assert!(event.validate().is_ok());
    }
}
