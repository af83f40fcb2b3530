//! Chatbot module - pregnancy support conversations over Telegram, answered by Gemini.

pub mod alerts;
pub mod faq;
pub mod flow;
pub mod gemini;
pub mod generator;
pub mod language;
pub mod message;
pub mod prompt;
pub mod reply;
pub mod session;
pub mod telegram;
pub mod text;
pub mod transport;

pub use alerts::{AlertCategory, AlertDetector, AlertMatch, AlertRule};
pub use faq::{FaqEntry, FaqIndex};
pub use flow::{ConversationFlow, FlowSettings};
pub use gemini::GeminiClient;
pub use generator::{GenerationError, Generator};
pub use language::{get_strings, LanguageCode, LanguageStrings, UnsupportedLanguage};
pub use message::{ImagePayload, ImageRef, InboundEvent, MalformedEvent, Markup, OutgoingMessage};
pub use prompt::{ImageContext, PromptBuilder, PromptContext};
pub use reply::ReplyEnvelope;
pub use session::{SessionKey, SessionStore, Stage, UserSession};
pub use telegram::TelegramClient;
pub use transport::{Transport, TransportError};
