//! Messaging transport seam. Telegram in production, a recorder in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::chatbot::message::{ImagePayload, ImageRef, OutgoingMessage};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to send message: {0}")]
    Send(String),
    #[error("failed to download image: {0}")]
    Download(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, chat_id: i64, message: &OutgoingMessage) -> Result<(), TransportError>;

    /// Show a "typing" indicator. Best effort.
    async fn typing(&self, chat_id: i64) -> Result<(), TransportError>;

    async fn fetch_image(&self, image: &ImageRef) -> Result<ImagePayload, TransportError>;
}
