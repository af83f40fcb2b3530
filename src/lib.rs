//! Piribot: a multilingual pregnancy-support Telegram bot.

pub mod chatbot;
pub mod config;
pub mod telegram_log;
