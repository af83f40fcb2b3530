use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use teloxide::types::ChatId;
use thiserror::Error;
use tracing::warn;

use crate::chatbot::gemini;
use crate::chatbot::language::LanguageCode;

/// Errors that can occur when loading configuration or data files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file.
    #[error("failed to read '{}': {source}", .path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse '{}': {source}", .path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Invalid regex pattern.
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex { pattern: String, source: regex::Error },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    /// May be left empty and supplied through TELEGRAM_BOT_TOKEN.
    #[serde(default)]
    telegram_bot_token: String,
    /// May be left empty and supplied through GEMINI_API_KEY.
    #[serde(default)]
    gemini_api_key: String,
    /// Language used until a user picks one (es, qu or shp).
    default_language: Option<String>,
    gemini_model: Option<String>,
    gemini_base_url: Option<String>,
    #[serde(default = "default_ai_timeout_secs")]
    ai_timeout_secs: u64,
    /// Retry the model call once on transient failures.
    #[serde(default = "default_true")]
    ai_retry: bool,
    alerts_path: Option<String>,
    faq_path: Option<String>,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
    /// Operator chat that receives warnings and errors.
    log_chat_id: Option<i64>,
    /// Also forward INFO logs (batched) to the operator chat.
    #[serde(default)]
    log_chat_info: bool,
}

fn default_ai_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

pub struct Config {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub default_language: LanguageCode,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub ai_timeout: Duration,
    pub ai_retry: bool,
    pub alerts_path: PathBuf,
    pub faq_path: PathBuf,
    pub data_dir: PathBuf,
    pub log_chat_id: Option<ChatId>,
    pub log_chat_info: bool,
}

impl Config {
    /// Load the JSON config file, filling secrets from the environment.
    ///
    /// A missing file is not an error: everything can come from the
    /// environment (and a `.env` file loaded by the caller).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub(crate) fn load_with_env<P, F>(path: P, env: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = path.as_ref().to_path_buf();
        let file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
            serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?
        } else {
            warn!("Config file {} not found, using environment only", config_path.display());
            ConfigFile {
                ai_timeout_secs: default_ai_timeout_secs(),
                ai_retry: true,
                ..Default::default()
            }
        };

        Self::resolve(file, env)
    }

    fn resolve<F>(file: ConfigFile, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let telegram_bot_token = if file.telegram_bot_token.is_empty() {
            non_empty("TELEGRAM_BOT_TOKEN").unwrap_or_default()
        } else {
            file.telegram_bot_token
        };
        let gemini_api_key = if file.gemini_api_key.is_empty() {
            non_empty("GEMINI_API_KEY").unwrap_or_default()
        } else {
            file.gemini_api_key
        };

        if telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token is required (config file or TELEGRAM_BOT_TOKEN)".into(),
            ));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }
        if gemini_api_key.is_empty() {
            return Err(ConfigError::Validation(
                "gemini_api_key is required (config file or GEMINI_API_KEY)".into(),
            ));
        }
        if file.ai_timeout_secs == 0 {
            return Err(ConfigError::Validation("ai_timeout_secs must be greater than 0".into()));
        }

        let default_language = non_empty("PIRIBOT_DEFAULT_LANGUAGE")
            .or(file.default_language)
            .map(|code| {
                code.parse::<LanguageCode>().unwrap_or_else(|e| {
                    warn!("{e}, falling back to es");
                    LanguageCode::Es
                })
            })
            .unwrap_or(LanguageCode::Es);

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token,
            gemini_api_key,
            default_language,
            gemini_model: file.gemini_model.unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
            gemini_base_url: file
                .gemini_base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string()),
            ai_timeout: Duration::from_secs(file.ai_timeout_secs),
            ai_retry: file.ai_retry,
            alerts_path: PathBuf::from(file.alerts_path.unwrap_or_else(|| "data/alerts.json".into())),
            faq_path: PathBuf::from(file.faq_path.unwrap_or_else(|| "data/faq.json".into())),
            data_dir,
            log_chat_id: file.log_chat_id.map(ChatId),
            log_chat_info: file.log_chat_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdefGHIjklMNOpqrsTUVwxyz",
            "gemini_api_key": "AIzaTest",
            "default_language": "qu",
            "ai_timeout_secs": 12
        }"#);
        let config = Config::load_with_env(file.path(), no_env).expect("should load valid config");
        assert_eq!(config.default_language, LanguageCode::Qu);
        assert_eq!(config.ai_timeout, Duration::from_secs(12));
        assert!(config.ai_retry);
        assert_eq!(config.gemini_model, "gemini-2.5-flash");
        assert_eq!(config.alerts_path, PathBuf::from("data/alerts.json"));
        assert!(config.log_chat_id.is_none());
    }

    #[test]
    fn test_secrets_from_env() {
        let file = write_config("{}");
        let env: HashMap<&str, &str> = HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "42:secret"),
            ("GEMINI_API_KEY", "key"),
            ("PIRIBOT_DEFAULT_LANGUAGE", "shp"),
        ]);
        let config = Config::load_with_env(file.path(), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.telegram_bot_token, "42:secret");
        assert_eq!(config.gemini_api_key, "key");
        assert_eq!(config.default_language, LanguageCode::Shp);
    }

    #[test]
    fn test_missing_file_uses_env() {
        let env = |k: &str| match k {
            "TELEGRAM_BOT_TOKEN" => Some("42:secret".to_string()),
            "GEMINI_API_KEY" => Some("key".to_string()),
            _ => None,
        };
        let config = Config::load_with_env("/nonexistent/piribot.json", env).unwrap();
        assert_eq!(config.default_language, LanguageCode::Es);
        assert_eq!(config.ai_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_file_wins_over_env_for_secrets() {
        let file = write_config(r#"{"telegram_bot_token": "1:file", "gemini_api_key": "file-key"}"#);
        let env = |_: &str| Some("9:env".to_string());
        let config = Config::load_with_env(file.path(), env).unwrap();
        assert_eq!(config.telegram_bot_token, "1:file");
        assert_eq!(config.gemini_api_key, "file-key");
    }

    #[test]
    fn test_unsupported_default_language_falls_back() {
        let file = write_config(r#"{
            "telegram_bot_token": "123:abc",
            "gemini_api_key": "k",
            "default_language": "en"
        }"#);
        let config = Config::load_with_env(file.path(), no_env).unwrap();
        assert_eq!(config.default_language, LanguageCode::Es);
    }

    #[test]
    fn test_empty_token() {
        let file = write_config(r#"{"gemini_api_key": "k"}"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_missing_gemini_key() {
        let file = write_config(r#"{"telegram_bot_token": "123:abc"}"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(err.to_string().contains("gemini_api_key"));
    }

    #[test]
    fn test_invalid_token_format_no_colon() {
        let file = write_config(r#"{"telegram_bot_token": "invalid_token_no_colon", "gemini_api_key": "k"}"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_invalid_token_format_non_numeric_id() {
        let file = write_config(r#"{"telegram_bot_token": "notanumber:ABCdef", "gemini_api_key": "k"}"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_token_format_empty_secret() {
        let file = write_config(r#"{"telegram_bot_token": "123456789:", "gemini_api_key": "k"}"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let file = write_config(r#"{"telegram_bot_token": "1:a", "gemini_api_key": "k", "ai_timeout_secs": 0}"#);
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(err.to_string().contains("ai_timeout_secs"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let file = write_config(r#"{
            "telegram_bot_token": "1:a",
            "gemini_api_key": "k",
            "gemini_base_url": "http://localhost:8080/v1beta/"
        }"#);
        let config = Config::load_with_env(file.path(), no_env).unwrap();
        assert_eq!(config.gemini_base_url, "http://localhost:8080/v1beta");
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load_with_env(file.path(), no_env));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
