//! Gemini API client for reply generation.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chatbot::generator::{GenerationError, Generator};
use crate::chatbot::prompt::PromptContext;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }
}

fn build_request(prompt: &PromptContext) -> GenerateRequest {
    let mut parts = vec![Part::Text {
        text: prompt.user_turn.clone(),
    }];
    if let Some(ref image) = prompt.image {
        parts.push(Part::Inline {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&image.data),
            },
        });
    }

    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part::Text {
                text: prompt.system_instruction.clone(),
            }],
        },
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
    }
}

/// Map a raw HTTP status and body to reply text.
fn parse_response(status: u16, body: &str) -> Result<String, GenerationError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<GenerateResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .map(|e| e.message)
            .unwrap_or_else(|| body.to_string());
        return Err(GenerationError::Api {
            status,
            body: message,
        });
    }

    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(GenerationError::Api {
            status,
            body: error.message,
        });
    }
    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::Blocked(reason));
    }

    let candidate = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or(GenerationError::Empty)?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_default();
        return match reason.as_str() {
            "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" => Err(GenerationError::Blocked(reason)),
            _ => Err(GenerationError::Empty),
        };
    }

    Ok(text.trim().to_string())
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &PromptContext) -> Result<String, GenerationError> {
        info!(
            "🤖 Gemini request: model={}, lang={}, image={}",
            self.model,
            prompt.language,
            prompt.image.is_some()
        );

        let request = build_request(prompt);
        let response = self
            .client
            .post(self.url())
            .json(&request)
            .send()
            .await
            // without_url: the request URL carries the API key
            .map_err(|e| GenerationError::Http(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Http(format!("failed to read response: {}", e.without_url())))?;

        debug!("Gemini response status: {status}, {} bytes", body.len());

        let result = parse_response(status, &body);
        match &result {
            Ok(text) => info!("🤖 Gemini reply: {} chars", text.chars().count()),
            Err(e) => warn!("Gemini call failed: {e}"),
        }
        result
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::language::LanguageCode;
    use crate::chatbot::message::ImagePayload;

    fn prompt(image: Option<ImagePayload>) -> PromptContext {
        PromptContext {
            language: LanguageCode::Es,
            system_instruction: "Eres Piribot".into(),
            user_turn: "hola".into(),
            image,
        }
    }

    #[test]
    fn test_request_shape_text_only() {
        let json = serde_json::to_value(build_request(&prompt(None))).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Eres Piribot");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hola");
        assert_eq!(json["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_request_shape_with_image() {
        let image = ImagePayload {
            data: b"abc".to_vec(),
            mime_type: "image/png".into(),
        };
        let json = serde_json::to_value(build_request(&prompt(Some(image)))).unwrap();
        let inline = &json["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(inline["mimeType"], "image/png");
        assert_eq!(inline["data"], "YWJj");
    }

    #[test]
    fn test_parse_joins_text_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hola, "},{"text":"¿cómo estás?"}]},"finishReason":"STOP"}]}"#;
        assert_eq!(parse_response(200, body).unwrap(), "Hola, ¿cómo estás?");
    }

    #[test]
    fn test_parse_http_error_uses_api_message() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#;
        match parse_response(429, body) {
            Err(GenerationError::Api { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "Resource has been exhausted");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_server_error_is_transient() {
        let err = parse_response(503, "unavailable").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(matches!(parse_response(200, body), Err(GenerationError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn test_parse_safety_finish_without_text() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert!(matches!(parse_response(200, body), Err(GenerationError::Blocked(_))));
    }

    #[test]
    fn test_parse_empty_and_garbage() {
        assert!(matches!(parse_response(200, r#"{"candidates":[]}"#), Err(GenerationError::Empty)));
        assert!(matches!(
            parse_response(200, r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#),
            Err(GenerationError::Empty)
        ));
        assert!(matches!(parse_response(200, "not json"), Err(GenerationError::Parse(_))));
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let client = GeminiClient::new(
            "k".into(),
            "gemini-2.5-flash".into(),
            "http://localhost:9/v1beta/".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.url(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent?key=k"
        );
        assert_eq!(client.name(), "gemini-2.5-flash");
    }
}
