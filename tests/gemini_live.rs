//! Live call against the Gemini API.
//!
//! These tests require GEMINI_API_KEY in the environment (or `.env`).
//!
//! Run with: cargo test --features integ_test --test gemini_live

#[cfg(feature = "integ_test")]
mod tests {
    use std::time::Duration;

    use piribot::chatbot::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
    use piribot::chatbot::{AlertMatch, FaqIndex, GeminiClient, Generator, LanguageCode, PromptBuilder};

    fn client() -> Option<GeminiClient> {
        dotenvy::dotenv().ok();
        let Ok(key) = std::env::var("GEMINI_API_KEY") else {
            eprintln!("Skipping test: GEMINI_API_KEY not set");
            return None;
        };
        Some(
            GeminiClient::new(
                key,
                DEFAULT_MODEL.to_string(),
                DEFAULT_BASE_URL.to_string(),
                Duration::from_secs(60),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_answers_in_spanish() {
        let Some(client) = client() else { return };
        let prompt = PromptBuilder::new(FaqIndex::default()).build(
            LanguageCode::Es,
            "¿Es normal tener náuseas en el primer trimestre?",
            None,
            &AlertMatch::default(),
        );

        let reply = client.generate(&prompt).await.expect("Gemini should answer");
        assert!(!reply.trim().is_empty());
    }

    #[tokio::test]
    async fn test_bad_key_is_api_error() {
        let client = GeminiClient::new(
            "invalid-key".to_string(),
            DEFAULT_MODEL.to_string(),
            DEFAULT_BASE_URL.to_string(),
            Duration::from_secs(30),
        )
        .unwrap();
        let prompt = PromptBuilder::default().build(LanguageCode::Es, "hola", None, &AlertMatch::default());

        let err = client.generate(&prompt).await.unwrap_err();
        assert!(!err.is_transient(), "unexpected: {err}");
    }
}
