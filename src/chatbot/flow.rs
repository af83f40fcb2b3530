//! Per-turn conversation state machine.
//!
//! [`transition`] is a pure table from (stage, event) to the next stage and an
//! action. [`ConversationFlow::handle`] runs the action against the session
//! store, the generator and a [`Transport`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::chatbot::alerts::AlertDetector;
use crate::chatbot::generator::{GenerationError, Generator};
use crate::chatbot::language::LanguageCode;
use crate::chatbot::message::{InboundEvent, Markup, OutgoingMessage};
use crate::chatbot::prompt::{ImageContext, PromptBuilder, PromptContext};
use crate::chatbot::reply::ReplyEnvelope;
use crate::chatbot::session::{SessionKey, SessionStore, Stage, UserSession};
use crate::chatbot::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Language,
}

impl Command {
    /// Leading `/start`, `/help` or `/language`, optionally suffixed `@botname`.
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "language" => Some(Command::Language),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    /// Free text or photo. `selection` is set when the text names a supported language.
    Input { selection: Option<LanguageCode> },
}

impl Event {
    /// Commands are read from the text, or from a photo caption when there is
    /// no text. Language selections only come from plain text.
    pub fn classify(event: &InboundEvent) -> Self {
        let command_source = event.text.as_deref().or(event.caption.as_deref());
        if let Some(cmd) = command_source.and_then(Command::parse) {
            return Event::Command(cmd);
        }
        Event::Input {
            selection: event.text.as_deref().and_then(LanguageCode::from_selection),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Welcome,
    ShowHelp,
    PromptLanguage,
    ConfirmLanguage(LanguageCode),
    Converse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: Stage,
    pub action: Action,
}

pub fn transition(stage: Stage, event: Event) -> Transition {
    let (next, action) = match (stage, event) {
        (_, Event::Command(Command::Start)) => (Stage::AwaitingLanguage, Action::Welcome),
        (stage, Event::Command(Command::Help)) => (stage, Action::ShowHelp),
        (_, Event::Command(Command::Language)) => (Stage::AwaitingLanguage, Action::PromptLanguage),
        (Stage::AwaitingLanguage, Event::Input { selection: Some(lang) }) => {
            (Stage::Active, Action::ConfirmLanguage(lang))
        }
        (Stage::AwaitingLanguage, Event::Input { selection: None }) => {
            (Stage::AwaitingLanguage, Action::PromptLanguage)
        }
        (Stage::Active, Event::Input { .. }) => (Stage::Active, Action::Converse),
    };
    Transition { next, action }
}

/// Generation and session settings taken from [`Config`](crate::config::Config).
#[derive(Debug, Clone, Copy)]
pub struct FlowSettings {
    pub default_language: LanguageCode,
    pub ai_timeout: Duration,
    pub ai_retry: bool,
}

pub struct ConversationFlow {
    sessions: SessionStore,
    detector: AlertDetector,
    builder: PromptBuilder,
    generator: Arc<dyn Generator>,
    settings: FlowSettings,
}

impl ConversationFlow {
    pub fn new(
        detector: AlertDetector,
        builder: PromptBuilder,
        generator: Arc<dyn Generator>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            sessions: SessionStore::new(settings.default_language),
            detector,
            builder,
            generator,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Forget users idle for at least `max_idle`.
    pub fn evict_idle_sessions(&self, max_idle: Duration) -> usize {
        let evicted = self.sessions.evict_idle(max_idle);
        if evicted > 0 {
            info!("🧹 Evicted {} idle sessions, {} remain", evicted, self.sessions.len());
        }
        evicted
    }

    /// Run one turn for `event`. Never fails: problems end in a log line, and
    /// the user sees at most a localized apology.
    pub async fn handle(&self, event: InboundEvent, transport: &dyn Transport) {
        let key = SessionKey {
            chat_id: event.chat_id,
            user_id: event.user_id,
        };
        let handle = self.sessions.get_or_create(key);
        let _turn = handle.begin_turn().await;

        let session = handle.snapshot();
        let ev = Event::classify(&event);
        let Transition { next, action } = transition(session.stage, ev);
        info!(
            "📨 chat={} user={} {:?} -> {:?} ({:?}, {} chars, image={})",
            key.chat_id,
            key.user_id,
            session.stage,
            next,
            action,
            event.body().chars().count(),
            event.image.is_some()
        );

        handle.update(|s| {
            s.stage = next;
            if let Action::ConfirmLanguage(lang) = action {
                s.language = lang;
            }
        });

        let messages = match action {
            Action::Welcome => {
                let strings = session.language.strings();
                vec![
                    OutgoingMessage::plain(strings.welcome),
                    OutgoingMessage::with_markup(strings.choose_language, Markup::LanguageKeyboard),
                    OutgoingMessage::plain(strings.disclaimer),
                ]
            }
            Action::ShowHelp => vec![OutgoingMessage::plain(session.language.strings().help)],
            Action::PromptLanguage => vec![OutgoingMessage::with_markup(
                session.language.strings().choose_language,
                Markup::LanguageKeyboard,
            )],
            Action::ConfirmLanguage(lang) => {
                info!("🌐 chat={} language set to {}", key.chat_id, lang);
                vec![OutgoingMessage::with_markup(
                    lang.strings().language_set,
                    Markup::RemoveKeyboard,
                )]
            }
            Action::Converse => vec![self.converse(session, &event, transport).await],
        };

        for message in &messages {
            if let Err(e) = transport.send(key.chat_id, message).await {
                warn!("Reply to chat {} not delivered: {}", key.chat_id, e);
                break;
            }
        }
    }

    async fn converse(
        &self,
        session: UserSession,
        event: &InboundEvent,
        transport: &dyn Transport,
    ) -> OutgoingMessage {
        let lang = session.language;
        let body = event.body();

        let alerts = self.detector.detect(lang, body);
        if !alerts.is_empty() {
            let names: Vec<&str> = alerts.iter().map(|c| c.as_str()).collect();
            warn!("🚨 Alert signs in chat {}: {}", event.chat_id, names.join(", "));
        }

        let image = match &event.image {
            Some(image_ref) => {
                let payload = match transport.fetch_image(image_ref).await {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!("Image for chat {} unavailable: {}", event.chat_id, e);
                        None
                    }
                };
                Some(ImageContext { payload })
            }
            None => None,
        };

        let prompt = self.builder.build(lang, body, image.as_ref(), &alerts);

        if let Err(e) = transport.typing(event.chat_id).await {
            debug!("Typing indicator failed: {e}");
        }

        let generated = self.generate(&prompt).await;
        let envelope = ReplyEnvelope::assemble(lang.strings(), &alerts, generated);
        OutgoingMessage::plain(envelope.render())
    }

    /// Call the generator with a deadline and, if enabled, one retry on
    /// transient failures.
    async fn generate(&self, prompt: &PromptContext) -> Result<String, GenerationError> {
        let attempts = if self.settings.ai_retry { 2 } else { 1 };
        let mut attempt = 1;
        loop {
            let result =
                match tokio::time::timeout(self.settings.ai_timeout, self.generator.generate(prompt)).await {
                    Ok(result) => result,
                    Err(_) => Err(GenerationError::Timeout(self.settings.ai_timeout)),
                };
            match result {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        self.generator.name(),
                        attempt,
                        attempts,
                        e
                    );
                    if attempt >= attempts || !e.is_transient() {
                        return Err(e);
                    }
                }
            }
            attempt += 1;
        }
    }
}
