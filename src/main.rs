use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatKind;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use piribot::chatbot::{
    AlertDetector, ConversationFlow, FaqIndex, FlowSettings, GeminiClient, ImageRef, InboundEvent,
    MalformedEvent, PromptBuilder, TelegramClient,
};
use piribot::config::Config;
use piribot::telegram_log::TelegramLogLayer;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
const SESSION_MAX_IDLE: Duration = Duration::from_secs(24 * 3600);

struct BotState {
    flow: ConversationFlow,
    telegram: TelegramClient,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "piribot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    let _log_guard = match init_logging(&config, &bot) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ Failed to open log file: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "🚀 Starting Piribot (model: {}, default language: {})",
        config.gemini_model, config.default_language
    );

    let state = match build_state(&config, &bot) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Startup failed: {e}");
            std::process::exit(1);
        }
    };

    let sweeper = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.flow.evict_idle_sessions(SESSION_MAX_IDLE);
        }
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_new_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// stdout + `{data_dir}/logs/piribot.log`, plus the operator chat when configured.
fn init_logging(config: &Config, bot: &Bot) -> std::io::Result<WorkerGuard> {
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("piribot.log"))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        let tg_layer = TelegramLogLayer::new(bot.clone(), log_chat_id, config.log_chat_info);
        registry.with(tg_layer).init();
    } else {
        registry.init();
    }
    Ok(guard)
}

fn build_state(config: &Config, bot: &Bot) -> Result<BotState, Box<dyn std::error::Error>> {
    let detector = AlertDetector::load(&config.alerts_path)?;
    let faq = FaqIndex::load(&config.faq_path)?;
    let gemini = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_base_url.clone(),
        config.ai_timeout,
    )?;

    let flow = ConversationFlow::new(
        detector,
        PromptBuilder::new(faq),
        Arc::new(gemini),
        FlowSettings {
            default_language: config.default_language,
            ai_timeout: config.ai_timeout,
            ai_retry: config.ai_retry,
        },
    );

    Ok(BotState {
        flow,
        telegram: TelegramClient::new(bot.clone()),
    })
}

async fn handle_new_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !matches!(msg.chat.kind, ChatKind::Private(_)) {
        debug!("Ignoring message in non-private chat {}", msg.chat.id);
        return Ok(());
    }

    let event = match telegram_to_inbound(&msg).and_then(InboundEvent::validate) {
        Ok(event) => event,
        Err(e) => {
            debug!("Dropping message {} in chat {}: {e}", msg.id, msg.chat.id);
            return Ok(());
        }
    };

    state.flow.handle(event, &state.telegram).await;
    Ok(())
}

fn telegram_to_inbound(msg: &Message) -> Result<InboundEvent, MalformedEvent> {
    let user = msg.from.as_ref().ok_or(MalformedEvent("no sender"))?;

    // largest size is last
    let image = msg
        .photo()
        .and_then(|sizes| sizes.last())
        .map(|photo| ImageRef {
            file_id: photo.file.id.0.clone(),
        });

    Ok(InboundEvent {
        user_id: user.id.0 as i64,
        chat_id: msg.chat.id.0,
        text: msg.text().map(str::to_string),
        image,
        caption: msg.caption().map(str::to_string),
    })
}
