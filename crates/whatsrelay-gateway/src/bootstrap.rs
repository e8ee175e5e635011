use std::sync::Arc;

use tracing::{info, warn};
use whatsrelay_agents::{
    CompletionClient, FixedReply, LlmProvider, OpenAiProvider, ReplyStrategy, TurnAssembler,
};
use whatsrelay_channels::{ChannelSender, WhatsAppOnMessageFn, WhatsAppSender, WhatsAppState};
use whatsrelay_common::{Error, Result};
use whatsrelay_config::{AppConfig, ReplyMode};
use whatsrelay_db::ExchangeLog;

/// Build the completion provider from config. Errors when no API key is set.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn LlmProvider>> {
    let api_key = config
        .llm
        .api_key
        .clone()
        .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".into()))?;
    let provider = OpenAiProvider::with_timeout(
        api_key,
        Some(config.llm.base_url.clone()),
        config.request_timeout,
    )?;
    Ok(Arc::new(provider))
}

/// Pick the reply strategy selected by `REPLY_MODE`.
pub fn build_reply_strategy(config: &AppConfig) -> Result<Arc<dyn ReplyStrategy>> {
    let strategy: Arc<dyn ReplyStrategy> = match config.reply.mode {
        ReplyMode::Completion => {
            let completion = CompletionClient::new(build_provider(config)?, &config.llm.model)
                .with_temperature(config.llm.temperature)
                .with_max_tokens(config.llm.max_tokens)
                .with_timeout(config.request_timeout);
            Arc::new(
                TurnAssembler::new(
                    completion,
                    config.conversation.history_length,
                    config.conversation.history_scope,
                    config.conversation.reply_word_limit,
                )
                .with_max_senders(config.conversation.max_senders),
            )
        }
        ReplyMode::Fixed => Arc::new(FixedReply::new(config.reply.fixed_text.clone())),
    };
    info!(
        "reply strategy: {} (history {} turns, {:?} scope)",
        strategy.name(),
        config.conversation.history_length,
        config.conversation.history_scope
    );
    Ok(strategy)
}

/// Open the exchange log when `EXCHANGE_LOG_PATH` is set.
pub fn open_exchange_log(config: &AppConfig) -> Result<Option<Arc<ExchangeLog>>> {
    config
        .storage
        .exchange_log_path
        .as_deref()
        .map(|path| ExchangeLog::open(path).map(Arc::new))
        .transpose()
}

/// Adapt a reply strategy to the webhook callback signature.
///
/// Answered exchanges are written to `exchange_log` when one is given. Log
/// failures never affect the reply.
pub fn on_message_fn(
    strategy: Arc<dyn ReplyStrategy>,
    exchange_log: Option<Arc<ExchangeLog>>,
) -> WhatsAppOnMessageFn {
    Arc::new(move |sender_id, text| {
        let strategy = Arc::clone(&strategy);
        let exchange_log = exchange_log.clone();
        Box::pin(async move {
            let reply = strategy.reply(&sender_id, &text).await?;
            if let Some(log) = exchange_log {
                record_exchange(log, sender_id, text, reply.clone()).await;
            }
            Ok(reply)
        })
    })
}

async fn record_exchange(log: Arc<ExchangeLog>, sender_id: String, query: String, answer: String) {
    let outcome =
        tokio::task::spawn_blocking(move || log.record(&sender_id, &query, &answer)).await;
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("exchange log: {e}"),
        Err(e) => warn!("exchange log task failed: {e}"),
    }
}

/// Wire config, reply strategy and outbound sender into the webhook state.
pub fn build_whatsapp_state(
    config: &AppConfig,
    strategy: Arc<dyn ReplyStrategy>,
    exchange_log: Option<Arc<ExchangeLog>>,
    sender: Arc<dyn ChannelSender>,
) -> WhatsAppState {
    WhatsAppState::new(
        config.whatsapp.verify_token.as_str(),
        config.reply.fallback_text.as_str(),
        on_message_fn(strategy, exchange_log),
        sender,
    )
    .with_max_body_bytes(config.whatsapp.max_body_bytes)
}

/// Build the webhook state with the real Graph API sender.
pub fn whatsapp_state_from_config(config: &AppConfig) -> Result<WhatsAppState> {
    let strategy = build_reply_strategy(config)?;
    let exchange_log = open_exchange_log(config)?;
    let sender = WhatsAppSender::new(&config.whatsapp, config.request_timeout)?;
    info!("whatsapp: sending replies via {}", sender.messages_url());
    Ok(build_whatsapp_state(
        config,
        strategy,
        exchange_log,
        Arc::new(sender),
    ))
}
