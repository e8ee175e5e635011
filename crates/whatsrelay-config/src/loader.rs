use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};
use whatsrelay_common::{Error, Result};

use crate::model::{
    AppConfig, ConversationConfig, DEFAULT_FALLBACK_REPLY, DEFAULT_FIXED_REPLY,
    DEFAULT_GRAPH_API_BASE_URL, DEFAULT_GRAPH_API_VERSION, DEFAULT_HISTORY_LENGTH,
    DEFAULT_HISTORY_MAX_SENDERS, DEFAULT_HOST, DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_PORT, DEFAULT_REPLY_WORD_LIMIT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TEMPERATURE,
    DEFAULT_WEBHOOK_MAX_BODY_BYTES, GatewayConfig, HistoryScope, LlmConfig, MAX_HISTORY_LENGTH,
    ReplyConfig, ReplyMode, StorageConfig, WhatsAppConfig,
};

/// Resolves [`AppConfig`] from a `.env` file and the process environment.
///
/// Variables already present in the environment win over the `.env` file.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    env_file: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a specific dotenv file instead of searching for `.env`.
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<AppConfig> {
        self.load_env_file()?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn load_env_file(&self) -> Result<()> {
        match &self.env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    Error::Config(format!("failed to read env file {}: {e}", path.display()))
                })?;
                info!("loaded environment from {}", path.display());
            }
            None => match dotenvy::dotenv() {
                Ok(path) => info!("loaded environment from {}", path.display()),
                Err(e) if e.not_found() => debug!("no .env file found, using process environment"),
                Err(e) => return Err(Error::Config(format!("failed to read .env: {e}"))),
            },
        }
        Ok(())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let gateway = GatewayConfig {
            host: vars.or("HOST", DEFAULT_HOST),
            port: vars.parse_or("PORT", DEFAULT_PORT)?,
        };

        let whatsapp = WhatsAppConfig {
            verify_token: vars.required("WEBHOOK_VERIFY_TOKEN")?,
            phone_number_id: vars.required("PHONE_NUMBER_ID")?,
            access_token: vars.required("ACCESS_TOKEN")?,
            api_base_url: vars
                .or("GRAPH_API_BASE_URL", DEFAULT_GRAPH_API_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_version: vars.or("GRAPH_API_VERSION", DEFAULT_GRAPH_API_VERSION),
            max_body_bytes: vars.parse_or("WEBHOOK_MAX_BODY_BYTES", DEFAULT_WEBHOOK_MAX_BODY_BYTES)?,
        };
        if whatsapp.max_body_bytes == 0 {
            return Err(Error::Config("WEBHOOK_MAX_BODY_BYTES must be at least 1".into()));
        }

        let reply = ReplyConfig {
            mode: vars.parse_or("REPLY_MODE", ReplyMode::Completion)?,
            fixed_text: vars.or("FIXED_REPLY_TEXT", DEFAULT_FIXED_REPLY),
            fallback_text: vars.or("FALLBACK_REPLY_TEXT", DEFAULT_FALLBACK_REPLY),
        };

        let api_key = vars.get("OPENAI_API_KEY");
        if reply.mode == ReplyMode::Completion && api_key.is_none() {
            return Err(Error::Config(
                "OPENAI_API_KEY is required when REPLY_MODE is 'completion'".into(),
            ));
        }

        let llm = LlmConfig {
            api_key,
            base_url: vars
                .or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: vars.or("OPENAI_MODEL", DEFAULT_MODEL),
            temperature: vars.parse_or("OPENAI_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            max_tokens: vars.parse_opt("OPENAI_MAX_TOKENS")?,
        };

        let conversation = ConversationConfig {
            history_length: vars.parse_or("HISTORY_LENGTH", DEFAULT_HISTORY_LENGTH)?,
            history_scope: vars.parse_or("HISTORY_SCOPE", HistoryScope::Global)?,
            max_senders: vars.parse_or("HISTORY_MAX_SENDERS", DEFAULT_HISTORY_MAX_SENDERS)?,
            reply_word_limit: vars.parse_or("REPLY_WORD_LIMIT", DEFAULT_REPLY_WORD_LIMIT)?,
        };
        if conversation.history_length > MAX_HISTORY_LENGTH {
            return Err(Error::Config(format!(
                "HISTORY_LENGTH must be at most {MAX_HISTORY_LENGTH}"
            )));
        }
        if conversation.max_senders == 0 {
            return Err(Error::Config("HISTORY_MAX_SENDERS must be at least 1".into()));
        }
        if conversation.reply_word_limit == 0 {
            return Err(Error::Config("REPLY_WORD_LIMIT must be at least 1".into()));
        }

        let timeout_secs: u64 = vars.parse_or("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(Error::Config("REQUEST_TIMEOUT_SECS must be at least 1".into()));
        }

        Ok(AppConfig {
            gateway,
            whatsapp,
            llm,
            conversation,
            reply,
            storage: StorageConfig {
                exchange_log_path: vars.get("EXCHANGE_LOG_PATH").map(PathBuf::from),
            },
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Thin accessor over a variable lookup. Blank values count as unset.
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| Error::Config(format!("{key} is required")))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_opt<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
            })
            .transpose()
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }
}
