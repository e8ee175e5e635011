use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_GRAPH_API_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_GRAPH_API_VERSION: &str = "v20.0";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_HISTORY_LENGTH: usize = 4;
pub const MAX_HISTORY_LENGTH: usize = 1_000;
pub const DEFAULT_HISTORY_MAX_SENDERS: usize = 1_024;
pub const DEFAULT_REPLY_WORD_LIMIT: u32 = 5;
pub const DEFAULT_FIXED_REPLY: &str = "Yooo man";
pub const DEFAULT_FALLBACK_REPLY: &str = "Error generating the response.";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_WEBHOOK_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Fully resolved relay configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub conversation: ConversationConfig,
    pub reply: ReplyConfig,
    pub storage: StorageConfig,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// WhatsApp Cloud API credentials and endpoint.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub verify_token: String,
    pub phone_number_id: String,
    pub access_token: String,
    pub api_base_url: String,
    pub api_version: String,
    /// Webhook bodies above this size are acknowledged and dropped.
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Required only when replies come from the completion service.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    /// Output-token cap. Falls back to the reply word limit when unset.
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// History Buffer capacity, counted in turns (not exchanges).
    pub history_length: usize,
    pub history_scope: HistoryScope,
    /// Per-sender scope only: senders kept before the least recently active is dropped.
    pub max_senders: usize,
    pub reply_word_limit: u32,
}

/// Whether conversation history is shared by every sender or kept per sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    Global,
    PerSender,
}

impl std::str::FromStr for HistoryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "per_sender" | "per-sender" => Ok(Self::PerSender),
            other => Err(format!("unknown history scope '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplyConfig {
    pub mode: ReplyMode,
    pub fixed_text: String,
    pub fallback_text: String,
}

/// How replies are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Ask the completion service, with conversation history.
    Completion,
    /// Answer every text message with a canned reply.
    Fixed,
}

impl std::str::FromStr for ReplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completion" => Ok(Self::Completion),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!("unknown reply mode '{other}'")),
        }
    }
}

/// Optional write-only record of answered exchanges.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite file for the exchange log. Logging is off when unset.
    pub exchange_log_path: Option<PathBuf>,
}
