pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{
    AppConfig, ConversationConfig, GatewayConfig, HistoryScope, LlmConfig, ReplyConfig, ReplyMode,
    StorageConfig, WhatsAppConfig,
};
