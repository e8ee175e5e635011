pub mod assembler;
pub mod completion;
pub mod history;
pub mod openai;
pub mod providers;
pub mod reply;

pub use assembler::{
    TurnAssembler, assemble_messages, instruction_with_history, instruction_without_history,
};
pub use completion::CompletionClient;
pub use history::HistoryBuffer;
pub use openai::OpenAiProvider;
pub use providers::{LlmProvider, LlmRequest, LlmResponse, Usage};
pub use reply::{FixedReply, ReplyStrategy};
