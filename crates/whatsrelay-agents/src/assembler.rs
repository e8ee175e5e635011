use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use whatsrelay_common::{Result, Turn};
use whatsrelay_config::HistoryScope;

use crate::completion::CompletionClient;
use crate::history::HistoryBuffer;
use crate::reply::ReplyStrategy;

/// System instruction sent when there is no prior history.
pub fn instruction_without_history(max_words: u32) -> Turn {
    Turn::system(format!("Answer using no more than {max_words} words."))
}

/// System instruction sent ahead of prior history.
pub fn instruction_with_history(max_words: u32) -> Turn {
    Turn::system(format!(
        "Answer using no more than {max_words} words taking into account the following chat history."
    ))
}

/// Build the exact message list for one completion request:
/// `[instruction, *history, user_turn]`, with the instruction variant chosen by
/// whether `history` is empty.
pub fn assemble_messages(history: &[Turn], user_turn: &Turn, max_words: u32) -> Vec<Turn> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if history.is_empty() {
        messages.push(instruction_without_history(max_words));
    } else {
        messages.push(instruction_with_history(max_words));
        messages.extend_from_slice(history);
    }
    messages.push(user_turn.clone());
    messages
}

type SharedBuffer = Arc<Mutex<HistoryBuffer>>;

/// Senders kept in per-sender scope before the least recently active one is dropped.
const DEFAULT_MAX_SENDERS: usize = 1_024;

struct SenderSlot {
    buffer: SharedBuffer,
    last_used: AtomicU64,
}

enum Histories {
    Global(SharedBuffer),
    PerSender {
        capacity: usize,
        max_senders: usize,
        clock: AtomicU64,
        slots: DashMap<String, SenderSlot>,
    },
}

/// Drives one exchange: snapshot history, assemble, complete, record.
///
/// Each history buffer is locked for the whole exchange, so overlapping
/// inbound messages that share a buffer are answered one at a time and the
/// two turns of an exchange are always appended back to back.
pub struct TurnAssembler {
    completion: CompletionClient,
    histories: Histories,
    max_words: u32,
}

impl TurnAssembler {
    pub fn new(
        completion: CompletionClient,
        capacity: usize,
        scope: HistoryScope,
        max_words: u32,
    ) -> Self {
        let histories = match scope {
            HistoryScope::Global => {
                Histories::Global(Arc::new(Mutex::new(HistoryBuffer::new(capacity))))
            }
            HistoryScope::PerSender => Histories::PerSender {
                capacity,
                max_senders: DEFAULT_MAX_SENDERS,
                clock: AtomicU64::new(0),
                slots: DashMap::new(),
            },
        };
        Self {
            completion,
            histories,
            max_words,
        }
    }

    /// Bound the number of per-sender buffers. No effect in global scope.
    pub fn with_max_senders(mut self, max: usize) -> Self {
        if let Histories::PerSender { max_senders, .. } = &mut self.histories {
            *max_senders = max.max(1);
        }
        self
    }

    fn buffer_for(&self, sender_id: &str) -> SharedBuffer {
        match &self.histories {
            Histories::Global(buffer) => Arc::clone(buffer),
            Histories::PerSender {
                capacity,
                max_senders,
                clock,
                slots,
            } => {
                let tick = clock.fetch_add(1, Ordering::Relaxed);
                if let Some(slot) = slots.get(sender_id) {
                    slot.last_used.store(tick, Ordering::Relaxed);
                    return Arc::clone(&slot.buffer);
                }

                while slots.len() >= *max_senders {
                    let oldest = slots
                        .iter()
                        .min_by_key(|slot| slot.last_used.load(Ordering::Relaxed))
                        .map(|slot| slot.key().clone());
                    let Some(oldest) = oldest else { break };
                    slots.remove(&oldest);
                    debug!(evicted = %oldest, "dropped least recently active sender history");
                }

                let slot = slots.entry(sender_id.to_string()).or_insert_with(|| SenderSlot {
                    buffer: Arc::new(Mutex::new(HistoryBuffer::new(*capacity))),
                    last_used: AtomicU64::new(tick),
                });
                Arc::clone(&slot.buffer)
            }
        }
    }

    /// Answer `text` from `sender_id`. On failure the history is left untouched.
    #[instrument(skip(self, text), fields(sender = %sender_id))]
    pub async fn respond(&self, sender_id: &str, text: &str) -> Result<String> {
        let buffer = self.buffer_for(sender_id);
        let mut history = buffer.lock().await;

        let user_turn = Turn::user(text);
        let snapshot = history.snapshot();
        let messages = assemble_messages(&snapshot, &user_turn, self.max_words);
        debug!(
            history_turns = snapshot.len(),
            "assembled {} messages",
            messages.len()
        );

        let reply = self.completion.complete(&messages, self.max_words).await?;

        history.append(user_turn);
        history.append(Turn::assistant(reply.clone()));
        Ok(reply)
    }

    /// Current history seen by `sender_id`. Does not create a buffer.
    pub async fn history(&self, sender_id: &str) -> Vec<Turn> {
        let buffer = match &self.histories {
            Histories::Global(buffer) => Arc::clone(buffer),
            Histories::PerSender { slots, .. } => match slots.get(sender_id) {
                Some(slot) => Arc::clone(&slot.buffer),
                None => return Vec::new(),
            },
        };
        buffer.lock().await.snapshot()
    }
}

#[async_trait]
impl ReplyStrategy for TurnAssembler {
    fn name(&self) -> &str {
        "completion"
    }

    async fn reply(&self, sender_id: &str, text: &str) -> Result<String> {
        self.respond(sender_id, text).await
    }
}
