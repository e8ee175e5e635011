use std::collections::VecDeque;

use whatsrelay_common::Turn;

/// Bounded FIFO of recent conversation turns, oldest first.
///
/// Capacity counts individual turns, not user/assistant pairs. Appending to a
/// full buffer evicts the oldest turn. A capacity of zero keeps nothing.
///
/// The buffer does not enforce user/assistant alternation; callers append the
/// two turns of an exchange back to back.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            capacity,
        }
    }

    pub fn append(&mut self, turn: Turn) {
        if self.capacity == 0 {
            return;
        }
        while self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Current turns in conversation order.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
