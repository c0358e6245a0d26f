//! Per-session conversation state.
//!
//! The summary is a sliding character window over the transcript, not a
//! semantic summary: once it exceeds its budget the oldest characters are
//! dropped, which may cut a line in half.

use crate::config::DEFAULT_SUMMARY_MAX_CHARS;
use crate::models::DocumentChunk;
use crate::prompt::{QueryContext, ResponseMode};

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<DocumentChunk>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    text: String,
    max_chars: usize,
}

impl ConversationSummary {
    pub fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            max_chars,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn record(&mut self, question: &str, answer: &str) {
        self.text
            .push_str(&format!("User asked: {question}\nAssistant answered: {answer}\n"));
        self.truncate_front();
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    fn truncate_front(&mut self) {
        let len = self.text.chars().count();
        if len <= self.max_chars {
            return;
        }

        let drop = len - self.max_chars;
        let cut = self
            .text
            .char_indices()
            .nth(drop)
            .map_or(self.text.len(), |(offset, _)| offset);
        self.text.drain(..cut);
    }
}

impl Default for ConversationSummary {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_MAX_CHARS)
    }
}

/// Which turn the session view is focused on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Every turn, newest first.
    #[default]
    Latest,
    Turn(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    turns: Vec<ConversationTurn>,
    summary: ConversationSummary,
    selection: Selection,
    mode: ResponseMode,
}

impl Session {
    pub fn new(summary_max_chars: usize) -> Self {
        Self {
            turns: Vec::new(),
            summary: ConversationSummary::new(summary_max_chars),
            selection: Selection::Latest,
            mode: ResponseMode::default(),
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn summary(&self) -> &ConversationSummary {
        &self.summary
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ResponseMode) {
        self.mode = mode;
    }

    /// Framing for the next question: current mode plus the rolling summary.
    pub fn query_context(&self) -> QueryContext<'_> {
        QueryContext::Session {
            mode: self.mode,
            summary: self.summary.as_str(),
        }
    }

    /// Appends a completed turn, folds it into the summary and focuses it.
    pub fn record_turn(&mut self, turn: ConversationTurn) -> usize {
        self.summary.record(&turn.question, &turn.answer);
        self.turns.push(turn);
        let index = self.turns.len() - 1;
        self.selection = Selection::Turn(index);
        index
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.summary.clear();
        self.selection = Selection::Latest;
    }

    /// Focuses a past turn. Returns `false` when `index` is out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.turns.len() {
            return false;
        }
        self.selection = Selection::Turn(index);
        true
    }

    pub fn select_latest(&mut self) {
        self.selection = Selection::Latest;
    }

    /// Turns to display for the current selection.
    pub fn displayed_turns(&self) -> Vec<(usize, &ConversationTurn)> {
        match self.selection {
            Selection::Turn(index) => self
                .turns
                .get(index)
                .map(|turn| vec![(index, turn)])
                .unwrap_or_default(),
            Selection::Latest => self.turns.iter().enumerate().rev().collect(),
        }
    }
}
