//! Context budgeting: reduce a conversation to a prompt that fits the model.
//!
//! The model has a fixed context window and part of it must stay free for
//! the response. In multi-turn mode the budgeter keeps the newest messages
//! that fit into the remaining prompt budget:
//!
//! 1. The latest message is always included.
//! 2. Older messages are walked newest to oldest and included while the
//!    running total stays within the budget.
//! 3. The walk stops at the first message that does not fit. Older, possibly
//!    smaller messages are never considered, so the selection is always a
//!    contiguous suffix of the conversation.
//!
//! Single-turn mode uses the latest message only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::ConversationMessage;
use crate::ports::ModelError;

/// Default size of the model context window, in estimated tokens.
pub const DEFAULT_CONTEXT_LIMIT: usize = 4096;

/// Default space kept free for the model's response, in estimated tokens.
pub const DEFAULT_RESPONSE_RESERVE: usize = 1536;

/// Token budget for a single prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    context_limit: usize,
    response_reserve: usize,
}

impl PromptBudget {
    /// Create a budget.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfiguration`] if the reserve leaves no
    /// room for a prompt.
    pub fn new(context_limit: usize, response_reserve: usize) -> Result<Self, ModelError> {
        if response_reserve >= context_limit {
            return Err(ModelError::InvalidConfiguration(format!(
                "response reserve ({response_reserve}) must be smaller than the context limit ({context_limit})"
            )));
        }
        Ok(Self {
            context_limit,
            response_reserve,
        })
    }

    #[must_use]
    pub const fn context_limit(&self) -> usize {
        self.context_limit
    }

    #[must_use]
    pub const fn response_reserve(&self) -> usize {
        self.response_reserve
    }

    /// Tokens available for the prompt: `context_limit - response_reserve`.
    #[must_use]
    pub const fn prompt_limit(&self) -> usize {
        self.context_limit - self.response_reserve
    }
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            context_limit: DEFAULT_CONTEXT_LIMIT,
            response_reserve: DEFAULT_RESPONSE_RESERVE,
        }
    }
}

/// Estimates how many tokens a piece of text costs.
pub trait TokenEstimator: Send + Sync + fmt::Debug {
    fn estimate(&self, text: &str) -> usize;
}

/// One token per character.
///
/// Crude and language-agnostic; it over-counts for most tokenizers, which
/// errs on the side of leaving room for the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCountEstimator;

impl TokenEstimator for CharCountEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// How much history goes into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Only the latest message.
    #[default]
    SingleTurn,
    /// As much recent history as the budget allows ("memory mode").
    MultiTurn,
}

impl PromptMode {
    #[must_use]
    pub const fn from_memory_mode(enabled: bool) -> Self {
        if enabled {
            Self::MultiTurn
        } else {
            Self::SingleTurn
        }
    }
}

/// Result of budgeting a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuiltPrompt {
    /// Final prompt text, one `"<role>: <content>"` line per message.
    pub text: String,
    /// Number of messages included.
    pub included: usize,
    /// Estimated token cost of the included messages.
    pub estimated_tokens: usize,
}

impl BuiltPrompt {
    /// True when the conversation was empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.included == 0
    }
}

/// Estimated cost of one message as it is laid out in the transcript.
fn message_cost(message: &ConversationMessage, estimator: &dyn TokenEstimator) -> usize {
    let mut line = message.transcript_line();
    line.push('\n');
    estimator.estimate(&line)
}

/// Build the prompt for a conversation.
///
/// An empty conversation produces an empty prompt.
pub fn build_prompt(
    messages: &[ConversationMessage],
    mode: PromptMode,
    budget: PromptBudget,
    estimator: &dyn TokenEstimator,
) -> BuiltPrompt {
    let Some((latest, history)) = messages.split_last() else {
        return BuiltPrompt::default();
    };

    let mut total = message_cost(latest, estimator);
    let mut start = history.len();

    if mode == PromptMode::MultiTurn {
        let limit = budget.prompt_limit();
        for (idx, message) in history.iter().enumerate().rev() {
            let cost = message_cost(message, estimator);
            if total + cost > limit {
                break;
            }
            total += cost;
            start = idx;
        }
    }

    let selected = &messages[start..];
    let text = selected
        .iter()
        .map(ConversationMessage::transcript_line)
        .collect::<Vec<_>>()
        .join("\n");

    BuiltPrompt {
        text,
        included: selected.len(),
        estimated_tokens: total,
    }
}
