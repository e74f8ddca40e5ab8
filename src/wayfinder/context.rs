//! Pre-flight context window management.
//!
//! Given a proposed message list and a model's context window, the
//! [`ContextManager`] decides which messages to keep so the request stays
//! under the token budget. Pinned messages (system prompt, first and last N)
//! always survive; the middle is ranked by an importance score and added
//! greedily until the budget is spent. A recency-only
//! [`sliding_window`](ContextManager::sliding_window) variant is available
//! for callers that prefer plain truncation.
//!
//! Token counts use a character/word estimator; it works well enough for
//! budgeting without dragging in a vendor tokenizer.
//!
//! # Example
//!
//! ```rust
//! use wayfinder::context::{ContextConfig, ContextManager};
//! use wayfinder::Message;
//!
//! let manager = ContextManager::new(ContextConfig::for_window(4096));
//! let messages = vec![
//!     Message::system("You are a terse assistant."),
//!     Message::user("Summarise the plan."),
//! ];
//! // Fits the budget: comes back unchanged.
//! let kept = manager.optimize(&messages).unwrap();
//! assert_eq!(kept.len(), 2);
//! ```

use std::collections::{HashSet, VecDeque};

use crate::wayfinder::catalog::DEFAULT_CONTEXT_WINDOW;
use crate::wayfinder::error::LlmError;
use crate::wayfinder::message::{AttachmentKind, Message, Role};
use crate::wayfinder::provider::ModelInfo;

/// Token overhead for a message's role tag.
const ROLE_OVERHEAD: usize = 5;
/// Token overhead for the separator between messages.
const SEPARATOR_OVERHEAD: usize = 10;
/// Flat token cost assumed for an image attachment.
const IMAGE_TOKENS: usize = 500;
/// Flat token cost assumed for a file attachment.
const FILE_TOKENS: usize = 100;

/// Case-insensitive markers suggesting a message contains a question.
const QUESTION_MARKERS: [&str; 8] = [
    "?", "how ", "what ", "when ", "where ", "why ", "who ", "which ",
];

/// Estimate tokens for a piece of text: a character term plus a word term.
///
/// # Example
///
/// ```rust
/// use wayfinder::context::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("twelve chars"), 4); // 12/4 + 2/2
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4 + text.split_whitespace().count() / 2
}

fn attachment_tokens(message: &Message) -> usize {
    message
        .attachments
        .iter()
        .map(|attachment| match attachment.kind {
            AttachmentKind::Text => attachment
                .text_content()
                .map(|text| estimate_tokens(&text))
                .unwrap_or(0),
            AttachmentKind::Image => IMAGE_TOKENS,
            AttachmentKind::File => FILE_TOKENS,
            // Audio and video are not budgeted here; callers strip them
            // when the model cannot take them anyway.
            AttachmentKind::Audio | AttachmentKind::Video => 0,
        })
        .sum()
}

/// Estimate tokens for a full message: content, role tag, separator, and
/// attachment overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    estimate_tokens(&message.content) + ROLE_OVERHEAD + SEPARATOR_OVERHEAD + attachment_tokens(message)
}

/// Estimate tokens for a whole message list.
pub fn estimate_total_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Budget and pruning knobs for the [`ContextManager`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Input budget: messages must fit below this.
    pub max_context: usize,
    /// Tokens held back for the model's reply.
    pub reserved_for_response: usize,
    /// Keep every system message.
    pub preserve_system: bool,
    /// How many leading non-system messages to pin.
    pub keep_first: usize,
    /// How many trailing non-system messages to pin.
    pub keep_last: usize,
    /// Per-step decay applied to the middle messages' importance.
    pub decay_factor: f64,
}

impl ContextConfig {
    /// Derive a budget from a model's context window `W`: three quarters for
    /// input, one quarter reserved for the response. A zero (unknown) window
    /// defaults to 4096.
    pub fn for_window(window: u32) -> Self {
        let window = if window == 0 {
            DEFAULT_CONTEXT_WINDOW
        } else {
            window
        } as usize;
        ContextConfig {
            max_context: window * 3 / 4,
            reserved_for_response: window / 4,
            preserve_system: true,
            keep_first: 1,
            keep_last: 3,
            decay_factor: 0.9,
        }
    }

    pub fn for_model(info: &ModelInfo) -> Self {
        Self::for_window(info.context_window)
    }

    pub fn with_max_context(mut self, max_context: usize) -> Self {
        self.max_context = max_context;
        self
    }

    pub fn with_preserve_system(mut self, preserve: bool) -> Self {
        self.preserve_system = preserve;
        self
    }

    pub fn with_keep_first(mut self, keep_first: usize) -> Self {
        self.keep_first = keep_first;
        self
    }

    pub fn with_keep_last(mut self, keep_last: usize) -> Self {
        self.keep_last = keep_last;
        self
    }

    pub fn with_decay_factor(mut self, decay_factor: f64) -> Self {
        self.decay_factor = decay_factor;
        self
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::for_window(DEFAULT_CONTEXT_WINDOW)
    }
}

/// Returned when even the optimized selection exceeds the budget. Carries
/// what was assembled so the caller can decide whether to proceed anyway.
#[derive(Debug)]
pub struct ContextOverflow {
    /// The best selection the optimizer could assemble.
    pub kept: Vec<Message>,
    pub total_tokens: usize,
    pub max_context: usize,
}

impl std::fmt::Display for ContextOverflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot fit messages into context budget: {} tokens over a budget of {}",
            self.total_tokens, self.max_context
        )
    }
}

impl std::error::Error for ContextOverflow {}

impl From<ContextOverflow> for LlmError {
    fn from(overflow: ContextOverflow) -> Self {
        LlmError::CannotFit {
            tokens: overflow.total_tokens,
            max_context: overflow.max_context,
        }
    }
}

/// Savings each reduction strategy would yield, for UI hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenReduction {
    /// Tokens freed by dropping the older half of the history.
    pub remove_oldest: usize,
    /// Tokens freed by summarising the older half (a summary is assumed to
    /// retain a fifth of the original).
    pub summarize_old: usize,
    /// Tokens freed by stripping every attachment.
    pub remove_attachments: usize,
}

/// Stateless-per-call optimizer over message lists.
pub struct ContextManager {
    pub config: ContextConfig,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        ContextManager { config }
    }

    /// Manager budgeted for the given model.
    pub fn for_model(info: &ModelInfo) -> Self {
        Self::new(ContextConfig::for_model(info))
    }

    /// Importance score for a non-system message.
    ///
    /// `age` counts from the tail: the most recent message has age 0. Note
    /// the literal `decay × age` product: under `decay < 1` this weights
    /// *older* middle messages higher. The first/last pins mask it for the
    /// common case; a `decay^age` curve would invert the ordering.
    fn importance(&self, message: &Message, age: usize) -> f64 {
        let mut score = 1.0;
        score *= (message.content.len() as f64 / 100.0).min(2.0);
        score *= self.config.decay_factor * age as f64;
        if message.role == Role::User {
            score *= 1.2;
        }
        if !message.attachments.is_empty() {
            score *= 1.5;
        }
        if has_question_marker(&message.content) {
            score *= 1.3;
        }
        score
    }

    /// Prune the message list to fit the budget.
    ///
    /// A list that already fits is returned unchanged. Otherwise system
    /// messages and the first/last pins are kept, the middle is ranked by
    /// importance and added greedily, and the result is re-emitted in the
    /// original chronological order. If even the pinned set busts the
    /// budget, the assembled selection is returned inside
    /// [`ContextOverflow`].
    pub fn optimize(
        &self,
        messages: &[Message],
    ) -> std::result::Result<Vec<Message>, ContextOverflow> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        if estimate_total_tokens(messages) <= self.config.max_context {
            return Ok(messages.to_vec());
        }

        let non_system: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role != Role::System)
            .map(|(i, _)| i)
            .collect();

        let mut pinned: HashSet<usize> = HashSet::new();
        if self.config.preserve_system {
            for (index, message) in messages.iter().enumerate() {
                if message.role == Role::System {
                    pinned.insert(index);
                }
            }
        }
        for index in non_system.iter().take(self.config.keep_first) {
            pinned.insert(*index);
        }
        let last_start = non_system.len().saturating_sub(self.config.keep_last);
        for index in &non_system[last_start..] {
            pinned.insert(*index);
        }

        let mut total_tokens: usize = pinned
            .iter()
            .map(|&index| estimate_message_tokens(&messages[index]))
            .sum();

        let mut candidates: Vec<(usize, f64)> = non_system
            .iter()
            .filter(|index| !pinned.contains(*index))
            .map(|&index| {
                let age = messages.len() - 1 - index;
                (index, self.importance(&messages[index], age))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut selected = pinned;
        for (index, _) in candidates {
            let tokens = estimate_message_tokens(&messages[index]);
            if total_tokens + tokens > self.config.max_context {
                break;
            }
            selected.insert(index);
            total_tokens += tokens;
        }

        let mut kept_indices: Vec<usize> = selected.into_iter().collect();
        kept_indices.sort_unstable();
        let kept: Vec<Message> = kept_indices
            .iter()
            .map(|&index| messages[index].clone())
            .collect();

        if total_tokens > self.config.max_context {
            return Err(ContextOverflow {
                kept,
                total_tokens,
                max_context: self.config.max_context,
            });
        }
        Ok(kept)
    }

    /// Recency-only truncation: walk from newest to oldest, prepending each
    /// message while its text-token count keeps the running sum within the
    /// ceiling. Returns the window in chronological order.
    pub fn sliding_window(&self, messages: &[Message], ceiling: usize) -> Vec<Message> {
        let mut window: VecDeque<Message> = VecDeque::new();
        let mut used = 0usize;
        for message in messages.iter().rev() {
            let tokens = estimate_tokens(&message.content);
            if used + tokens > ceiling {
                break;
            }
            used += tokens;
            window.push_front(message.clone());
        }
        window.into()
    }

    /// Report how many tokens each reduction strategy would save.
    pub fn estimate_token_reduction(&self, messages: &[Message]) -> TokenReduction {
        let non_system: Vec<&Message> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();
        let older = &non_system[..non_system.len() / 2];

        let remove_oldest: usize = older
            .iter()
            .map(|message| estimate_message_tokens(message))
            .sum();
        let remove_attachments: usize = messages.iter().map(attachment_tokens).sum();

        TokenReduction {
            remove_oldest,
            summarize_old: remove_oldest * 8 / 10,
            remove_attachments,
        }
    }
}

fn has_question_marker(content: &str) -> bool {
    let lowered = content.to_lowercase();
    QUESTION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}
