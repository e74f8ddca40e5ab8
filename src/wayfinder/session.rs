//! The branchable session aggregate.
//!
//! A [`Session`] owns exactly one [`Conversation`], which owns its messages
//! and attachments. Relationships between sessions (parent, children) are
//! identifier references resolved through a storage backend, never owning
//! pointers, so sessions stay freely clonable and serialisable.
//!
//! Branching copies the first `i` messages of the parent conversation into a
//! new session; merging combines two sessions' messages in one of three
//! styles (continuation, rebase, cherry-pick).
//!
//! # Example
//!
//! ```rust
//! use wayfinder::{Message, Session};
//!
//! let mut session = Session::new("research", "openai", "gpt-4o");
//! session.append_message(Message::user("What is a monad?"));
//! session.append_message(Message::assistant("A monoid in the category of endofunctors."));
//!
//! // Fork the conversation after the first message.
//! let branch = session
//!     .create_branch("branch-1".to_string(), "alternative answer", 1)
//!     .unwrap();
//! assert_eq!(branch.parent_id, session.id);
//! assert_eq!(branch.conversation.messages.len(), 1);
//! assert_eq!(session.child_ids.last().map(String::as_str), Some("branch-1"));
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wayfinder::error::{LlmError, Result};
use crate::wayfinder::message::Message;

/// Default sampling temperature applied to fresh conversations.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// An ordered sequence of messages bound to a provider/model pair.
///
/// Cloning a conversation produces an independent message list with copied
/// metadata maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub provider: String,
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Conversation {
    /// Create an empty conversation bound to the given provider and model.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Conversation {
            id: Uuid::new_v4().to_string(),
            provider: provider.into(),
            model: model.into(),
            messages: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            stop_sequences: Vec::new(),
            system_prompt: None,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    /// Append a message and refresh the updated timestamp.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }
}

/// Styles of combining two sessions' messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeType {
    /// Append the source's messages after the target's.
    Continuation,
    /// Truncate the target at the source's branch point, then append the
    /// source's messages.
    Rebase,
    /// Append only the source messages selected by id.
    CherryPick,
}

/// Options controlling [`Session::merge_from`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOptions {
    pub merge_type: MergeType,
    /// Source message ids to pick; only meaningful for
    /// [`MergeType::CherryPick`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_ids: Vec<String>,
}

impl MergeOptions {
    pub fn continuation() -> Self {
        MergeOptions {
            merge_type: MergeType::Continuation,
            message_ids: Vec::new(),
        }
    }

    pub fn rebase() -> Self {
        MergeOptions {
            merge_type: MergeType::Rebase,
            message_ids: Vec::new(),
        }
    }

    pub fn cherry_pick(message_ids: Vec<String>) -> Self {
        MergeOptions {
            merge_type: MergeType::CherryPick,
            message_ids,
        }
    }
}

/// Outcome of a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    pub target_id: String,
    pub source_id: String,
    pub merge_type: MergeType,
    /// How many messages were appended to the target.
    pub merged_messages: usize,
}

/// The aggregate root of a conversation, with branching bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub conversation: Conversation,
    /// Tags with set semantics; duplicates are silently dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Identifier of the parent session; empty for a root session.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_id: String,
    /// Index into the parent conversation where this branch was cut.
    #[serde(default)]
    pub branch_point: usize,
    /// Human-readable branch label; empty for a root session.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch_name: String,
    /// Identifiers of direct child sessions, in creation order, unique.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<String>,
}

impl Session {
    /// Create a fresh root session with an empty conversation.
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            conversation: Conversation::new(provider, model),
            tags: Vec::new(),
            config: HashMap::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            parent_id: String::new(),
            branch_point: 0,
            branch_name: String::new(),
            child_ids: Vec::new(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a message to the owned conversation.
    pub fn append_message(&mut self, message: Message) {
        self.conversation.add_message(message);
        self.touch();
    }

    /// Add a tag. Adding an existing tag is a no-op (set semantics).
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
            self.touch();
        }
    }

    /// Remove a tag if present.
    pub fn remove_tag(&mut self, tag: &str) {
        if let Some(pos) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(pos);
            self.touch();
        }
    }

    /// Record a child session id. Duplicate ids are silently dropped.
    pub fn add_child(&mut self, child_id: impl Into<String>) {
        let child_id = child_id.into();
        if !self.child_ids.contains(&child_id) {
            self.child_ids.push(child_id);
            self.touch();
        }
    }

    /// Remove a child session id if present.
    pub fn remove_child(&mut self, child_id: &str) {
        if let Some(pos) = self.child_ids.iter().position(|c| c == child_id) {
            self.child_ids.remove(pos);
            self.touch();
        }
    }

    /// Set a configuration entry.
    pub fn set_config(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.insert(key.into(), value.into());
        self.touch();
    }

    /// Whether this session was created by branching another session.
    pub fn is_branch(&self) -> bool {
        !self.parent_id.is_empty()
    }

    /// One-level parentage check: is `other` a direct branch of `self`?
    ///
    /// Full-ancestry traversal requires resolving parent ids through the
    /// storage backend; the session itself holds no back-reference to the
    /// parent object.
    pub fn is_ancestor_of(&self, other: &Session) -> bool {
        other.parent_id == self.id
    }

    /// Fork this session at message index `branch_point`.
    ///
    /// The branch receives a deep copy of the first `branch_point` messages,
    /// records `self.id` as its parent, and is appended to `self.child_ids`.
    /// `branch_point` may range from 0 (empty branch) to the current message
    /// count (full copy); anything larger fails without mutating either side.
    pub fn create_branch(
        &mut self,
        branch_id: String,
        branch_name: impl Into<String>,
        branch_point: usize,
    ) -> Result<Session> {
        if branch_point > self.conversation.messages.len() {
            return Err(LlmError::invalid(format!(
                "branch point {} out of range (conversation has {} messages)",
                branch_point,
                self.conversation.messages.len()
            )));
        }
        if branch_id.is_empty() {
            return Err(LlmError::invalid("branch id must not be empty"));
        }

        let branch_name = branch_name.into();
        let now = Utc::now();
        let mut conversation = self.conversation.clone();
        conversation.id = Uuid::new_v4().to_string();
        conversation.messages.truncate(branch_point);
        conversation.created_at = now;
        conversation.updated_at = now;

        let branch = Session {
            id: branch_id.clone(),
            name: format!("{} ({})", self.name, branch_name),
            conversation,
            tags: self.tags.clone(),
            config: self.config.clone(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            parent_id: self.id.clone(),
            branch_point,
            branch_name,
            child_ids: Vec::new(),
        };

        self.add_child(branch_id);
        Ok(branch)
    }

    /// Merge messages from `source` into this session.
    ///
    /// - [`MergeType::Continuation`]: source messages are appended after the
    ///   existing ones.
    /// - [`MergeType::Rebase`]: the target history is truncated at the
    ///   source's branch point before the source messages are appended.
    /// - [`MergeType::CherryPick`]: only source messages whose ids appear in
    ///   `options.message_ids` are appended, in source order.
    pub fn merge_from(&mut self, source: &Session, options: &MergeOptions) -> Result<MergeResult> {
        let merged: Vec<Message> = match options.merge_type {
            MergeType::Continuation => source.conversation.messages.clone(),
            MergeType::Rebase => {
                self.conversation.messages.truncate(source.branch_point);
                source.conversation.messages.clone()
            }
            MergeType::CherryPick => {
                if options.message_ids.is_empty() {
                    return Err(LlmError::invalid(
                        "cherry-pick merge requires at least one message id",
                    ));
                }
                source
                    .conversation
                    .messages
                    .iter()
                    .filter(|m| options.message_ids.contains(&m.id))
                    .cloned()
                    .collect()
            }
        };

        let merged_messages = merged.len();
        self.conversation.messages.extend(merged);
        self.conversation.updated_at = Utc::now();
        self.touch();

        Ok(MergeResult {
            target_id: self.id.clone(),
            source_id: source.id.clone(),
            merge_type: options.merge_type,
            merged_messages,
        })
    }

    /// Lightweight projection for listing without loading message history.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.conversation.messages.len(),
            model: self.conversation.model.clone(),
            provider: self.conversation.provider.clone(),
            tags: self.tags.clone(),
            parent_id: self.parent_id.clone(),
            branch_name: self.branch_name.clone(),
            child_count: self.child_ids.len(),
            is_branch: self.is_branch(),
        }
    }
}

/// Projection of a [`Session`] used for listing and search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub model: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch_name: String,
    pub child_count: usize,
    pub is_branch: bool,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        session.info()
    }
}

/// Recursive pairing of a [`SessionInfo`] with its child subtrees, used to
/// visualise branch topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchTree {
    pub info: SessionInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BranchTree>,
}

impl BranchTree {
    pub fn leaf(info: SessionInfo) -> Self {
        BranchTree {
            info,
            children: Vec::new(),
        }
    }

    /// Total number of sessions in the tree, this node included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(BranchTree::size).sum::<usize>()
    }
}
