//! Core conversational data types: [`Message`] and [`Attachment`].
//!
//! A message is a role-tagged unit of conversation. Its payload is either
//! textual content, a list of multimodal attachments, or both; validation
//! requires at least one of the two. Attachments carry exactly one source:
//! inline bytes, a filesystem path, or a URL.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wayfinder::error::{LlmError, Result};

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system authored message that primes or constrains assistant behaviour.
    System,
    /// A user authored message.
    User,
    /// An assistant authored message (model responses).
    Assistant,
}

impl Role {
    /// The lowercase wire tag for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// The media category of an [`Attachment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
    Text,
    Audio,
    Video,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::File => "file",
            AttachmentKind::Text => "text",
            AttachmentKind::Audio => "audio",
            AttachmentKind::Video => "video",
        }
    }
}

/// A multimodal payload attached to a [`Message`].
///
/// Exactly one of `data`, `path`, or `url` should be set; [`Attachment::validate`]
/// requires at least one. Constructors enforce the single-source shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub kind: AttachmentKind,
    /// Inline payload bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    /// Filesystem path to the payload. The crate never reads it; resolution
    /// is the vendor client's concern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Remote location of the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional MIME type, e.g. `image/png`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Optional payload size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Attachment {
    fn blank(kind: AttachmentKind) -> Self {
        Attachment {
            id: Uuid::new_v4().to_string(),
            kind,
            data: None,
            path: None,
            url: None,
            name: None,
            mime_type: None,
            size: None,
        }
    }

    /// Attachment carrying inline bytes.
    pub fn inline(kind: AttachmentKind, data: Vec<u8>) -> Self {
        let mut a = Self::blank(kind);
        a.size = Some(data.len() as u64);
        a.data = Some(data);
        a
    }

    /// Attachment referencing a filesystem path.
    pub fn from_path(kind: AttachmentKind, path: impl Into<String>) -> Self {
        let mut a = Self::blank(kind);
        a.path = Some(path.into());
        a
    }

    /// Attachment referencing a URL.
    pub fn from_url(kind: AttachmentKind, url: impl Into<String>) -> Self {
        let mut a = Self::blank(kind);
        a.url = Some(url.into());
        a
    }

    /// Text attachment holding the given string inline.
    pub fn text(content: impl Into<String>) -> Self {
        Self::inline(AttachmentKind::Text, content.into().into_bytes())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Whether any of the three sources is present.
    pub fn has_source(&self) -> bool {
        self.data.is_some() || self.path.is_some() || self.url.is_some()
    }

    /// The inline payload decoded as UTF-8, for text-kind attachments.
    pub fn text_content(&self) -> Option<String> {
        self.data
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Check the attachment invariant: identifier set and at least one source.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(LlmError::invalid("attachment id must not be empty"));
        }
        if !self.has_source() {
            return Err(LlmError::invalid(format!(
                "attachment '{}' has no data, path, or url",
                self.id
            )));
        }
        Ok(())
    }
}

/// A role-tagged unit of conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    /// Textual content. May be empty when attachments carry the payload.
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Create a message with a fresh identifier and the current timestamp.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Create a message carrying attachments alongside (possibly empty) text.
    pub fn with_attachments(
        role: Role,
        content: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        let mut m = Self::new(role, content);
        m.attachments = attachments;
        m
    }

    /// Shorthand for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Shorthand for an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Shorthand for a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Attach a metadata entry, returning the message for chaining.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Check the message invariant: identifier non-empty and either content
    /// non-empty or at least one attachment. Attachments are validated too.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(LlmError::invalid("message id must not be empty"));
        }
        if self.content.is_empty() && self.attachments.is_empty() {
            return Err(LlmError::invalid(format!(
                "message '{}' has neither content nor attachments",
                self.id
            )));
        }
        for attachment in &self.attachments {
            attachment.validate()?;
        }
        Ok(())
    }
}
