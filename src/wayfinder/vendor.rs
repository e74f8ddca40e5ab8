//! The vendor-client contract and message translation.
//!
//! Providers delegate every network interaction to a [`VendorClient`]: an
//! external collaborator (typically an HTTP SDK) that speaks one vendor's
//! wire format. The crate translates between domain [`Message`]s and the
//! vendor content-part representation here, so vendor clients only ever see
//! [`VendorMessage`] values.
//!
//! # Translation rules
//!
//! - A domain message with non-empty content and no attachments maps to a
//!   single text part.
//! - With attachments, the text content (if any) becomes the first part,
//!   followed by one part per attachment mapped by kind.
//! - In the reverse direction the first text part becomes the message
//!   content; later text parts become text-kind attachments named
//!   `text-1`, `text-2`, ... in order.
//! - A vendor `tool` role maps to the domain `assistant` role.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::wayfinder::error::Result;
use crate::wayfinder::message::{Attachment, AttachmentKind, Message, Role};
use crate::wayfinder::provider::{ChunkStream, TokenUsage};

/// Role tags understood by vendor APIs. Superset of the domain roles: some
/// vendors report tool results as a distinct `tool` role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorRole {
    User,
    Assistant,
    System,
    Tool,
}

/// One content part of a [`VendorMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VendorContentPart {
    Text {
        text: String,
    },
    /// Either base64 bytes with a media type, or a URL.
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    File {
        filename: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    Audio {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    Video {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

/// A message in the vendor's representation: a role plus ordered content
/// parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorMessage {
    pub role: VendorRole,
    pub parts: Vec<VendorContentPart>,
}

/// A complete reply in the vendor's representation.
#[derive(Debug, Clone)]
pub struct VendorResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl VendorResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        VendorResponse {
            content: content.into(),
            model: model.into(),
            usage: None,
            finish_reason: None,
            metadata: HashMap::new(),
        }
    }
}

/// Vendor-native parameter bag. Providers insert only the knobs the caller
/// set; vendor clients ignore keys they do not recognise.
pub type VendorOptions = serde_json::Map<String, serde_json::Value>;

/// Contract a vendor SDK must satisfy to back a provider adapter.
///
/// Every method observes the cancellation token and returns promptly once it
/// fires. File and network handles opened by an implementation are owned by
/// it; the crate never touches them.
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// Single-prompt convenience wrapper over
    /// [`generate_message`](VendorClient::generate_message).
    async fn generate(
        &self,
        cancel: CancellationToken,
        prompt: &str,
        options: &VendorOptions,
    ) -> Result<String> {
        let message = VendorMessage {
            role: VendorRole::User,
            parts: vec![VendorContentPart::Text {
                text: prompt.to_string(),
            }],
        };
        let response = self.generate_message(cancel, &[message], options).await?;
        Ok(response.content)
    }

    /// Full chat completion call.
    async fn generate_message(
        &self,
        cancel: CancellationToken,
        messages: &[VendorMessage],
        options: &VendorOptions,
    ) -> Result<VendorResponse>;

    /// Schema-constrained completion call.
    async fn generate_with_schema(
        &self,
        cancel: CancellationToken,
        prompt: &str,
        schema: &serde_json::Value,
        options: &VendorOptions,
    ) -> Result<serde_json::Value>;

    /// Single-prompt convenience wrapper over
    /// [`stream_message`](VendorClient::stream_message).
    async fn stream(
        &self,
        cancel: CancellationToken,
        prompt: &str,
        options: &VendorOptions,
    ) -> Result<ChunkStream> {
        let message = VendorMessage {
            role: VendorRole::User,
            parts: vec![VendorContentPart::Text {
                text: prompt.to_string(),
            }],
        };
        self.stream_message(cancel, &[message], options).await
    }

    /// Streaming chat completion call.
    async fn stream_message(
        &self,
        cancel: CancellationToken,
        messages: &[VendorMessage],
        options: &VendorOptions,
    ) -> Result<ChunkStream>;
}

fn attachment_to_part(attachment: &Attachment) -> VendorContentPart {
    // A path-sourced attachment rides in the URL slot; the vendor client is
    // the one with filesystem access.
    let location = attachment
        .url
        .clone()
        .or_else(|| attachment.path.clone());

    match attachment.kind {
        AttachmentKind::Text => VendorContentPart::Text {
            text: attachment
                .text_content()
                .or_else(|| location.clone())
                .unwrap_or_default(),
        },
        AttachmentKind::Image => VendorContentPart::Image {
            data: attachment.data.as_ref().map(|bytes| BASE64.encode(bytes)),
            media_type: attachment.mime_type.clone(),
            url: location,
        },
        AttachmentKind::File => VendorContentPart::File {
            filename: attachment
                .name
                .clone()
                .or_else(|| location.clone())
                .unwrap_or_else(|| attachment.id.clone()),
            data: attachment.data.as_ref().map(|bytes| BASE64.encode(bytes)),
            media_type: attachment.mime_type.clone(),
        },
        AttachmentKind::Audio => VendorContentPart::Audio {
            url: location.unwrap_or_default(),
            media_type: attachment.mime_type.clone(),
        },
        AttachmentKind::Video => VendorContentPart::Video {
            url: location.unwrap_or_default(),
            media_type: attachment.mime_type.clone(),
        },
    }
}

fn part_to_attachment(part: &VendorContentPart, text_ordinal: &mut usize) -> Attachment {
    match part {
        VendorContentPart::Text { text } => {
            *text_ordinal += 1;
            Attachment::text(text.clone()).with_name(format!("text-{}", text_ordinal))
        }
        VendorContentPart::Image {
            data,
            media_type,
            url,
        } => {
            let mut attachment = match (data, url) {
                (Some(encoded), _) => Attachment::inline(
                    AttachmentKind::Image,
                    BASE64.decode(encoded).unwrap_or_default(),
                ),
                (None, Some(url)) => Attachment::from_url(AttachmentKind::Image, url.clone()),
                (None, None) => Attachment::inline(AttachmentKind::Image, Vec::new()),
            };
            attachment.mime_type = media_type.clone();
            attachment
        }
        VendorContentPart::File {
            filename,
            data,
            media_type,
        } => {
            let mut attachment = match data {
                Some(encoded) => Attachment::inline(
                    AttachmentKind::File,
                    BASE64.decode(encoded).unwrap_or_default(),
                ),
                None => Attachment::from_path(AttachmentKind::File, filename.clone()),
            };
            attachment.name = Some(filename.clone());
            attachment.mime_type = media_type.clone();
            attachment
        }
        VendorContentPart::Audio { url, media_type } => {
            let mut attachment = Attachment::from_url(AttachmentKind::Audio, url.clone());
            attachment.mime_type = media_type.clone();
            attachment
        }
        VendorContentPart::Video { url, media_type } => {
            let mut attachment = Attachment::from_url(AttachmentKind::Video, url.clone());
            attachment.mime_type = media_type.clone();
            attachment
        }
    }
}

/// Translate a domain message into the vendor content-part representation.
pub fn to_vendor_message(message: &Message) -> VendorMessage {
    let role = match message.role {
        Role::User => VendorRole::User,
        Role::Assistant => VendorRole::Assistant,
        Role::System => VendorRole::System,
    };

    let mut parts = Vec::with_capacity(1 + message.attachments.len());
    if !message.content.is_empty() {
        parts.push(VendorContentPart::Text {
            text: message.content.clone(),
        });
    }
    for attachment in &message.attachments {
        parts.push(attachment_to_part(attachment));
    }
    if parts.is_empty() {
        parts.push(VendorContentPart::Text {
            text: String::new(),
        });
    }

    VendorMessage { role, parts }
}

/// Translate a slice of domain messages.
pub fn to_vendor_messages(messages: &[Message]) -> Vec<VendorMessage> {
    messages.iter().map(to_vendor_message).collect()
}

/// Translate a vendor message back into the domain representation.
///
/// The first text part becomes the message content; every later part becomes
/// an attachment. A vendor `tool` role maps to `assistant`.
pub fn from_vendor_message(message: &VendorMessage) -> Message {
    let role = match message.role {
        VendorRole::User => Role::User,
        VendorRole::Assistant | VendorRole::Tool => Role::Assistant,
        VendorRole::System => Role::System,
    };

    let mut content: Option<String> = None;
    let mut attachments = Vec::new();
    let mut text_ordinal = 0usize;

    for part in &message.parts {
        match part {
            VendorContentPart::Text { text } if content.is_none() => {
                content = Some(text.clone());
            }
            _ => attachments.push(part_to_attachment(part, &mut text_ordinal)),
        }
    }

    Message::with_attachments(role, content.unwrap_or_default(), attachments)
}
