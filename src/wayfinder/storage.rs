//! The storage-backend contract.
//!
//! Durable persistence is an external collaborator: filesystem, SQLite, or
//! in-memory backends all implement [`SessionStore`]. The crate holds only
//! value copies of sessions; the store is the sole authority on their
//! durable existence. Export rendering and the merge algebra are supplied as
//! default method implementations so backends only write the plumbing they
//! actually own.

use std::io::Write;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::wayfinder::error::{LlmError, Result};
use crate::wayfinder::export::render_session;
use crate::wayfinder::session::{BranchTree, MergeOptions, MergeResult, Session, SessionInfo};

/// Formats a session can be exported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
    Text,
    Html,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Text => "text",
            ExportFormat::Html => "html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "text" | "txt" => Ok(ExportFormat::Text),
            "html" => Ok(ExportFormat::Html),
            other => Err(LlmError::invalid(format!(
                "unknown export format '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hit from a full-text session search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub info: SessionInfo,
    /// Content excerpt around the match.
    pub snippet: String,
    /// Index of the matching message within the conversation.
    pub message_index: usize,
}

/// Contract a session storage backend must satisfy.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &Session) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Session>;

    async fn update(&self, session: &Session) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<SessionInfo>>;

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;

    /// Direct children of a session, resolved through parent-id links.
    async fn get_children(&self, id: &str) -> Result<Vec<SessionInfo>>;

    /// The branch topology rooted at `id`.
    async fn get_branch_tree(&self, id: &str) -> Result<BranchTree>;

    /// Render a stored session into `writer` in the requested format.
    async fn export_session(
        &self,
        id: &str,
        format: ExportFormat,
        writer: &mut (dyn Write + Send),
    ) -> Result<()> {
        let session = self.get(id).await?;
        render_session(&session, format, writer)
            .map_err(|e| LlmError::other(format!("export failed: {}", e)))
    }

    /// Merge `source_id` into `target_id` and persist the result.
    async fn merge_sessions(
        &self,
        target_id: &str,
        source_id: &str,
        options: &MergeOptions,
    ) -> Result<MergeResult> {
        let mut target = self.get(target_id).await?;
        let source = self.get(source_id).await?;
        let result = target.merge_from(&source, options)?;
        self.update(&target).await?;
        Ok(result)
    }

    /// Flush and release backend resources.
    async fn close(&self) -> Result<()>;
}
