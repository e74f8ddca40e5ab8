use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use wayfinder::storage::{ExportFormat, SearchResult, SessionStore};
use wayfinder::{
    BranchTree, LlmError, Message, MergeOptions, Result, Session, SessionInfo,
};

/// Minimal in-memory backend exercising the storage contract and its default
/// export / merge implementations.
struct MemoryStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemoryStore {
    fn new() -> Self {
        MemoryStore {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

fn build_tree(map: &HashMap<String, Session>, id: &str) -> Option<BranchTree> {
    let session = map.get(id)?;
    let children = session
        .child_ids
        .iter()
        .filter_map(|child_id| build_tree(map, child_id))
        .collect();
    Some(BranchTree {
        info: session.info(),
        children,
    })
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, session: &Session) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Session> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| LlmError::NotFound(id.to_string()))
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        if !sessions.contains_key(&session.id) {
            return Err(LlmError::NotFound(session.id.clone()));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| LlmError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<SessionInfo>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .map(Session::info)
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let sessions = self.sessions.lock().unwrap();
        let mut results = Vec::new();
        for session in sessions.values() {
            for (index, message) in session.conversation.messages.iter().enumerate() {
                if message.content.contains(query) {
                    results.push(SearchResult {
                        info: session.info(),
                        snippet: message.content.clone(),
                        message_index: index,
                    });
                }
            }
        }
        Ok(results)
    }

    async fn get_children(&self, id: &str) -> Result<Vec<SessionInfo>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|session| session.parent_id == id)
            .map(Session::info)
            .collect())
    }

    async fn get_branch_tree(&self, id: &str) -> Result<BranchTree> {
        let sessions = self.sessions.lock().unwrap();
        build_tree(&sessions, id).ok_or_else(|| LlmError::NotFound(id.to_string()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn seeded_session() -> Session {
    let mut session = Session::new("export me", "openai", "gpt-4o");
    session.add_tag("demo");
    session.append_message(Message::user("What is 2+2?"));
    session.append_message(Message::assistant("4, assuming base ten <obviously>."));
    session
}

#[tokio::test]
async fn test_crud_round_trip() {
    let store = MemoryStore::new();
    let session = seeded_session();
    store.create(&session).await.unwrap();

    let loaded = store.get(&session.id).await.unwrap();
    assert_eq!(loaded.name, "export me");
    assert_eq!(loaded.conversation.messages.len(), 2);

    assert_eq!(store.list().await.unwrap().len(), 1);

    store.delete(&session.id).await.unwrap();
    assert!(matches!(
        store.get(&session.id).await,
        Err(LlmError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_search_returns_snippets() {
    let store = MemoryStore::new();
    let session = seeded_session();
    store.create(&session).await.unwrap();

    let hits = store.search("2+2").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message_index, 0);
    assert!(hits[0].snippet.contains("2+2"));
}

#[tokio::test]
async fn test_children_and_branch_tree() {
    let store = MemoryStore::new();
    let mut root = seeded_session();
    let mut left = root.create_branch("left".to_string(), "left", 1).unwrap();
    let right = root.create_branch("right".to_string(), "right", 2).unwrap();
    let leaf = left.create_branch("leaf".to_string(), "leaf", 0).unwrap();

    store.create(&root).await.unwrap();
    store.create(&left).await.unwrap();
    store.create(&right).await.unwrap();
    store.create(&leaf).await.unwrap();

    let children = store.get_children(&root.id).await.unwrap();
    assert_eq!(children.len(), 2);

    let tree = store.get_branch_tree(&root.id).await.unwrap();
    assert_eq!(tree.size(), 4);
    assert_eq!(tree.children.len(), 2);
}

#[tokio::test]
async fn test_default_merge_persists_the_target() {
    let store = MemoryStore::new();
    let target = seeded_session();
    let source = seeded_session();
    store.create(&target).await.unwrap();
    store.create(&source).await.unwrap();

    let result = store
        .merge_sessions(&target.id, &source.id, &MergeOptions::continuation())
        .await
        .unwrap();
    assert_eq!(result.merged_messages, 2);

    let merged = store.get(&target.id).await.unwrap();
    assert_eq!(merged.conversation.messages.len(), 4);
}

#[tokio::test]
async fn test_export_json_round_trips() {
    let store = MemoryStore::new();
    let session = seeded_session();
    store.create(&session).await.unwrap();

    let mut buffer: Vec<u8> = Vec::new();
    store
        .export_session(&session.id, ExportFormat::Json, &mut buffer)
        .await
        .unwrap();

    let parsed: Session = serde_json::from_slice(&buffer).unwrap();
    assert_eq!(parsed.id, session.id);
    assert_eq!(parsed.conversation.messages.len(), 2);
}

#[tokio::test]
async fn test_export_markdown_text_and_html() {
    let store = MemoryStore::new();
    let session = seeded_session();
    store.create(&session).await.unwrap();

    let mut markdown: Vec<u8> = Vec::new();
    store
        .export_session(&session.id, ExportFormat::Markdown, &mut markdown)
        .await
        .unwrap();
    let markdown = String::from_utf8(markdown).unwrap();
    assert!(markdown.starts_with("# export me"));
    assert!(markdown.contains("## User"));
    assert!(markdown.contains("What is 2+2?"));

    let mut text: Vec<u8> = Vec::new();
    store
        .export_session(&session.id, ExportFormat::Text, &mut text)
        .await
        .unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("[user] What is 2+2?"));

    let mut html: Vec<u8> = Vec::new();
    store
        .export_session(&session.id, ExportFormat::Html, &mut html)
        .await
        .unwrap();
    let html = String::from_utf8(html).unwrap();
    // Message content is escaped.
    assert!(html.contains("&lt;obviously&gt;"));
    assert!(!html.contains("<obviously>"));
}

#[tokio::test]
async fn test_export_to_a_file() {
    let store = MemoryStore::new();
    let session = seeded_session();
    store.create(&session).await.unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    store
        .export_session(&session.id, ExportFormat::Markdown, &mut file)
        .await
        .unwrap();
    file.flush().unwrap();

    let contents = std::fs::read_to_string(file.path()).unwrap();
    assert!(contents.contains("# export me"));
}

#[test]
fn test_export_format_parsing() {
    assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
    assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
    assert_eq!("TEXT".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
    assert_eq!("html".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
    assert!("pdf".parse::<ExportFormat>().is_err());
}
