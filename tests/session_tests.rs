use wayfinder::{Message, MergeOptions, Session, DEFAULT_MODEL_ID};

fn session_with_messages(count: usize) -> Session {
    let mut session = Session::new("test", "openai", "gpt-4o");
    for i in 0..count {
        if i % 2 == 0 {
            session.append_message(Message::user(format!("question {}", i)));
        } else {
            session.append_message(Message::assistant(format!("answer {}", i)));
        }
    }
    session
}

#[test]
fn test_default_model_id_shape() {
    assert_eq!(DEFAULT_MODEL_ID, "openai/gpt-3.5-turbo");
}

#[test]
fn test_new_session_defaults() {
    let session = Session::new("fresh", "anthropic", "claude-3-5-sonnet-latest");
    assert!(!session.id.is_empty());
    assert!(session.conversation.messages.is_empty());
    assert!((session.conversation.temperature - 0.7).abs() < f32::EPSILON);
    assert!(!session.is_branch());
    assert!(session.parent_id.is_empty());
}

#[test]
fn test_add_tag_is_idempotent() {
    let mut session = session_with_messages(0);
    session.add_tag("research");
    session.add_tag("research");
    assert_eq!(session.tags, vec!["research"]);

    session.add_tag("draft");
    assert_eq!(session.tags, vec!["research", "draft"]);

    session.remove_tag("research");
    assert_eq!(session.tags, vec!["draft"]);
}

#[test]
fn test_add_child_is_idempotent() {
    let mut session = session_with_messages(0);
    session.add_child("child-a");
    session.add_child("child-a");
    session.add_child("child-b");
    assert_eq!(session.child_ids, vec!["child-a", "child-b"]);

    session.remove_child("child-a");
    assert_eq!(session.child_ids, vec!["child-b"]);
}

#[test]
fn test_branch_invariants_for_every_valid_index() {
    let len = 4;
    for index in 0..=len {
        let mut session = session_with_messages(len);
        let branch_id = format!("branch-{}", index);
        let branch = session
            .create_branch(branch_id.clone(), "experiment", index)
            .unwrap();

        assert_eq!(branch.parent_id, session.id);
        assert_eq!(branch.branch_point, index);
        assert_eq!(branch.conversation.messages.len(), index);
        assert!(branch.is_branch());
        assert_eq!(session.child_ids.last(), Some(&branch_id));
        assert!(session.is_ancestor_of(&branch));
    }
}

#[test]
fn test_branch_out_of_range_mutates_nothing() {
    let mut session = session_with_messages(3);
    let children_before = session.child_ids.clone();

    let result = session.create_branch("bad".to_string(), "too far", 4);
    assert!(result.is_err());
    assert_eq!(session.child_ids, children_before);
    assert_eq!(session.conversation.messages.len(), 3);
}

#[test]
fn test_ancestry_is_one_level_only() {
    let mut root = session_with_messages(2);
    let mut branch = root
        .create_branch("mid".to_string(), "mid", 1)
        .unwrap();
    let grandchild = branch
        .create_branch("leaf".to_string(), "leaf", 1)
        .unwrap();

    assert!(root.is_ancestor_of(&branch));
    assert!(branch.is_ancestor_of(&grandchild));
    // Transitive ancestry is a storage-layer query.
    assert!(!root.is_ancestor_of(&grandchild));
}

#[test]
fn test_merge_continuation_appends_source_messages() {
    let mut target = session_with_messages(2);
    let source = session_with_messages(3);

    let result = target
        .merge_from(&source, &MergeOptions::continuation())
        .unwrap();

    assert_eq!(result.merged_messages, 3);
    assert_eq!(target.conversation.messages.len(), 5);
    assert_eq!(
        target.conversation.messages[2].content,
        source.conversation.messages[0].content
    );
}

#[test]
fn test_merge_rebase_truncates_at_branch_point() {
    let mut target = session_with_messages(4);
    let mut branch = target
        .create_branch("branch".to_string(), "alt", 2)
        .unwrap();
    branch.append_message(Message::assistant("alternate ending"));

    let result = target.merge_from(&branch, &MergeOptions::rebase()).unwrap();

    // Target keeps the shared prefix (2 messages), then the branch's 3.
    assert_eq!(result.merged_messages, 3);
    assert_eq!(target.conversation.messages.len(), 5);
    assert_eq!(
        target.conversation.messages.last().map(|m| m.content.as_str()),
        Some("alternate ending")
    );
}

#[test]
fn test_merge_cherry_pick_selects_by_id() {
    let mut target = session_with_messages(1);
    let source = session_with_messages(4);
    let picked: Vec<String> = vec![
        source.conversation.messages[1].id.clone(),
        source.conversation.messages[3].id.clone(),
    ];

    let result = target
        .merge_from(&source, &MergeOptions::cherry_pick(picked.clone()))
        .unwrap();

    assert_eq!(result.merged_messages, 2);
    assert_eq!(target.conversation.messages.len(), 3);
    assert_eq!(target.conversation.messages[1].id, picked[0]);
    assert_eq!(target.conversation.messages[2].id, picked[1]);
}

#[test]
fn test_merge_cherry_pick_requires_ids() {
    let mut target = session_with_messages(1);
    let source = session_with_messages(2);
    assert!(target
        .merge_from(&source, &MergeOptions::cherry_pick(Vec::new()))
        .is_err());
}

#[test]
fn test_session_info_projection() {
    let mut session = session_with_messages(3);
    session.add_tag("demo");
    let branch = session
        .create_branch("b1".to_string(), "alt", 2)
        .unwrap();

    let info = session.info();
    assert_eq!(info.id, session.id);
    assert_eq!(info.message_count, 3);
    assert_eq!(info.provider, "openai");
    assert_eq!(info.model, "gpt-4o");
    assert_eq!(info.child_count, 1);
    assert!(!info.is_branch);

    let branch_info = branch.info();
    assert!(branch_info.is_branch);
    assert_eq!(branch_info.parent_id, session.id);
    assert_eq!(branch_info.branch_name, "alt");
}

#[test]
fn test_conversation_clone_is_deep() {
    let mut original = session_with_messages(2);
    original
        .conversation
        .metadata
        .insert("k".to_string(), serde_json::json!("v"));

    let mut copy = original.conversation.clone();
    copy.messages.push(Message::user("only in the copy"));
    copy.metadata
        .insert("k".to_string(), serde_json::json!("changed"));

    assert_eq!(original.conversation.messages.len(), 2);
    assert_eq!(
        original.conversation.metadata.get("k"),
        Some(&serde_json::json!("v"))
    );
}

#[test]
fn test_mutations_touch_updated_timestamp() {
    let mut session = session_with_messages(0);
    let before = session.updated_at;
    std::thread::sleep(std::time::Duration::from_millis(5));
    session.append_message(Message::user("tick"));
    assert!(session.updated_at > before);
}
