//! Session persistence and the bounded context window through the public API.

use std::path::Path;
use tempfile::tempdir;
use wink::session::context::ContextManager;
use wink::session::{Message, Role, SessionStatus, SessionStore};
use wink::tool::ToolResult;

fn store_in(dir: &Path) -> SessionStore {
    SessionStore::open_at(dir.join("sessions")).unwrap()
}

#[test]
fn save_then_load_returns_an_equal_session() {
    let state = tempdir().unwrap();
    let work = tempdir().unwrap();
    let store = store_in(state.path());

    let mut session = store.create(work.path(), "qwen3:8b").unwrap();
    session.messages.push(Message::user("write a script"));
    session
        .messages
        .push(Message::assistant("on it", Vec::new()));
    session.messages.push(Message::tool("done", "call_1"));
    let mut result = ToolResult::success("created file");
    result.tool_call_id = "call_1".to_string();
    session.tool_results.push(result);
    store.save(&mut session).unwrap();

    let loaded = store.load(&session.id).unwrap();
    assert_eq!(
        serde_json::to_string(&loaded).unwrap(),
        serde_json::to_string(&session).unwrap()
    );
    assert_eq!(loaded.messages.len(), 3);
    assert_eq!(loaded.tool_results[0].tool_call_id, "call_1");
    assert_eq!(loaded.working_dir, work.path());
}

#[test]
fn save_leaves_no_partial_files_behind() {
    let state = tempdir().unwrap();
    let work = tempdir().unwrap();
    let store = store_in(state.path());

    let mut session = store.create(work.path(), "m").unwrap();
    for _ in 0..3 {
        store.save(&mut session).unwrap();
    }

    let leftovers: Vec<_> = std::fs::read_dir(state.path().join("sessions"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) != Some("json"))
        .collect();
    assert!(leftovers.is_empty(), "stray temp files: {:?}", leftovers);
}

#[test]
fn latest_follows_the_most_recent_save() {
    let state = tempdir().unwrap();
    let work = tempdir().unwrap();
    let store = store_in(state.path());

    let mut first = store.create(work.path(), "m").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    let _second = store.create(work.path(), "m").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));

    // Re-saving the older session makes it the latest again.
    store.save(&mut first).unwrap();
    assert_eq!(store.latest().unwrap().id, first.id);
}

#[test]
fn status_transitions_round_trip() {
    let state = tempdir().unwrap();
    let work = tempdir().unwrap();
    let store = store_in(state.path());

    let mut session = store.create(work.path(), "m").unwrap();
    assert_eq!(session.status, SessionStatus::Active);

    for status in [
        SessionStatus::Paused,
        SessionStatus::Active,
        SessionStatus::Completed,
    ] {
        session.status = status;
        store.save(&mut session).unwrap();
        assert_eq!(store.load(&session.id).unwrap().status, status);
    }
}

#[test]
fn list_and_delete_manage_the_session_directory() {
    let state = tempdir().unwrap();
    let work = tempdir().unwrap();
    let store = store_in(state.path());

    let a = store.create(work.path(), "m").unwrap();
    let b = store.create(work.path(), "m").unwrap();
    assert_eq!(store.list().unwrap().len(), 2);

    store.delete(&a.id).unwrap();
    let remaining = store.list().unwrap();
    assert_eq!(remaining, vec![b.id.clone()]);
    assert!(store.load(&a.id).is_err());
}

#[test]
fn context_window_prunes_from_the_front_and_persists_pruned() {
    let state = tempdir().unwrap();
    let work = tempdir().unwrap();
    let store = store_in(state.path());
    let context = ContextManager::new(10);

    let mut session = store.create(work.path(), "m").unwrap();
    for i in 0..40 {
        context.add_message(&mut session, Message::user(format!("msg {}", i)));
        assert!(session.messages.len() <= 10);
    }
    for i in 0..60 {
        context.add_tool_result(&mut session, ToolResult::success(format!("r{}", i)));
    }
    store.save(&mut session).unwrap();

    let loaded = store.load(&session.id).unwrap();
    assert_eq!(loaded.messages.len(), 10);
    assert_eq!(loaded.messages[0].content, "msg 30");
    assert_eq!(loaded.messages[9].content, "msg 39");
    assert_eq!(loaded.tool_results.len(), 50);
    assert_eq!(loaded.tool_results[49].output, "r59");
}

#[test]
fn tool_messages_keep_their_call_ids_on_disk() {
    let state = tempdir().unwrap();
    let work = tempdir().unwrap();
    let store = store_in(state.path());

    let mut session = store.create(work.path(), "m").unwrap();
    session.messages.push(Message::tool("output", "call_77"));
    store.save(&mut session).unwrap();

    let loaded = store.load(&session.id).unwrap();
    let msg = &loaded.messages[0];
    assert_eq!(msg.role, Role::Tool);
    assert_eq!(
        msg.metadata.get("tool_call_id").and_then(|v| v.as_str()),
        Some("call_77")
    );
}
