//! Conversation context management: tail-keep pruning
//!
//! After any append the message list holds at most `max_messages` entries;
//! overflow drops from the front so the most recent reasoning and tool
//! output stay visible to the model. Older context remains in the persisted
//! session file.

use super::{Message, Session};
use crate::tool::ToolResult;

const MAX_TOOL_RESULTS: usize = 50;

/// Enforces the bounded conversation window
pub struct ContextManager {
    max_messages: usize,
}

impl ContextManager {
    pub fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }

    pub fn add_message(&self, session: &mut Session, message: Message) {
        session.messages.push(message);
        self.prune_messages(session);
    }

    pub fn prune_messages(&self, session: &mut Session) {
        if session.messages.len() > self.max_messages {
            let start = session.messages.len() - self.max_messages;
            session.messages.drain(..start);
        }
    }

    pub fn add_tool_result(&self, session: &mut Session, result: ToolResult) {
        session.tool_results.push(result);
        if session.tool_results.len() > MAX_TOOL_RESULTS {
            let start = session.tool_results.len() - MAX_TOOL_RESULTS;
            session.tool_results.drain(..start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionStatus, SessionStore};
    use chrono::Utc;
    use tempfile::tempdir;

    fn empty_session() -> Session {
        Session {
            id: "test".to_string(),
            working_dir: std::env::temp_dir(),
            model: "m".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: Vec::new(),
            tool_results: Vec::new(),
            status: SessionStatus::Active,
        }
    }

    #[test]
    fn appends_stay_within_cap() {
        let cm = ContextManager::new(10);
        let mut session = empty_session();
        for i in 0..25 {
            cm.add_message(&mut session, Message::user(format!("msg {}", i)));
            assert!(session.messages.len() <= 10);
        }
        assert_eq!(session.messages.len(), 10);
    }

    #[test]
    fn tail_is_kept_front_is_dropped() {
        let cm = ContextManager::new(3);
        let mut session = empty_session();
        for i in 0..5 {
            cm.add_message(&mut session, Message::user(format!("msg {}", i)));
        }
        let contents: Vec<&str> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn under_cap_keeps_everything() {
        let cm = ContextManager::new(100);
        let mut session = empty_session();
        for i in 0..7 {
            cm.add_message(&mut session, Message::user(format!("msg {}", i)));
        }
        assert_eq!(session.messages.len(), 7);
    }

    #[test]
    fn tool_results_are_capped_at_fifty() {
        let cm = ContextManager::new(100);
        let mut session = empty_session();
        for i in 0..60 {
            cm.add_tool_result(&mut session, ToolResult::success(format!("r{}", i)));
        }
        assert_eq!(session.tool_results.len(), 50);
        assert_eq!(session.tool_results[0].output, "r10");
        assert_eq!(session.tool_results[49].output, "r59");
    }

    #[test]
    fn pruned_session_still_round_trips_on_disk() {
        let dir = tempdir().unwrap();
        let work = tempdir().unwrap();
        let store = SessionStore::open_at(dir.path().join("sessions")).unwrap();
        let cm = ContextManager::new(10);
        let mut session = store.create(work.path(), "m").unwrap();
        for i in 0..30 {
            cm.add_message(&mut session, Message::user(format!("msg {}", i)));
        }
        store.save(&mut session).unwrap();
        let loaded = store.load(&session.id).unwrap();
        assert_eq!(loaded.messages.len(), 10);
        assert_eq!(loaded.messages[9].content, "msg 29");
    }
}
