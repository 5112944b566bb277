use std::thread;
use std::time::{Duration, Instant};

use chattree::config::Config;
use chattree::message::{ChatMessage, ChatStatus, Role};
use chattree::navigation::{NavigationMethod, ScrollBehavior};
use chattree::session::ChatSession;
use chattree::transport::{ChatTransport, ScriptedTransport};

fn ids(messages: &[ChatMessage]) -> Vec<&str> {
    messages.iter().map(|message| message.id.as_str()).collect()
}

/// Sync until the reply finished streaming
fn settle(session: &mut ChatSession<ScriptedTransport>, now: Instant) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        session.sync(now);
        if !session.status().is_busy() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("reply did not finish");
}

fn session() -> ChatSession<ScriptedTransport> {
    ChatSession::new(ScriptedTransport::new(Duration::ZERO), &Config::default())
}

#[test]
fn branching_from_a_historical_reply() {
    let start = Instant::now();
    let at = |ms: u64| start + Duration::from_millis(ms);
    let mut session = session();

    assert!(session.submit("first"));
    settle(&mut session, at(0));
    assert!(session.submit("second"));
    settle(&mut session, at(0));
    assert_eq!(
        ids(&session.messages_to_show()),
        vec!["msg-1", "msg-2", "msg-3", "msg-4"]
    );
    assert_eq!(session.chat().branch_count(), 0);

    // regenerating puts the new reply next to the old one
    session.reload();
    settle(&mut session, at(0));
    assert_eq!(session.chat().tree().children_of("msg-3").len(), 2);
    assert_eq!(session.chat().branch_count(), 1);
    assert_eq!(session.active_id().as_deref(), Some("msg-5"));

    // pick the discarded reply in the graph
    session.on_node_click("msg-4", 3, at(1_000));
    let active = session.active().expect("clicked node is active");
    assert_eq!(active.id, "msg-4");
    assert_eq!(active.method, NavigationMethod::JumpToFork);
    let request = session.take_scroll_request().expect("jump scrolls");
    assert_eq!(request.id, "msg-4");
    assert_eq!(request.behavior, ScrollBehavior::Instant);
    assert_eq!(
        ids(&session.messages_to_show()),
        vec!["msg-1", "msg-2", "msg-3", "msg-4"]
    );

    // continuing from it forks the transport history
    assert!(session.submit("fork"));
    assert!(session.active().is_none());
    settle(&mut session, at(2_000));
    assert_eq!(
        ids(session.transport().messages()),
        vec!["msg-1", "msg-2", "msg-3", "msg-4", "msg-6", "msg-7"]
    );
    assert_eq!(
        ids(&session.messages_to_show()),
        vec!["msg-1", "msg-2", "msg-3", "msg-4", "msg-6", "msg-7"]
    );
    let tree = session.chat().tree();
    assert_eq!(tree.parent_of("msg-6").map(|node| node.id()), Some("msg-4"));
    assert!(tree.has_node("msg-5"));
    assert_eq!(tree.len(), 7);
}

#[test]
fn scrolling_settles_on_the_message_in_view() {
    let start = Instant::now();
    let at = |ms: u64| start + Duration::from_millis(ms);
    let mut session = session();

    session.submit("hello");
    settle(&mut session, at(0));
    session.submit("again");
    settle(&mut session, at(0));

    session.on_message_in_view("msg-2", at(10));
    session.sync(at(50));
    assert!(session.active().is_none());
    assert_eq!(session.next_deadline(), Some(at(110)));

    session.sync(at(120));
    let active = session.active().expect("scroll settled");
    assert_eq!(active.id, "msg-2");
    assert_eq!(active.index, 1);
    assert_eq!(active.method, NavigationMethod::Activate);
    assert!(session.take_scroll_request().is_none());
    // the node is on the live path, so nothing is cut away
    assert_eq!(session.messages_to_show().len(), 4);
}

#[test]
fn committing_a_branch_prunes_the_rest() {
    let start = Instant::now();
    let at = |ms: u64| start + Duration::from_millis(ms);
    let mut session = session();

    session.submit("hello");
    settle(&mut session, at(0));
    session.reload();
    settle(&mut session, at(0));
    assert_eq!(session.chat().branch_count(), 1);

    session.on_node_click("msg-2", 1, at(1_000));
    assert!(session.commit_branch());
    let tree = session.chat().tree();
    assert!(!tree.has_node("msg-3"));
    assert_eq!(tree.len(), 2);
    assert_eq!(session.chat().branch_count(), 0);
    assert_eq!(ids(session.transport().messages()), vec!["msg-1", "msg-2"]);

    // the dropped reply does not come back on the next sync
    session.sync(at(1_100));
    assert!(!session.chat().tree().has_node("msg-3"));
    assert_eq!(session.active_id().as_deref(), Some("msg-2"));
}

#[test]
fn failed_reply_keeps_partial_text() {
    let mut session = session();
    session.submit("/fail please");
    settle(&mut session, Instant::now());

    assert_eq!(session.status(), ChatStatus::Error);
    let shown = session.messages_to_show();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[1].role, Role::Assistant);
    assert_eq!(shown[1].content.split_whitespace().count(), 3);
    assert_eq!(session.chat().tree().len(), 2);
}
