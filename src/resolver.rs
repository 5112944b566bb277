use tracing::{debug, info};

use crate::adapter::ChatTree;
use crate::message::ChatMessage;
use crate::transport::{ChatTransport, SubmitRequest};

/// The linear conversation to display and to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Active node after defaulting and self-healing, `None` only for an empty conversation
    pub active_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// `messages` is the transport's array verbatim
    pub from_source: bool,
    /// The requested active node no longer exists and the tip was used instead
    pub healed: bool,
}

impl ResolvedPath {
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|message| message.id == id)
    }
}

pub fn is_active_node_in_src(active_id: &str, src: &[ChatMessage]) -> bool {
    src.iter().any(|message| message.id == active_id)
}

/// Decide which messages to show for `active_id`.
///
/// The transport's array wins whenever it contains the active node. Otherwise
/// the active node sits on a historical branch and the path is read from the
/// tree: root to the active node, then down the first continuation to a leaf.
pub fn resolve_messages_to_show(
    chat: &ChatTree,
    active_id: Option<&str>,
    src: &[ChatMessage],
) -> ResolvedPath {
    let tip = || ResolvedPath {
        active_id: src.last().map(|message| message.id.clone()),
        messages: src.to_vec(),
        from_source: true,
        healed: false,
    };

    let Some(active_id) = active_id else {
        return tip();
    };
    if is_active_node_in_src(active_id, src) {
        return ResolvedPath {
            active_id: Some(active_id.to_string()),
            ..tip()
        };
    }

    let mut messages = chat.get_message_path(active_id);
    if messages.is_empty() {
        debug!("resolver: active node {} is gone, falling back to tip", active_id);
        return ResolvedPath {
            healed: true,
            ..tip()
        };
    }

    let tree = chat.tree();
    let mut cursor = active_id.to_string();
    while let Some(first) = tree.children_of(&cursor).first() {
        messages.push(first.data().clone());
        cursor = first.id().to_string();
    }

    ResolvedPath {
        active_id: Some(active_id.to_string()),
        messages,
        from_source: false,
        healed: false,
    }
}

/// Continue the conversation from `active_id` instead of from the tip.
///
/// The transport's array is cut back to root..=active before submitting, so
/// the reply lands as a new sibling of the old continuation. Returns `false`
/// when `active_id` is not in the tree and a plain submit was made instead.
pub fn handle_new_branch_submit<C>(
    transport: &mut C,
    chat: &ChatTree,
    active_id: &str,
    request: SubmitRequest,
) -> bool
where
    C: ChatTransport + ?Sized,
{
    let path = chat.get_message_path(active_id);
    if path.is_empty() {
        transport.handle_submit(request);
        return false;
    }
    info!("resolver: branching from {} (depth {})", active_id, path.len() - 1);
    transport.set_messages(path);
    transport.handle_submit(request);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChatStatus, Role};

    fn msg(id: &str, role: Role) -> ChatMessage {
        ChatMessage::new(id, role, id)
    }

    fn ids(messages: &[ChatMessage]) -> Vec<&str> {
        messages.iter().map(|message| message.id.as_str()).collect()
    }

    /// A -> B -> C -> E, B -> D; the transport shows A B D
    fn forked() -> (ChatTree, Vec<ChatMessage>) {
        let mut chat = ChatTree::new();
        let first = vec![
            msg("A", Role::User),
            msg("B", Role::Assistant),
            msg("C", Role::User),
            msg("E", Role::Assistant),
        ];
        chat.update_from_messages(&first, ChatStatus::Ready, false);
        let src = vec![msg("A", Role::User), msg("B", Role::Assistant), msg("D", Role::User)];
        chat.update_from_messages(&src, ChatStatus::Ready, false);
        (chat, src)
    }

    #[derive(Default)]
    struct Recorder {
        messages: Vec<ChatMessage>,
        calls: Vec<String>,
    }

    impl ChatTransport for Recorder {
        fn status(&self) -> ChatStatus {
            ChatStatus::Ready
        }
        fn messages(&self) -> &[ChatMessage] {
            &self.messages
        }
        fn stop(&mut self) {}
        fn reload(&mut self) {}
        fn handle_submit(&mut self, request: SubmitRequest) {
            self.calls.push(format!("submit:{}", request.input));
        }
        fn set_messages(&mut self, messages: Vec<ChatMessage>) {
            self.calls.push(format!("set:{}", ids(&messages).join(",")));
            self.messages = messages;
        }
        fn pump(&mut self) -> bool {
            false
        }
    }

    #[test]
    fn defaults_to_tip() {
        let (chat, src) = forked();
        let resolved = resolve_messages_to_show(&chat, None, &src);
        assert_eq!(resolved.active_id.as_deref(), Some("D"));
        assert!(resolved.from_source);
        assert_eq!(ids(&resolved.messages), vec!["A", "B", "D"]);
    }

    #[test]
    fn active_in_source_uses_source_verbatim() {
        let (chat, src) = forked();
        let resolved = resolve_messages_to_show(&chat, Some("B"), &src);
        assert!(resolved.from_source);
        assert_eq!(resolved.active_id.as_deref(), Some("B"));
        assert_eq!(resolved.messages, src);
        assert_eq!(resolved.index_of("B"), Some(1));
    }

    #[test]
    fn historical_node_continues_to_first_leaf() {
        let (chat, src) = forked();
        let resolved = resolve_messages_to_show(&chat, Some("C"), &src);
        assert!(!resolved.from_source);
        assert_eq!(ids(&resolved.messages), vec!["A", "B", "C", "E"]);
    }

    #[test]
    fn vanished_node_heals_to_tip() {
        let (mut chat, src) = forked();
        chat.prune_to_path("D");
        let resolved = resolve_messages_to_show(&chat, Some("C"), &src);
        assert!(resolved.healed);
        assert_eq!(resolved.active_id.as_deref(), Some("D"));
        assert_eq!(resolved.messages, src);
    }

    #[test]
    fn empty_conversation_has_no_active_node() {
        let chat = ChatTree::new();
        let resolved = resolve_messages_to_show(&chat, None, &[]);
        assert_eq!(resolved.active_id, None);
        assert!(resolved.messages.is_empty());
    }

    #[test]
    fn new_branch_submit_resets_then_submits() {
        let (chat, _) = forked();
        let mut transport = Recorder::default();
        assert!(handle_new_branch_submit(
            &mut transport,
            &chat,
            "C",
            SubmitRequest::new("retry")
        ));
        assert_eq!(transport.calls, vec!["set:A,B,C", "submit:retry"]);
    }

    #[test]
    fn new_branch_submit_from_unknown_node_is_plain_submit() {
        let (chat, _) = forked();
        let mut transport = Recorder::default();
        assert!(!handle_new_branch_submit(
            &mut transport,
            &chat,
            "zzz",
            SubmitRequest::new("hi")
        ));
        assert_eq!(transport.calls, vec!["submit:hi"]);
    }
}
