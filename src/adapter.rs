use tracing::{debug, info, warn};

use crate::message::{ChatMessage, ChatStatus};
use crate::tree::{Insertion, Tree};

/// What one reconciliation pass did to the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// First array index that was reconciled
    pub scanned_from: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Inserted nodes that became a new branch, also counted in `inserted`
    pub forked: usize,
    pub failed: usize,
}

impl ReconcileReport {
    /// How many messages the pass attempted to apply
    pub fn attempted(&self) -> usize {
        self.inserted + self.updated + self.failed
    }
}

/// Keeps a branching tree of chat messages in sync with the linear array of
/// the streaming transport. One instance per conversation.
#[derive(Debug, Default)]
pub struct ChatTree {
    tree: Tree<ChatMessage>,
    /// Length and status of the array seen by the previous pass
    last_seen: Option<(usize, ChatStatus)>,
}

impl ChatTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &Tree<ChatMessage> {
        &self.tree
    }

    pub fn last_seen(&self) -> Option<(usize, ChatStatus)> {
        self.last_seen
    }

    pub fn clear(&mut self) {
        self.tree = Tree::new();
        self.last_seen = None;
    }

    /// Merge `messages` into the tree.
    ///
    /// A shared prefix reconciles as in-place updates and a divergent suffix as
    /// new children, so two arrays that share a prefix end up as two branches.
    /// `force_update` rescans from the first message, for when the array
    /// changed discontinuously.
    pub fn update_from_messages(
        &mut self,
        messages: &[ChatMessage],
        status: ChatStatus,
        force_update: bool,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let Some(first) = messages.first() else {
            return report;
        };

        if self.tree.is_empty() {
            self.tree.set_root(first.id.clone(), first.clone());
            report.inserted += 1;
        }

        report.scanned_from = self.scan_start(messages, status, force_update);
        for (index, message) in messages.iter().enumerate().skip(report.scanned_from) {
            let parent_id = index
                .checked_sub(1)
                .and_then(|prev| messages.get(prev))
                .map(|prev| prev.id.as_str());
            match self.tree.set_node(&message.id, message.clone(), parent_id) {
                Ok(Insertion::Updated) => report.updated += 1,
                Ok(Insertion::Appended) => report.inserted += 1,
                Ok(Insertion::Forked) => {
                    info!(
                        "fork: id={} parent={}",
                        message.id,
                        parent_id.unwrap_or_default()
                    );
                    report.inserted += 1;
                    report.forked += 1;
                }
                Err(err) => {
                    warn!("reconcile: skipping message id={} index={}: {}", message.id, index, err);
                    report.failed += 1;
                }
            }
        }

        debug!(
            "reconcile: len={} status={} force={} report={:?}",
            messages.len(),
            status,
            force_update,
            report
        );
        self.last_seen = Some((messages.len(), status));
        report
    }

    /// First index that still needs reconciling
    fn scan_start(&self, messages: &[ChatMessage], status: ChatStatus, force_update: bool) -> usize {
        if force_update {
            return 0;
        }
        if status == ChatStatus::Streaming {
            // only the tail is still mutating while a reply streams in
            return messages.len().saturating_sub(2);
        }
        // the array kept the tip seen last pass, everything before it is reconciled
        let resume = self
            .last_seen
            .and_then(|(seen, _)| seen.checked_sub(1))
            .filter(|&index| {
                messages
                    .get(index)
                    .is_some_and(|tip| self.tree.has_node(&tip.id))
            });
        if let Some(index) = resume {
            return index;
        }
        messages
            .iter()
            .rposition(|message| self.tree.has_node(&message.id))
            .unwrap_or(0)
    }

    /// Payloads from the root down to `id`, the history to resend when
    /// continuing from that point. Empty if `id` is unknown.
    pub fn get_message_path(&self, id: &str) -> Vec<ChatMessage> {
        self.tree
            .get_path_to_node(id)
            .into_iter()
            .map(|node| node.data().clone())
            .collect()
    }

    /// Number of messages with more than one continuation
    pub fn branch_count(&self) -> usize {
        let mut count = 0;
        self.tree.preorder(|node, _| {
            if node.child_count() > 1 {
                count += 1;
            }
            true
        });
        count
    }

    /// Keep only the branch leading to `id`, see [`Tree::prune_to_path`]
    pub fn prune_to_path(&mut self, id: &str) -> bool {
        self.tree.prune_to_path(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn msg(id: &str, role: Role) -> ChatMessage {
        ChatMessage::new(id, role, format!("content of {id}"))
    }

    fn abc() -> Vec<ChatMessage> {
        vec![
            msg("A", Role::User),
            msg("B", Role::Assistant),
            msg("C", Role::User),
        ]
    }

    fn path_ids(chat: &ChatTree, id: &str) -> Vec<String> {
        chat.get_message_path(id)
            .into_iter()
            .map(|message| message.id)
            .collect()
    }

    #[test]
    fn empty_array_is_a_no_op() {
        let mut chat = ChatTree::new();
        let report = chat.update_from_messages(&[], ChatStatus::Ready, false);
        assert_eq!(report, ReconcileReport::default());
        assert!(chat.tree().is_empty());
        assert_eq!(chat.last_seen(), None);
    }

    #[test]
    fn first_message_becomes_root() {
        let mut chat = ChatTree::new();
        chat.update_from_messages(&[msg("1", Role::User)], ChatStatus::Ready, false);
        assert_eq!(chat.tree().len(), 1);
        assert_eq!(chat.tree().root_id(), Some("1"));
    }

    #[test]
    fn diverging_array_forks_at_common_prefix() {
        let mut chat = ChatTree::new();
        chat.update_from_messages(&abc(), ChatStatus::Ready, false);

        let diverged = vec![msg("A", Role::User), msg("B", Role::Assistant), msg("D", Role::User)];
        let report = chat.update_from_messages(&diverged, ChatStatus::Ready, false);

        assert_eq!(report.forked, 1);
        let children: Vec<&str> = chat.tree().children_of("B").iter().map(|n| n.id()).collect();
        assert_eq!(children, vec!["C", "D"]);
        assert_eq!(path_ids(&chat, "D"), vec!["A", "B", "D"]);
        assert_eq!(path_ids(&chat, "C"), vec!["A", "B", "C"]);
        assert_eq!(chat.branch_count(), 1);
    }

    #[test]
    fn prune_after_fork_removes_abandoned_branch() {
        let mut chat = ChatTree::new();
        chat.update_from_messages(&abc(), ChatStatus::Ready, false);
        let mut diverged = abc();
        diverged[2] = msg("D", Role::User);
        diverged.push(msg("E", Role::Assistant));
        chat.update_from_messages(&diverged, ChatStatus::Ready, false);

        assert!(chat.prune_to_path("D"));
        assert!(!chat.tree().has_node("C"));
        assert!(chat.tree().has_node("E"));
        assert_eq!(chat.branch_count(), 0);
    }

    #[test]
    fn streaming_only_touches_the_tail() {
        let mut chat = ChatTree::new();
        chat.update_from_messages(&[msg("0", Role::User)], ChatStatus::Ready, false);

        // indices 1 and 2 were never reconciled, the streaming pass does not look at them
        let messages: Vec<ChatMessage> = (0..5)
            .map(|i| msg(&i.to_string(), Role::User))
            .collect();
        let report = chat.update_from_messages(&messages, ChatStatus::Streaming, false);

        assert_eq!(report.scanned_from, 3);
        assert_eq!(report.attempted(), 2);
        assert_eq!(report.failed, 2);
        assert!(!chat.tree().has_node("1"));
        assert!(!chat.tree().has_node("4"));
    }

    #[test]
    fn streaming_updates_content_in_place() {
        let mut chat = ChatTree::new();
        let mut messages = vec![msg("A", Role::User), ChatMessage::assistant("B", "Hel")];
        chat.update_from_messages(&messages, ChatStatus::Streaming, false);
        messages[1].content.push_str("lo");
        let report = chat.update_from_messages(&messages, ChatStatus::Streaming, false);

        assert_eq!(report.inserted, 0);
        assert_eq!(chat.tree().get_node("B").unwrap().data().content, "Hello");
        assert_eq!(chat.tree().len(), 2);
    }

    #[test]
    fn settled_scan_starts_at_last_known_message() {
        let mut chat = ChatTree::new();
        chat.update_from_messages(&abc(), ChatStatus::Ready, false);
        let mut extended = abc();
        extended.push(msg("D", Role::Assistant));
        let report = chat.update_from_messages(&extended, ChatStatus::Ready, false);

        assert_eq!(report.scanned_from, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(chat.last_seen(), Some((4, ChatStatus::Ready)));
    }

    #[test]
    fn settled_scan_resumes_from_previous_tip() {
        let mut chat = ChatTree::new();
        let mut long = abc();
        long.push(msg("D", Role::Assistant));
        chat.update_from_messages(&long, ChatStatus::Ready, false);

        // shrinking drops the previous tip, fall back to the last known message
        let report = chat.update_from_messages(&long[..2], ChatStatus::Ready, false);
        assert_eq!(report.scanned_from, 1);
        assert_eq!(chat.last_seen(), Some((2, ChatStatus::Ready)));

        // growing again resumes after B even though C and D are already known
        let report = chat.update_from_messages(&long, ChatStatus::Ready, false);
        assert_eq!(report.scanned_from, 1);
        assert_eq!(report.updated, 3);
        assert_eq!(report.inserted, 0);

        // an unchanged array only revisits its tip
        let report = chat.update_from_messages(&long, ChatStatus::Ready, false);
        assert_eq!(report.scanned_from, 3);
        assert_eq!(report.attempted(), 1);
    }

    #[test]
    fn replaced_tip_falls_back_to_scan() {
        let mut chat = ChatTree::new();
        chat.update_from_messages(&abc(), ChatStatus::Ready, false);
        let diverged = vec![msg("A", Role::User), msg("B", Role::Assistant), msg("D", Role::User)];
        let report = chat.update_from_messages(&diverged, ChatStatus::Ready, false);
        assert_eq!(report.scanned_from, 1);
        assert_eq!(report.forked, 1);
    }

    #[test]
    fn bad_message_does_not_abort_the_pass() {
        let mut chat = ChatTree::new();
        chat.update_from_messages(&abc(), ChatStatus::Ready, false);

        // a different first message cannot be attached anywhere
        let foreign = vec![msg("X", Role::User), msg("Y", Role::Assistant)];
        let report = chat.update_from_messages(&foreign, ChatStatus::Ready, true);

        assert_eq!(report.failed, 2);
        assert_eq!(chat.tree().len(), 3);

        let mut mixed = abc();
        mixed.insert(1, msg("S", Role::System));
        mixed.push(msg("F", Role::Assistant));
        let report = chat.update_from_messages(&mixed, ChatStatus::Ready, true);
        assert_eq!(report.failed, 0);
        assert!(chat.tree().has_node("F"));
    }

    #[test]
    fn message_path_round_trips_through_forced_update() {
        let mut chat = ChatTree::new();
        chat.update_from_messages(&abc(), ChatStatus::Ready, false);
        let mut diverged = abc();
        diverged[2] = msg("D", Role::User);
        chat.update_from_messages(&diverged, ChatStatus::Ready, false);

        let path = chat.get_message_path("C");
        let before = chat.tree().len();
        let report = chat.update_from_messages(&path, ChatStatus::Ready, true);

        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 3);
        assert_eq!(chat.tree().len(), before);
        assert_eq!(path_ids(&chat, "C"), vec!["A", "B", "C"]);
    }
}
