use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::adapter::{ChatTree, ReconcileReport};
use crate::config::Config;
use crate::layout::{FlowLayout, generate_layouted_elements};
use crate::message::{ChatMessage, ChatStatus};
use crate::navigation::{ActiveNodeData, NavigationMethod, Navigator, ScrollBehavior, Transition};
use crate::resolver::{ResolvedPath, handle_new_branch_submit, is_active_node_in_src, resolve_messages_to_show};
use crate::style::StyleConfig;
use crate::transport::{ChatTransport, SubmitRequest};

/// Ask the chat log to bring a message into view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollRequest {
    pub id: String,
    pub behavior: ScrollBehavior,
    /// Anchor registered through `add_message_ref`, if the view has drawn it yet
    pub anchor: Option<usize>,
}

/// One conversation: the transport, the tree reconciled from it and the
/// user's navigation state. This is everything the rendering layer talks to.
pub struct ChatSession<C: ChatTransport> {
    transport: C,
    chat: ChatTree,
    navigator: Navigator,
    style: StyleConfig,
    /// The transport's array was replaced, rescan it from the start next sync
    force_update: bool,
    message_refs: HashMap<String, usize>,
    scroll_request: Option<ScrollRequest>,
}

impl<C: ChatTransport> ChatSession<C> {
    pub fn new(transport: C, config: &Config) -> Self {
        Self {
            transport,
            chat: ChatTree::new(),
            navigator: Navigator::new(config.navigation),
            style: config.style.clone(),
            force_update: false,
            message_refs: HashMap::new(),
            scroll_request: None,
        }
    }

    pub fn transport(&self) -> &C {
        &self.transport
    }

    pub fn chat(&self) -> &ChatTree {
        &self.chat
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn status(&self) -> ChatStatus {
        self.transport.status()
    }

    pub fn active(&self) -> Option<&ActiveNodeData> {
        self.navigator.active()
    }

    /// Pull transport progress into the tree and fire due navigation timers
    pub fn sync(&mut self, now: Instant) -> ReconcileReport {
        self.transport.pump();
        let status = self.transport.status();
        let report = self.chat.update_from_messages(
            self.transport.messages(),
            status,
            std::mem::take(&mut self.force_update),
        );

        self.navigator.follow_stream(status, self.transport.messages());
        if let Some(transition) = self.navigator.tick(now) {
            self.on_transition(transition);
        }
        self.heal_active();
        report
    }

    /// Resolved active node, the conversation tip when nothing was picked
    pub fn active_id(&self) -> Option<String> {
        self.resolve().active_id
    }

    pub fn resolve(&self) -> ResolvedPath {
        resolve_messages_to_show(
            &self.chat,
            self.navigator.active().map(|active| active.id.as_str()),
            self.transport.messages(),
        )
    }

    pub fn messages_to_show(&self) -> Vec<ChatMessage> {
        self.resolve().messages
    }

    pub fn flow(&self) -> FlowLayout {
        generate_layouted_elements(
            self.chat.tree(),
            &self.style,
            self.active_id().as_deref(),
            self.transport.status(),
        )
    }

    pub fn flow_css_variables(&self) -> Vec<(&'static str, String)> {
        self.style.flow_css_variables()
    }

    /// Remember where the view drew `id`, so jumps can scroll to it
    pub fn add_message_ref(&mut self, id: &str, anchor: usize) {
        self.message_refs.insert(id.to_string(), anchor);
    }

    pub fn message_ref(&self, id: &str) -> Option<usize> {
        self.message_refs.get(id).copied()
    }

    pub fn on_message_in_view(&mut self, id: &str, now: Instant) {
        let Some(index) = self.resolve().index_of(id) else {
            return;
        };
        self.navigator.on_message_in_view(id, index, now);
    }

    pub fn on_node_click(&mut self, id: &str, depth: usize, now: Instant) {
        if !self.chat.tree().has_node(id) {
            return;
        }
        let transition = self.navigator.on_node_click(id, depth, now);
        self.on_transition(transition);
    }

    /// Fire a due scroll activation without touching the transport
    pub fn tick(&mut self, now: Instant) {
        if let Some(transition) = self.navigator.tick(now) {
            self.on_transition(transition);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.navigator.next_deadline()
    }

    pub fn take_scroll_request(&mut self) -> Option<ScrollRequest> {
        self.scroll_request.take()
    }

    /// Send `input`, from the tip or, when a historical node is active, as a new branch from it
    pub fn submit(&mut self, input: &str) -> bool {
        if self.transport.status().is_busy() {
            warn!("session: submit while {}", self.transport.status());
            return false;
        }
        if input.trim().is_empty() {
            return false;
        }

        let request = SubmitRequest::new(input);
        let historical = self
            .navigator
            .active()
            .map(|active| active.id.clone())
            .filter(|id| !is_active_node_in_src(id, self.transport.messages()));
        match historical {
            Some(active_id) => {
                handle_new_branch_submit(&mut self.transport, &self.chat, &active_id, request);
                self.force_update = true;
            }
            None => self.transport.handle_submit(request),
        }
        // follow the new reply
        self.navigator.clear_active();
        true
    }

    pub fn stop(&mut self) {
        self.transport.stop();
    }

    /// Regenerate the last reply; the new reply becomes a sibling of the old one
    pub fn reload(&mut self) {
        self.transport.reload();
        self.navigator.clear_active();
    }

    /// Drop every branch that does not lead to the active node
    pub fn commit_branch(&mut self) -> bool {
        let Some(active_id) = self.active_id() else {
            return false;
        };
        let pruned = self.chat.prune_to_path(&active_id);
        if pruned {
            info!("session: committed branch at {}", active_id);
            self.message_refs.retain(|id, _| self.chat.tree().has_node(id));
            self.heal_active();
            // the transport may still hold the dropped branch, move it onto the kept one
            let resolved = self.resolve();
            if !resolved.from_source {
                self.transport.set_messages(resolved.messages);
                self.force_update = true;
            }
        }
        pruned
    }

    fn on_transition(&mut self, transition: Transition) {
        let Some(behavior) = transition.scroll else {
            return;
        };
        let target = match transition.active.method {
            NavigationMethod::JumpToFork => self
                .resolve()
                .messages
                .last()
                .map(|message| message.id.clone())
                .unwrap_or(transition.active.id),
            _ => transition.active.id,
        };
        debug!("session: scroll to {} ({:?})", target, behavior);
        self.scroll_request = Some(ScrollRequest {
            anchor: self.message_ref(&target),
            id: target,
            behavior,
        });
    }

    fn heal_active(&mut self) {
        let resolved = self.resolve();
        if !resolved.healed {
            return;
        }
        match resolved.active_id {
            Some(tip) => {
                let index = resolved.messages.len().saturating_sub(1);
                self.navigator.reset(tip, index);
            }
            None => self.navigator.clear_active(),
        }
    }
}
