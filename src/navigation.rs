use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::message::{ChatMessage, ChatStatus};
use crate::schedule::Debouncer;

/// Why the active node last changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMethod {
    Init,
    /// Settled after scrolling a message into view
    Activate,
    /// Repeat click: anchor on the node itself
    JumpToNode,
    /// Fresh click: show the branch through the node, down to its tip
    JumpToFork,
}

impl NavigationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            NavigationMethod::Init => "init",
            NavigationMethod::Activate => "activate",
            NavigationMethod::JumpToNode => "jump-to-node",
            NavigationMethod::JumpToFork => "jump-to-fork",
        }
    }

    pub fn is_jump(self) -> bool {
        self.as_str().starts_with("jump")
    }
}

impl fmt::Display for NavigationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the user's attention is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveNodeData {
    pub id: String,
    /// Position in the displayed message sequence
    pub index: usize,
    pub method: NavigationMethod,
}

impl ActiveNodeData {
    pub fn new(id: impl Into<String>, index: usize, method: NavigationMethod) -> Self {
        Self {
            id: id.into(),
            index,
            method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// A change of active node, with the scroll it calls for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub active: ActiveNodeData,
    /// Set for jumps only; an activation is already caused by scrolling
    pub scroll: Option<ScrollBehavior>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationConfig {
    /// Scroll settle time, also the quiet period after any transition
    pub scroll_gap: Duration,
    /// Window in which a second click on the same node counts as a repeat
    pub click_gap: Duration,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            scroll_gap: Duration::from_millis(100),
            click_gap: Duration::from_millis(500),
        }
    }
}

/// Turns raw scroll and click events into active node transitions
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    config: NavigationConfig,
    active: Option<ActiveNodeData>,
    pending: Debouncer<ActiveNodeData>,
    last_transition: Option<Instant>,
    click_node_id: Option<String>,
    last_click: Option<Instant>,
}

impl Navigator {
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> NavigationConfig {
        self.config
    }

    pub fn active(&self) -> Option<&ActiveNodeData> {
        self.active.as_ref()
    }

    /// Forget the active node, so the conversation tip is used again
    pub fn clear_active(&mut self) {
        self.pending.cancel();
        self.active = None;
    }

    /// Set the active node without it counting as a user interaction
    pub fn reset(&mut self, id: impl Into<String>, index: usize) {
        self.pending.cancel();
        self.active = Some(ActiveNodeData::new(id, index, NavigationMethod::Init));
    }

    /// A message scrolled into view. Settles into an activation once
    /// scrolling stops for `scroll_gap`; ignored right after another transition.
    pub fn on_message_in_view(&mut self, id: &str, index: usize, now: Instant) {
        if !self.quiet_since_last_transition(now) {
            return;
        }
        self.pending.schedule(
            now,
            self.config.scroll_gap,
            ActiveNodeData::new(id, index, NavigationMethod::Activate),
        );
    }

    /// A node was clicked in the graph. `index` is its depth, which is also
    /// its position in the path that will be displayed.
    pub fn on_node_click(&mut self, id: &str, index: usize, now: Instant) -> Transition {
        if self.click_node_id.as_deref() != Some(id) {
            self.click_node_id = Some(id.to_string());
            self.last_click = None;
        }
        let repeat = self
            .last_click
            .is_some_and(|last| now.saturating_duration_since(last) <= self.config.click_gap);
        self.last_click = Some(now);

        // a settling scroll must not override the click
        if self.pending.cancel() {
            debug!("navigation: click on {} cleared a pending activation", id);
        }
        let method = match repeat {
            true => NavigationMethod::JumpToNode,
            false => NavigationMethod::JumpToFork,
        };
        self.apply(ActiveNodeData::new(id, index, method), now)
    }

    /// Fire a due scroll activation
    pub fn tick(&mut self, now: Instant) -> Option<Transition> {
        let data = self.pending.poll(now)?;
        Some(self.apply(data, now))
    }

    /// While a reply streams in, keep a user who was on the live tip on the newest message
    pub fn follow_stream(&mut self, status: ChatStatus, src: &[ChatMessage]) -> Option<Transition> {
        if status != ChatStatus::Streaming || src.len() < 2 {
            return None;
        }
        let previous = &src[src.len() - 2];
        let newest = &src[src.len() - 1];
        let active = self.active.as_mut()?;
        if active.id != previous.id {
            return None;
        }
        *active = ActiveNodeData::new(newest.id.clone(), src.len() - 1, NavigationMethod::Activate);
        debug!("navigation: following stream to {}", newest.id);
        Some(Transition {
            active: active.clone(),
            scroll: None,
        })
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }

    fn quiet_since_last_transition(&self, now: Instant) -> bool {
        self.last_transition
            .is_none_or(|last| now.saturating_duration_since(last) > self.config.scroll_gap)
    }

    fn apply(&mut self, data: ActiveNodeData, now: Instant) -> Transition {
        let scroll = match data.method {
            NavigationMethod::JumpToNode => Some(ScrollBehavior::Smooth),
            // the whole displayed path may change, animating across it is noise
            NavigationMethod::JumpToFork => Some(ScrollBehavior::Instant),
            NavigationMethod::Init | NavigationMethod::Activate => None,
        };
        debug!(
            "navigation: {} -> id={} index={}",
            data.method, data.id, data.index
        );
        self.last_transition = Some(now);
        self.active = Some(data.clone());
        Transition {
            active: data,
            scroll,
        }
    }
}
