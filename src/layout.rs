use tracing::debug;

use crate::message::{ChatMessage, ChatStatus, Role};
use crate::style::{EdgeType, StyleConfig};
use crate::tree::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A positioned message in the branch graph. Rebuilt on every layout pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    /// Same as the message id
    pub id: String,
    pub role: Role,
    pub position: Position,
    pub width: f32,
    pub height: f32,
    pub label: String,
    pub depth: usize,
    pub is_root: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStyle {
    pub stroke: &'static str,
    pub stroke_width: f32,
    pub dashed: bool,
    pub animated: bool,
    pub kind: EdgeType,
}

/// Connection from a message to one of its continuations
#[derive(Debug, Clone, PartialEq)]
pub struct FlowEdge {
    /// `<source>-<target>`
    pub id: String,
    pub source: String,
    pub target: String,
    pub style: EdgeStyle,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowLayout {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowLayout {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Bottom-right corner of the furthest node
    pub fn extent(&self) -> Position {
        self.nodes.iter().fold(Position::default(), |extent, node| Position {
            x: extent.x.max(node.position.x + node.width),
            y: extent.y.max(node.position.y + node.height),
        })
    }
}

/// Stroke color for an edge leading into a message of `role`
pub fn role_stroke(role: Role) -> &'static str {
    match role {
        Role::User => "#2563eb",
        Role::Assistant => "#16a34a",
        Role::System => "#9ca3af",
    }
}

/// `content` when it fits, otherwise its first `max_characters` chars and an ellipsis.
/// Zero hides the label.
pub fn truncate_label(content: &str, max_characters: usize) -> String {
    if max_characters == 0 {
        return String::new();
    }
    match content.char_indices().nth(max_characters) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// How much text a fixed-height node can show without a partial line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayoutMetrics {
    pub line_px: f32,
    pub max_complete_lines: usize,
    pub exact_text_height: f32,
}

pub fn calculate_text_layout_metrics(
    node_height: f32,
    font_size: f32,
    line_height: f32,
    padding: f32,
) -> TextLayoutMetrics {
    let line_px = font_size * line_height;
    let max_complete_lines = if line_px > 0.0 {
        ((node_height - padding) / line_px).floor().max(0.0) as usize
    } else {
        0
    };
    TextLayoutMetrics {
        line_px,
        max_complete_lines,
        exact_text_height: max_complete_lines as f32 * line_height * font_size,
    }
}

/// Project the tree into a layered graph.
///
/// Depth comes from the level-order traversal, which visits each level
/// contiguously and left to right, so the index within a level restarts
/// whenever the depth changes. Branches created later sit further right.
pub fn generate_layouted_elements(
    tree: &Tree<ChatMessage>,
    style: &StyleConfig,
    active_node_id: Option<&str>,
    status: ChatStatus,
) -> FlowLayout {
    let mut layout = FlowLayout::default();
    let mut current_depth = 0;
    let mut index_in_level = 0;

    tree.level_order(|node, depth| {
        if depth != current_depth {
            current_depth = depth;
            index_in_level = 0;
        }
        let message = node.data();

        layout.nodes.push(FlowNode {
            id: node.id().to_string(),
            role: message.role,
            position: Position {
                x: index_in_level as f32 * style.horizontal_spacing,
                y: depth as f32 * style.vertical_spacing,
            },
            width: style.node_width,
            height: style.node_height,
            label: truncate_label(&message.content, style.max_characters),
            depth,
            is_root: node.is_root(),
            is_active: active_node_id == Some(node.id()),
        });

        if let Some(parent) = tree.parent_of(node.id()) {
            let streaming_into = status == ChatStatus::Streaming
                && node.is_leaf()
                && message.role == Role::Assistant;
            layout.edges.push(FlowEdge {
                id: format!("{}-{}", parent.id(), node.id()),
                source: parent.id().to_string(),
                target: node.id().to_string(),
                style: EdgeStyle {
                    stroke: role_stroke(message.role),
                    stroke_width: style.edge_width,
                    dashed: message.role == Role::System,
                    animated: style.edge_animated || streaming_into,
                    kind: style.edge_type,
                },
            });
        }

        index_in_level += 1;
        true
    });

    debug!(
        "layout: nodes={} edges={} active={:?}",
        layout.nodes.len(),
        layout.edges.len(),
        active_node_id
    );
    layout
}
