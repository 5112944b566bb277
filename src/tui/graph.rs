use crossterm::style::Color;

use crate::color::Palette;
use crate::layout::{FlowLayout, FlowNode};
use crate::message::Role;
use crate::style::StyleConfig;
use crate::tui::terminal_buffer::TerminalBuffer;
use crate::tui::{Rect, pad_or_truncate};

/// Columns between two siblings
pub const COLUMN_CELLS: f32 = 14.0;
/// Rows between two levels
pub const ROW_CELLS: f32 = 3.0;
/// Label columns inside the brackets of a node
const LABEL_CELLS: u16 = 10;

/// Branch graph projected onto terminal cells. Remembers where each node
/// was drawn so clicks can be mapped back to messages.
#[derive(Debug, Default)]
pub struct GraphView {
    offset_x: i32,
    offset_y: i32,
    /// (drawn area, message id, depth)
    hits: Vec<(Rect, String, usize)>,
}

impl GraphView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_by(&mut self, dx: i32, dy: i32) {
        self.offset_x = (self.offset_x + dx).max(0);
        self.offset_y = (self.offset_y + dy).max(0);
    }

    /// Cell of a node's top-left corner, before scrolling
    fn cell_of(node: &FlowNode, style: &StyleConfig) -> (i32, i32) {
        let column = node.position.x / style.horizontal_spacing.max(1.0) * COLUMN_CELLS;
        let row = node.position.y / style.vertical_spacing.max(1.0) * ROW_CELLS;
        (column.round() as i32, row.round() as i32)
    }

    /// Keep `id` inside a viewport of `width` x `height` cells
    pub fn reveal(&mut self, layout: &FlowLayout, style: &StyleConfig, id: &str, width: u16, height: u16) {
        let Some(node) = layout.node(id) else {
            return;
        };
        let (column, row) = Self::cell_of(node, style);
        let node_width = LABEL_CELLS as i32 + 2;
        if column < self.offset_x || column + node_width > self.offset_x + width as i32 {
            self.offset_x = (column - width as i32 / 2).max(0);
        }
        if row < self.offset_y || row >= self.offset_y + height as i32 {
            self.offset_y = (row - height as i32 / 2).max(0);
        }
    }

    /// Message id and depth of the node drawn at (column, row) of the pane
    pub fn hit(&self, column: u16, row: u16) -> Option<(&str, usize)> {
        self.hits
            .iter()
            .find(|(rect, _, _)| rect.contains(column, row))
            .map(|(_, id, depth)| (id.as_str(), *depth))
    }

    pub fn render(
        &mut self,
        layout: &FlowLayout,
        style: &StyleConfig,
        buffer: &mut TerminalBuffer,
        palette: &Palette,
    ) {
        self.hits.clear();
        let place = |node: &FlowNode| {
            let (column, row) = Self::cell_of(node, style);
            (column - self.offset_x, row - self.offset_y)
        };

        // edges first so nodes draw over the connectors
        for edge in &layout.edges {
            let (Some(source), Some(target)) = (layout.node(&edge.source), layout.node(&edge.target))
            else {
                continue;
            };
            let (sx, sy) = place(source);
            let (tx, ty) = place(target);
            let color = palette.stroke(edge.style.stroke, target.role);
            let (from, to) = (sx + 1, tx + 1);
            if from == to {
                for y in sy + 1..ty {
                    buffer.set(to, y, '│', color, Color::Reset);
                }
                continue;
            }
            let junction = if edge.style.dashed { '┄' } else { '─' };
            for x in from.min(to)..from.max(to) {
                buffer.set(x, sy + 1, junction, color, Color::Reset);
            }
            // a child can sit left of its parent when an earlier sibling of the parent is a leaf
            let (tee, corner) = if to > from { ('├', '┐') } else { ('┤', '┌') };
            buffer.set(from, sy + 1, tee, color, Color::Reset);
            buffer.set(to, sy + 1, corner, color, Color::Reset);
            for y in sy + 2..ty {
                buffer.set(to, y, '│', color, Color::Reset);
            }
        }

        for node in &layout.nodes {
            let (x, y) = place(node);
            let text = if node.label.is_empty() {
                role_initial(node.role).to_string()
            } else {
                node.label.replace('\n', " ")
            };
            let bg = if node.is_active { palette.highlight() } else { Color::Reset };
            let fg = palette.role(node.role);
            let drawn = format!("[{}]", pad_or_truncate(&text, LABEL_CELLS));
            let width = buffer.put_str(x, y, &drawn, fg, bg);

            if x >= 0 && y >= 0 && x < buffer.width() as i32 && y < buffer.height() as i32 {
                self.hits.push((
                    Rect::new(x as u16, y as u16, width, 1),
                    node.id.clone(),
                    node.depth,
                ));
            }
        }
    }
}

fn role_initial(role: Role) -> char {
    match role {
        Role::User => 'U',
        Role::Assistant => 'A',
        Role::System => 'S',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorLevel;
    use crate::layout::generate_layouted_elements;
    use crate::message::{ChatMessage, ChatStatus};
    use crate::tree::Tree;

    fn layout() -> (FlowLayout, StyleConfig) {
        let mut tree = Tree::new();
        tree.set_root("q", ChatMessage::user("q", "question"));
        tree.set_node("a1", ChatMessage::assistant("a1", "first"), Some("q"))
            .unwrap();
        tree.set_node("a2", ChatMessage::assistant("a2", "second"), Some("q"))
            .unwrap();
        let style = StyleConfig::default();
        (
            generate_layouted_elements(&tree, &style, Some("a2"), ChatStatus::Ready),
            style,
        )
    }

    #[test]
    fn nodes_are_clickable_where_drawn() {
        let (layout, style) = layout();
        let mut view = GraphView::new();
        let mut buffer = TerminalBuffer::new(40, 10);
        view.render(&layout, &style, &mut buffer, &Palette::new(ColorLevel::None));

        assert_eq!(view.hit(0, 0), Some(("q", 0)));
        assert_eq!(view.hit(3, 3), Some(("a1", 1)));
        assert_eq!(view.hit(15, 3), Some(("a2", 1)));
        assert_eq!(view.hit(30, 8), None);
        assert!(buffer.row_text(3).starts_with("[first     ]"));
        assert_eq!(buffer.get(1, 1).unwrap().ch, '├');
        assert_eq!(buffer.get(15, 1).unwrap().ch, '┐');
    }

    #[test]
    fn leftward_edge_turns_back_under_its_parent() {
        let mut tree = Tree::new();
        tree.set_root("q", ChatMessage::user("q", "question"));
        tree.set_node("a1", ChatMessage::assistant("a1", "first"), Some("q"))
            .unwrap();
        tree.set_node("a2", ChatMessage::assistant("a2", "second"), Some("q"))
            .unwrap();
        tree.set_node("b", ChatMessage::user("b", "follow"), Some("a2"))
            .unwrap();
        let style = StyleConfig::default();
        let layout = generate_layouted_elements(&tree, &style, Some("b"), ChatStatus::Ready);

        let mut view = GraphView::new();
        let mut buffer = TerminalBuffer::new(40, 10);
        view.render(&layout, &style, &mut buffer, &Palette::new(ColorLevel::None));

        assert_eq!(view.hit(3, 6), Some(("b", 2)));
        assert!(buffer.row_text(6).starts_with("[follow    ]"));
        assert_eq!(buffer.get(15, 4).unwrap().ch, '┤');
        assert_eq!(buffer.get(1, 4).unwrap().ch, '┌');
        assert_eq!(buffer.get(8, 4).unwrap().ch, '─');
        assert_eq!(buffer.get(1, 5).unwrap().ch, '│');
        assert!(buffer.row_text(4).starts_with(" ┌─────────────┤"));
    }

    #[test]
    fn scrolled_out_nodes_are_not_hit() {
        let (layout, style) = layout();
        let mut view = GraphView::new();
        view.scroll_by(14, 0);
        let mut buffer = TerminalBuffer::new(40, 10);
        view.render(&layout, &style, &mut buffer, &Palette::new(ColorLevel::None));
        assert_eq!(view.hit(0, 3), Some(("a2", 1)));
        assert!(view.hits.iter().all(|(_, id, _)| id != "a1"));
    }

    #[test]
    fn reveal_moves_offset_to_node() {
        let (layout, style) = layout();
        let mut view = GraphView::new();
        view.reveal(&layout, &style, "a2", 20, 10);
        assert!(view.offset_x > 0);
        view.reveal(&layout, &style, "q", 20, 10);
        assert_eq!(view.offset_x, 0);
    }
}
