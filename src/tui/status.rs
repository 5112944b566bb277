use crossterm::style::Color;

use crate::color::Palette;
use crate::message::ChatStatus;
use crate::navigation::ActiveNodeData;
use crate::tui::pad_or_truncate;
use crate::tui::terminal_buffer::TerminalBuffer;

/// What the status line shows, gathered from the session each frame
pub struct StatusLine<'a> {
    pub status: ChatStatus,
    pub active: Option<&'a ActiveNodeData>,
    pub active_id: Option<&'a str>,
    pub nodes: usize,
    pub branches: usize,
}

impl StatusLine<'_> {
    pub fn text(&self) -> String {
        let active = match (self.active, self.active_id) {
            (Some(active), _) => format!("{} ({})", active.id, active.method),
            (None, Some(id)) => format!("{id} (tip)"),
            (None, None) => "-".to_string(),
        };
        format!(
            " {} │ {} messages │ {} forks │ active {} │ ^R reload ^S stop ^P keep branch Esc quit",
            self.status, self.nodes, self.branches, active
        )
    }

    pub fn render(&self, buffer: &mut TerminalBuffer, row: u16, palette: &Palette) {
        let line = pad_or_truncate(&self.text(), buffer.width());
        buffer.put_str(0, row as i32, &line, palette.status(self.status.is_busy()), Color::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::NavigationMethod;

    #[test]
    fn shows_navigation_method() {
        let active = ActiveNodeData::new("msg-3", 2, NavigationMethod::JumpToFork);
        let line = StatusLine {
            status: ChatStatus::Streaming,
            active: Some(&active),
            active_id: Some("msg-3"),
            nodes: 4,
            branches: 1,
        };
        let text = line.text();
        assert!(text.starts_with(" streaming │ 4 messages │ 1 forks"));
        assert!(text.contains("msg-3 (jump-to-fork)"));
    }

    #[test]
    fn falls_back_to_tip() {
        let line = StatusLine {
            status: ChatStatus::Ready,
            active: None,
            active_id: Some("msg-9"),
            nodes: 9,
            branches: 0,
        };
        assert!(line.text().contains("active msg-9 (tip)"));
    }
}
