use crossterm::style::Color;

use crate::color::Palette;
use crate::message::ChatMessage;
use crate::navigation::ScrollBehavior;
use crate::tui::split_by_width;
use crate::tui::terminal_buffer::TerminalBuffer;

struct LogLine {
    text: String,
    fg: Color,
    bg: Color,
}

/// The linear conversation, one block per message: a role header, the
/// wrapped content and a blank separator.
#[derive(Debug, Default)]
pub struct ChatLogView {
    /// First visible line
    scroll: usize,
    /// Where a smooth scroll is heading
    target: Option<usize>,
    total_lines: usize,
    viewport: usize,
    /// (message id, first line) from the last render
    anchors: Vec<(String, usize)>,
    /// Stick to the bottom while the newest message grows
    follow_tail: bool,
}

impl ChatLogView {
    pub fn new() -> Self {
        Self {
            follow_tail: true,
            ..Default::default()
        }
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn anchors(&self) -> &[(String, usize)] {
        &self.anchors
    }

    fn max_scroll(&self) -> usize {
        self.total_lines.saturating_sub(self.viewport)
    }

    pub fn scroll_by(&mut self, delta: isize) {
        self.target = None;
        self.scroll = self.scroll.saturating_add_signed(delta).min(self.max_scroll());
        self.follow_tail = self.scroll == self.max_scroll();
    }

    pub fn scroll_to(&mut self, line: usize, behavior: ScrollBehavior) {
        let line = line.min(self.max_scroll());
        self.follow_tail = false;
        match behavior {
            ScrollBehavior::Instant => {
                self.target = None;
                self.scroll = line;
            }
            ScrollBehavior::Smooth => self.target = Some(line),
        }
    }

    /// Advance a smooth scroll by half the remaining distance. Returns whether it moved.
    pub fn step(&mut self) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        let distance = target.abs_diff(self.scroll);
        let stride = distance.div_ceil(2);
        if target > self.scroll {
            self.scroll += stride;
        } else {
            self.scroll -= stride;
        }
        if self.scroll == target {
            self.target = None;
        }
        stride > 0
    }

    /// Message whose block covers the first visible line
    pub fn top_message(&self) -> Option<&str> {
        self.anchors
            .iter()
            .take_while(|(_, line)| *line <= self.scroll)
            .last()
            .map(|(id, _)| id.as_str())
    }

    pub fn anchor(&self, id: &str) -> Option<usize> {
        self.anchors
            .iter()
            .find(|(anchor_id, _)| anchor_id == id)
            .map(|(_, line)| *line)
    }

    pub fn render(
        &mut self,
        messages: &[ChatMessage],
        active_id: Option<&str>,
        buffer: &mut TerminalBuffer,
        palette: &Palette,
    ) {
        let width = buffer.width().saturating_sub(2).max(1);
        let mut lines = Vec::new();
        self.anchors.clear();

        for message in messages {
            self.anchors.push((message.id.clone(), lines.len()));
            let active = active_id == Some(message.id.as_str());
            let bg = if active { palette.highlight() } else { Color::Reset };
            let marker = if active { '▶' } else { '●' };
            lines.push(LogLine {
                text: format!("{marker} {}", message.role),
                fg: palette.role(message.role),
                bg,
            });
            for paragraph in message.content.lines() {
                for chunk in split_by_width(paragraph, width) {
                    lines.push(LogLine {
                        text: format!("  {chunk}"),
                        fg: Color::Reset,
                        bg: Color::Reset,
                    });
                }
            }
            lines.push(LogLine {
                text: String::new(),
                fg: Color::Reset,
                bg: Color::Reset,
            });
        }

        self.total_lines = lines.len();
        self.viewport = buffer.height() as usize;
        if self.follow_tail {
            self.scroll = self.max_scroll();
        }
        self.scroll = self.scroll.min(self.max_scroll());

        for (row, line) in lines.iter().skip(self.scroll).take(self.viewport).enumerate() {
            if line.bg != Color::Reset {
                buffer.fill_row(row as i32, line.bg);
            }
            buffer.put_str(0, row as i32, &line.text, line.fg, line.bg);
        }
    }

    /// Resume sticking to the newest message
    pub fn follow(&mut self) {
        self.target = None;
        self.follow_tail = true;
    }
}
