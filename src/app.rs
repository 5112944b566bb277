use std::io::{Write, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use chattree::color::Palette;
use chattree::config::Config;
use chattree::event::AppEvent;
use chattree::message::ChatMessage;
use chattree::session::ChatSession;
use chattree::transport::ScriptedTransport;
use chattree::tui::chat_log::ChatLogView;
use chattree::tui::graph::GraphView;
use chattree::tui::status::StatusLine;
use chattree::tui::terminal_buffer::TerminalBuffer;
use chattree::tui::{Rect, pad_or_truncate};
use crossterm::cursor::{MoveTo, Show};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use crossterm::queue;
use crossterm::style::Color;
use tracing::debug;

/// Redraw at least this often so streamed words show up
const FRAME: Duration = Duration::from_millis(50);
const WHEEL_LINES: isize = 3;

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    session: ChatSession<ScriptedTransport>,
    log: ChatLogView,
    graph: GraphView,
    palette: Palette,
    input: String,
    dimensions: (u16, u16),
}

impl App {
    pub fn new(config: &Config) -> Self {
        let transport = ScriptedTransport::with_messages(
            config.stream_delay,
            vec![ChatMessage::system("system", "You are a helpful assistant.")],
        );
        Self {
            session: ChatSession::new(transport, config),
            log: ChatLogView::new(),
            graph: GraphView::new(),
            palette: Palette::detect(),
            input: String::new(),
            dimensions: (0, 0),
        }
    }

    /// Log pane on the left, graph pane on the right, two rows for status and input
    fn panes(&self) -> (Rect, Rect) {
        let (width, height) = self.dimensions;
        let body = height.saturating_sub(2);
        let log_width = width * 3 / 5;
        let log = Rect::new(0, 0, log_width, body);
        let graph = Rect::new(log_width + 1, 0, width.saturating_sub(log_width + 1), body);
        (log, graph)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = stdout();
        self.dimensions = crossterm::terminal::size()?;

        loop {
            let now = Instant::now();
            self.session.sync(now);
            self.draw(&mut stdout)?;
            if self.apply_scroll_request() {
                self.draw(&mut stdout)?;
            }

            let timeout = self
                .session
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(now).min(FRAME))
                .unwrap_or(FRAME);
            if !crossterm::event::poll(timeout)? {
                continue;
            }
            let Some(event) = AppEvent::from_crossterm(crossterm::event::read()?) else {
                continue;
            };
            if self.update(event, Instant::now()) == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    fn draw<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let (width, height) = self.dimensions;
        let (log_rect, graph_rect) = self.panes();
        let mut screen = TerminalBuffer::new(width, height);

        let resolved = self.session.resolve();
        let active_id = resolved.active_id.as_deref();
        let mut log_pane = TerminalBuffer::new(log_rect.width, log_rect.height);
        self.log.step();
        self.log
            .render(&resolved.messages, active_id, &mut log_pane, &self.palette);
        for (id, line) in self.log.anchors().to_vec() {
            self.session.add_message_ref(&id, line);
        }
        screen.blit(&log_pane, log_rect.x as i32, log_rect.y as i32);

        for row in 0..graph_rect.height {
            screen.set(log_rect.width as i32, row as i32, '│', Color::DarkGrey, Color::Reset);
        }
        let flow = self.session.flow();
        let mut graph_pane = TerminalBuffer::new(graph_rect.width, graph_rect.height);
        self.graph
            .render(&flow, self.session.style(), &mut graph_pane, &self.palette);
        screen.blit(&graph_pane, graph_rect.x as i32, graph_rect.y as i32);

        let status = StatusLine {
            status: self.session.status(),
            active: self.session.active(),
            active_id,
            nodes: self.session.chat().tree().len(),
            branches: self.session.chat().branch_count(),
        };
        status.render(&mut screen, height.saturating_sub(2), &self.palette);

        let prompt = format!("> {}", self.input);
        screen.put_str(
            0,
            height.saturating_sub(1) as i32,
            &pad_or_truncate(&prompt, width),
            Color::Reset,
            Color::Reset,
        );

        screen.flush(out)?;
        let cursor = (prompt.chars().count() as u16).min(width.saturating_sub(1));
        queue!(out, MoveTo(cursor, height.saturating_sub(1)), Show)?;
        out.flush()?;
        Ok(())
    }

    /// Scroll both panes to the target of a jump. Returns whether anything moved.
    fn apply_scroll_request(&mut self) -> bool {
        let Some(request) = self.session.take_scroll_request() else {
            return false;
        };
        let (_, graph_rect) = self.panes();
        let flow = self.session.flow();
        self.graph.reveal(
            &flow,
            self.session.style(),
            &request.id,
            graph_rect.width,
            graph_rect.height,
        );
        // the log was just redrawn, its anchors beat the session's older ones
        if let Some(line) = self.log.anchor(&request.id).or(request.anchor) {
            debug!("app: scroll log to {} line={} {:?}", request.id, line, request.behavior);
            self.log.scroll_to(line, request.behavior);
        }
        true
    }

    fn update(&mut self, event: AppEvent, now: Instant) -> Flow {
        match event {
            AppEvent::Key(key_event) => return self.on_key(key_event, now),
            AppEvent::Mouse(mouse_event) => self.on_mouse(mouse_event, now),
            AppEvent::Resize(width, height) => self.dimensions = (width, height),
            AppEvent::Paste(text) => self.input.push_str(&text.replace(['\r', '\n'], " ")),
        }
        Flow::Continue
    }

    fn on_key(&mut self, key_event: KeyEvent, now: Instant) -> Flow {
        let control = key_event.modifiers.contains(KeyModifiers::CONTROL);
        match key_event.code {
            KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('c') if control => return Flow::Quit,
            KeyCode::Char('r') if control => {
                self.session.reload();
                self.log.follow();
            }
            KeyCode::Char('s') if control => self.session.stop(),
            KeyCode::Char('p') if control => {
                self.session.commit_branch();
            }
            KeyCode::Char(ch) if !control => self.input.push(ch),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Enter => {
                if self.session.submit(&self.input) {
                    self.input.clear();
                    self.log.follow();
                }
            }
            KeyCode::Up => self.scroll_log(-1, now),
            KeyCode::Down => self.scroll_log(1, now),
            KeyCode::PageUp => self.scroll_log(-(self.panes().0.height as isize), now),
            KeyCode::PageDown => self.scroll_log(self.panes().0.height as isize, now),
            _ => {}
        }
        Flow::Continue
    }

    fn on_mouse(&mut self, mouse_event: MouseEvent, now: Instant) {
        let (log_rect, graph_rect) = self.panes();
        let MouseEvent {
            kind, column, row, ..
        } = mouse_event;

        if log_rect.contains(column, row) {
            match kind {
                MouseEventKind::ScrollUp => self.scroll_log(-WHEEL_LINES, now),
                MouseEventKind::ScrollDown => self.scroll_log(WHEEL_LINES, now),
                _ => {}
            }
            return;
        }
        if !graph_rect.contains(column, row) {
            return;
        }
        match kind {
            MouseEventKind::ScrollUp => self.graph.scroll_by(0, -1),
            MouseEventKind::ScrollDown => self.graph.scroll_by(0, 1),
            MouseEventKind::ScrollLeft => self.graph.scroll_by(-2, 0),
            MouseEventKind::ScrollRight => self.graph.scroll_by(2, 0),
            MouseEventKind::Down(MouseButton::Left) => {
                let hit = self
                    .graph
                    .hit(column - graph_rect.x, row - graph_rect.y)
                    .map(|(id, depth)| (id.to_string(), depth));
                if let Some((id, depth)) = hit {
                    self.session.on_node_click(&id, depth, now);
                }
            }
            _ => {}
        }
    }

    fn scroll_log(&mut self, delta: isize, now: Instant) {
        self.log.scroll_by(delta);
        if let Some(id) = self.log.top_message().map(str::to_string) {
            self.session.on_message_in_view(&id, now);
        }
    }
}
