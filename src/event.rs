use crossterm::event::{Event, KeyEvent, KeyEventKind, MouseEvent};

/// Terminal input the client reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Paste(String),
}

impl AppEvent {
    /// Drop focus changes and key releases
    pub fn from_crossterm(event: Event) -> Option<Self> {
        match event {
            Event::Key(key_event) if key_event.kind != KeyEventKind::Release => {
                Some(AppEvent::Key(key_event))
            }
            Event::Key(_) => None,
            Event::Mouse(mouse_event) => Some(AppEvent::Mouse(mouse_event)),
            Event::Resize(x, y) => Some(AppEvent::Resize(x, y)),
            Event::Paste(text) => Some(AppEvent::Paste(text)),
            Event::FocusGained | Event::FocusLost => None,
        }
    }
}
