use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode};
use tracing::trace;

use crate::domain::{Message, NexusError, ViewerConfig};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            event_poll_time: config.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, NexusError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            // While the search prompt is open, every key goes to the
            // inputter untranslated.
            if model.capturing_input() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(self.handle_key(key));
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Left => Some(Message::SelectLeft),
            KeyCode::Right => Some(Message::SelectRight),
            KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('n') | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('p') | KeyCode::PageUp => Some(Message::PrevPage),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::FirstPage),
            KeyCode::Char('G') | KeyCode::End => Some(Message::LastPage),
            KeyCode::Char('s') | KeyCode::Enter => Some(Message::ToggleSort),
            KeyCode::Char('/') => Some(Message::BeginSearch),
            KeyCode::Char('c') => Some(Message::ClearSearch),
            KeyCode::Char('y') => Some(Message::CopyCell),
            KeyCode::Char('Y') => Some(Message::CopyRow),
            KeyCode::Char('?') => Some(Message::Help),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
