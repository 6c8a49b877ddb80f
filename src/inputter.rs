use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single-line editor for the search prompt.
#[derive(Default)]
pub struct Inputter {
    buffer: String,
    cursor: usize,
    finished: bool,
    canceled: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputResult {
    pub text: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor: usize,
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, KeyModifiers::NONE) => self.finish(),
            (KeyCode::Esc, KeyModifiers::NONE) => self.cancel(),
            (KeyCode::Backspace, KeyModifiers::NONE) => self.backspace(),
            (KeyCode::Left, KeyModifiers::NONE) => self.left(),
            (KeyCode::Right, KeyModifiers::NONE) => self.right(),
            (KeyCode::Home, KeyModifiers::NONE) => self.home(),
            (KeyCode::End, KeyModifiers::NONE) => self.end(),
            (code, _) => self.insert(code),
        }
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            text: self.buffer.clone(),
            finished: self.finished,
            canceled: self.canceled,
            cursor: self.cursor,
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.finished = false;
        self.canceled = false;
    }

    fn finish(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn cancel(&mut self) -> InputResult {
        self.finished = true;
        self.canceled = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_pos(self.cursor);
            self.buffer.remove(at);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.cursor = self.cursor.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.cursor < self.buffer.chars().count() {
            self.cursor += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.cursor = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.cursor = self.buffer.chars().count();
        self.get()
    }

    fn insert(&mut self, code: KeyCode) -> InputResult {
        if let Some(chr) = code.as_char() {
            let at = self.byte_pos(self.cursor);
            self.buffer.insert(at, chr);
            self.cursor += 1;
        }
        self.get()
    }

    // Cursor is a char offset; conversions happen at the edit points.
    fn byte_pos(&self, char_pos: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_pos)
            .map(|(idx, _)| idx)
            .unwrap_or(self.buffer.len())
    }
}
