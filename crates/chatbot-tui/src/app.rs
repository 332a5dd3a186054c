use chatbot_core::{HttpBackend, Message, PathPicker, SessionController, TurnOutcome};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
    /// Typing a path into the attach prompt
    Attach,
}

/// Single-line text field with a character-based cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInput {
    pub text: String,
    pub cursor: usize,
}

fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl LineInput {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.char_count();
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Clear the field and hand back what was typed.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    pub input: LineInput,
    pub attach_input: LineInput,

    // Chat view state
    pub scroll: u16,
    /// Keep the view pinned to the newest message
    pub follow: bool,
    pub chat_height: u16, // inner height of chat area, set during render
    pub chat_width: u16,  // inner width of chat area, set during render

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub session: SessionController<HttpBackend>,
    pub server_url: String,
}

impl App {
    pub fn new(session: SessionController<HttpBackend>) -> Self {
        let server_url = session.backend().base_url().to_string();
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            input: LineInput::default(),
            attach_input: LineInput::default(),
            scroll: 0,
            follow: true,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            session,
            server_url,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    /// Spawn a text turn for whatever is in the input box.
    ///
    /// The input is kept while another turn is pending so nothing typed is lost.
    pub fn submit_input(&mut self) {
        if self.input.is_blank() || self.is_busy() {
            return;
        }

        let text = self.input.take();
        let session = self.session.clone();
        tokio::spawn(async move {
            session.send_text(&text).await;
        });
        self.follow = true;
    }

    pub fn open_attach_prompt(&mut self) {
        if self.is_busy() {
            return;
        }
        self.attach_input = LineInput::default();
        self.input_mode = InputMode::Attach;
    }

    /// Spawn an upload for the path typed into the attach prompt.
    ///
    /// A text turn submitted while the file is being resolved wins, and the
    /// upload is dropped with a warning in the log file.
    pub fn submit_attach(&mut self) {
        let raw = self.attach_input.take();
        self.input_mode = InputMode::Editing;

        let picker = PathPicker::from_input(&raw);
        let session = self.session.clone();
        tokio::spawn(async move {
            if let TurnOutcome::Rejected(reason) = session.attach_from(&picker).await {
                warn!(?reason, path = ?picker.path(), "attachment dropped");
            }
        });
        self.follow = true;
    }

    pub fn close_attach_prompt(&mut self) {
        self.attach_input = LineInput::default();
        self.input_mode = InputMode::Editing;
    }

    /// Called whenever the session publishes a change.
    pub fn on_session_changed(&mut self) {
        if self.follow {
            self.scroll_to_bottom();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = (self.scroll + lines).min(max);
        self.follow = self.scroll >= max;
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
        self.follow = true;
    }

    fn max_scroll(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };
        let total = chat_line_count(&self.session.messages(), self.is_busy(), wrap_width);
        total.saturating_sub(self.chat_height)
    }
}

/// Number of rendered rows the chat history takes at `wrap_width` columns,
/// clamped to `u16::MAX`.
pub fn chat_line_count(messages: &[Message], busy: bool, wrap_width: usize) -> u16 {
    let wrap_width = wrap_width.max(1);
    let wrapped = |line: &str| -> usize {
        // Use character count, not byte length, for proper UTF-8 handling
        let char_count = line.chars().count();
        if char_count == 0 {
            1
        } else {
            char_count.div_ceil(wrap_width)
        }
    };

    let mut total: usize = 0;
    for msg in messages {
        total = total.saturating_add(1); // Sender line ("You:" or "Bot:")
        if let Some(text) = msg.text() {
            for line in text.lines() {
                total = total.saturating_add(wrapped(line));
            }
        }
        if let Some(uri) = msg.attachment_uri() {
            total = total.saturating_add(wrapped(uri));
        }
        total = total.saturating_add(1); // Blank separator
    }

    if busy {
        total = total.saturating_add(2);
    }
    u16::try_from(total).unwrap_or(u16::MAX)
}
