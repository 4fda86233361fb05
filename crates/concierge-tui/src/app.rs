use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc;

use concierge_core::{
    execute, Affordance, ChatApi, ChatSession, Completion, Config, Effect, Poller, Request, View,
};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Composer,
    Choices,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Conversation
    pub session: ChatSession,
    pub api: ChatApi,
    pub poller: Poller<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,

    // Composer state
    pub composer: String,
    pub composer_cursor: usize, // cursor position in composer, in chars
    pub choice_state: ListState,

    // Chat view state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_tail: bool,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: &Config, view: View, tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        let api = ChatApi::new(&config.base_url, config.message_shape);
        let session = ChatSession::new(view, &config.page_url);
        let poller = Poller::new(
            api.clone(),
            view,
            session.sequencer().clone(),
            config.poll_interval(),
            tx.clone(),
        );

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Composer,

            session,
            api,
            poller,
            tx,

            composer: String::new(),
            composer_cursor: 0,
            choice_state: ListState::default(),

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_tail: true,
            chat_area: None,

            animation_frame: 0,
        }
    }

    /// Fetch the greeting (customer view) and arm polling if wanted
    pub fn start(&mut self) {
        if self.session.view() == View::Customer {
            let request = self.session.intro();
            self.dispatch(request);
        }
        self.sync_poller();
    }

    /// Run a request in the background; its completion comes back as an
    /// [`AppEvent::Net`].
    fn dispatch(&self, request: Request) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let completion = execute(&api, request).await;
            let _ = tx.send(AppEvent::Net(completion));
        });
    }

    fn sync_poller(&mut self) {
        self.poller.sync(self.session.should_poll());
    }

    pub fn affordance(&self) -> Affordance {
        self.session.affordance()
    }

    /// Send the composer text. The composer is cleared now and refilled if
    /// the send fails.
    pub fn submit_composer(&mut self) {
        if !self.session.can_send_message() {
            return;
        }
        let text = std::mem::take(&mut self.composer);
        self.composer_cursor = 0;
        if let Some(request) = self.session.send_message(&text) {
            self.dispatch(request);
            self.follow_tail = true;
            self.scroll_to_bottom();
        }
    }

    /// Send the highlighted button or dropdown entry
    pub fn choose_selected(&mut self) {
        let affordance = self.affordance();
        let Some(label) = self
            .choice_state
            .selected()
            .and_then(|i| affordance.choices().get(i).cloned())
        else {
            return;
        };
        if let Some(request) = self.session.choose_option(&label) {
            self.dispatch(request);
            self.follow_tail = true;
            self.scroll_to_bottom();
        }
    }

    pub fn cancel_flow(&mut self) {
        if !self.session.in_flow() {
            return;
        }
        let request = self.session.cancel_flow();
        self.dispatch(request);
    }

    pub fn reconnect(&mut self) {
        if self.session.reconnect() {
            self.sync_poller();
        }
    }

    pub fn apply(&mut self, completion: Completion) {
        for effect in self.session.apply(completion) {
            if let Effect::SendFailed { text, .. } = effect {
                if self.composer.is_empty() && !text.is_empty() {
                    self.composer_cursor = text.chars().count();
                    self.composer = text;
                }
            }
        }
        self.sync_poller();
        self.sync_focus();
        if self.follow_tail {
            self.scroll_to_bottom();
        }
    }

    /// Keep focus and input mode consistent with the current affordance
    pub fn sync_focus(&mut self) {
        let affordance = self.affordance();
        let choices = affordance.choices().len();

        if choices == 0 {
            self.choice_state.select(None);
        } else {
            let selected = self.choice_state.selected().unwrap_or(0).min(choices - 1);
            self.choice_state.select(Some(selected));
        }

        if !affordance.accepts_text() {
            self.input_mode = InputMode::Normal;
            self.focus = FocusPane::Choices;
        } else if self.focus == FocusPane::Choices && choices == 0 {
            self.focus = FocusPane::Composer;
        }
    }

    pub fn toggle_focus(&mut self) {
        let affordance = self.affordance();
        self.focus = match self.focus {
            FocusPane::Composer if !affordance.choices().is_empty() => {
                self.input_mode = InputMode::Normal;
                FocusPane::Choices
            }
            FocusPane::Choices if affordance.accepts_text() => {
                self.input_mode = InputMode::Editing;
                self.composer_cursor = self.composer.chars().count();
                FocusPane::Composer
            }
            focus => focus,
        };
    }

    // Choice navigation
    pub fn choice_nav_down(&mut self) {
        let len = self.affordance().choices().len();
        if len > 0 {
            let i = self.choice_state.selected().unwrap_or(0);
            self.choice_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn choice_nav_up(&mut self) {
        let i = self.choice_state.selected().unwrap_or(0);
        self.choice_state.select(Some(i.saturating_sub(1)));
    }

    // Chat scrolling
    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_tail = self.chat_scroll >= max;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> u16 {
        self.total_chat_lines().saturating_sub(self.chat_height)
    }

    /// Rendered line count of the chat pane at the current width
    fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;
        for msg in self.session.messages() {
            total_lines += 1; // Speaker line
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                total_lines += char_count.div_ceil(width).max(1);
            }
            total_lines += 1; // Blank line after message
        }

        if self.session.is_waiting() {
            total_lines += 2; // "AI:" + "Thinking..."
        }

        total_lines.min(u16::MAX as usize) as u16
    }
}
