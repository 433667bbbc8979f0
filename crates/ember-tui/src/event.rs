//! Event handling for the Ember dashboard.
//!
//! Provides keyboard input handling and event routing.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::view::View;

/// Application-level events that can trigger state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Switch to a specific view
    SwitchView(View),
    /// Cycle to the next view
    NextView,
    /// Cycle to the previous view
    PrevView,
    /// Show help overlay
    ShowHelp,
    /// Request application quit
    Quit,
    /// Force quit (Ctrl+C)
    ForceQuit,
    /// Cancel current operation
    Cancel,
    /// Open the agent-count prompt for a new run
    OpenRunPrompt,
    /// Toggle event log monitoring without a run
    ToggleWatch,
    /// Fire a demonstration pulse from a random node
    DemoPulse,
    /// Clear the event and output feeds
    ClearFeeds,
    /// Move the agent selection down
    SelectNext,
    /// Move the agent selection up
    SelectPrev,
    /// Character typed into the run prompt
    PromptInput(char),
    /// Backspace in the run prompt
    PromptBackspace,
    /// Bump the run prompt's agent count up
    PromptIncrement,
    /// Bump the run prompt's agent count down
    PromptDecrement,
    /// Submit the run prompt
    PromptSubmit,
    /// No action needed
    None,
}

/// Input handler for converting key events to app events.
#[derive(Debug, Default)]
pub struct InputHandler {
    /// Whether the run prompt is capturing input
    prompt_mode: bool,
}

impl InputHandler {
    /// Create a new input handler.
    pub fn new() -> Self {
        Self { prompt_mode: false }
    }

    /// Set whether the run prompt is capturing input.
    pub fn set_prompt_mode(&mut self, active: bool) {
        self.prompt_mode = active;
    }

    /// Returns whether prompt mode is active.
    pub fn is_prompt_mode(&self) -> bool {
        self.prompt_mode
    }

    /// Handle a key event and return the corresponding app event.
    pub fn handle_key(&mut self, key: KeyEvent) -> AppEvent {
        // Ctrl+C always force quits
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AppEvent::ForceQuit;
        }

        // Escape cancels current operation or closes the prompt
        if key.code == KeyCode::Esc {
            self.prompt_mode = false;
            return AppEvent::Cancel;
        }

        if self.prompt_mode {
            return self.handle_prompt_input(key);
        }

        self.handle_normal_mode(key)
    }

    /// Handle input while the run prompt is open.
    fn handle_prompt_input(&mut self, key: KeyEvent) -> AppEvent {
        match key.code {
            KeyCode::Enter => {
                self.prompt_mode = false;
                AppEvent::PromptSubmit
            }
            KeyCode::Backspace => AppEvent::PromptBackspace,
            KeyCode::Up => AppEvent::PromptIncrement,
            KeyCode::Down => AppEvent::PromptDecrement,
            KeyCode::Char(c) => AppEvent::PromptInput(c),
            _ => AppEvent::None,
        }
    }

    /// Handle input when in normal navigation mode.
    fn handle_normal_mode(&mut self, key: KeyEvent) -> AppEvent {
        match key.code {
            // Quit
            KeyCode::Char('q') | KeyCode::Char('Q') => AppEvent::Quit,

            // Help
            KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Char('H') => AppEvent::ShowHelp,

            // View navigation hotkeys
            KeyCode::Char('1') => AppEvent::SwitchView(View::Stage),
            KeyCode::Char('2') => AppEvent::SwitchView(View::Events),
            KeyCode::Char('3') => AppEvent::SwitchView(View::Output),

            // Run controls
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.prompt_mode = true;
                AppEvent::OpenRunPrompt
            }
            KeyCode::Char('w') | KeyCode::Char('W') => AppEvent::ToggleWatch,
            KeyCode::Char('d') | KeyCode::Char('D') => AppEvent::DemoPulse,
            KeyCode::Char('c') | KeyCode::Char('C') => AppEvent::ClearFeeds,

            // Agent selection
            KeyCode::Down => AppEvent::SelectNext,
            KeyCode::Up => AppEvent::SelectPrev,

            // Tab cycling
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    AppEvent::PrevView
                } else {
                    AppEvent::NextView
                }
            }
            KeyCode::BackTab => AppEvent::PrevView,

            _ => AppEvent::None,
        }
    }
}
