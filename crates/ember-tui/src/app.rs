//! Main application state and logic for the Ember dashboard.
//!
//! The `App` struct manages view switching, the run prompt, and the render
//! loop, and coordinates between the session data layer and the widgets.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEvent};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use ember_core::config::{AppConfig, MAX_AGENT_COUNT, MIN_AGENT_COUNT};

use crate::event::{AppEvent, InputHandler};
use crate::panels::{AgentsPanel, EventsPanel, OutputPanel};
use crate::session::{RunState, Session};
use crate::stage::StagePanel;
use crate::theme::Palette;
use crate::view::View;

/// Result type for app operations.
pub type AppResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Target frame rate (60 FPS = ~16.67ms per frame).
const TARGET_FPS: u64 = 60;
const FRAME_DURATION: Duration = Duration::from_millis(1000 / TARGET_FPS);

/// Interval between session polls.
const DATA_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Redraw at least this often so the header clock stays current.
const CLOCK_REFRESH: Duration = Duration::from_secs(1);

/// Digits accepted in the agent count prompt.
const PROMPT_MAX_DIGITS: usize = 3;

/// Minimum width at which the stage view gets an agent sidebar.
const SIDEBAR_MIN_WIDTH: u16 = 100;

/// Main application state.
pub struct App {
    /// Current active view
    current_view: View,
    /// Input handler for key events
    input_handler: InputHandler,
    /// Whether the app should quit
    should_quit: bool,
    /// Whether to show the help overlay
    show_help: bool,
    /// Agent count buffer; `Some` while the run prompt is open
    agent_prompt: Option<String>,
    /// Selected agent row, highlighted in the sidebar and on the stage
    selected_agent: Option<usize>,
    /// Status message to display in the footer
    status_message: Option<String>,
    /// Session data layer
    session: Session,
    palette: Palette,
    /// Dirty flag, whether the UI needs a redraw
    dirty: bool,
    /// Last session poll time
    last_poll_time: Instant,
    /// Last draw time, for the clock refresh floor
    last_render: Instant,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let now = Instant::now();
        Self {
            current_view: View::default(),
            input_handler: InputHandler::new(),
            should_quit: false,
            show_help: false,
            agent_prompt: None,
            selected_agent: None,
            status_message: None,
            session: Session::new(config),
            palette: Palette::default(),
            dirty: true,
            last_poll_time: now,
            last_render: now,
        }
    }

    /// Returns the current view.
    pub fn current_view(&self) -> View {
        self.current_view
    }

    /// Returns whether the app should quit.
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Returns whether the help overlay is visible.
    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Selected agent row, if it still points into the current roster.
    pub fn selected_agent(&self) -> Option<usize> {
        self.selected_agent
            .filter(|&index| index < self.session.agents().len())
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn take_dirty(&mut self) -> bool {
        if self.dirty {
            self.dirty = false;
            true
        } else {
            false
        }
    }

    /// Pull pending run notices and tail batches into the session.
    ///
    /// The run loop calls this on an interval; it is public so the app can
    /// be driven without a terminal.
    pub fn poll_session(&mut self) {
        self.session.poll_updates(Instant::now());
        if self.session.take_dirty() {
            self.mark_dirty();
        }
    }

    /// Switch to a specific view.
    pub fn switch_view(&mut self, view: View) {
        if self.current_view != view {
            self.current_view = view;
            self.status_message = Some(format!(
                "{} (press {} to return here)",
                view.title(),
                view.hotkey()
            ));
            self.mark_dirty();
        }
    }

    /// Handle a key event.
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        let event = self.input_handler.handle_key(key);
        self.handle_app_event(event);
    }

    /// Handle an application event.
    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SwitchView(view) => self.switch_view(view),
            AppEvent::NextView => self.switch_view(self.current_view.next()),
            AppEvent::PrevView => self.switch_view(self.current_view.prev()),
            AppEvent::ShowHelp => {
                self.show_help = true;
                self.mark_dirty();
            }
            AppEvent::Quit | AppEvent::ForceQuit => self.should_quit = true,
            AppEvent::Cancel => {
                if self.show_help {
                    self.show_help = false;
                } else if self.agent_prompt.take().is_some() {
                    self.status_message = Some("Run cancelled".to_string());
                }
                self.mark_dirty();
            }
            AppEvent::OpenRunPrompt => self.open_run_prompt(),
            AppEvent::ToggleWatch => self.toggle_watch(),
            AppEvent::DemoPulse => self.demo_pulse(),
            AppEvent::ClearFeeds => {
                self.session.clear_feeds();
                self.status_message = Some("Feeds cleared".to_string());
                self.mark_dirty();
            }
            AppEvent::SelectNext => self.move_selection(1),
            AppEvent::SelectPrev => self.move_selection(-1),
            AppEvent::PromptInput(c) => {
                if let Some(buffer) = self.agent_prompt.as_mut() {
                    if c.is_ascii_digit() && buffer.len() < PROMPT_MAX_DIGITS {
                        buffer.push(c);
                        self.mark_dirty();
                    }
                }
            }
            AppEvent::PromptBackspace => {
                if let Some(buffer) = self.agent_prompt.as_mut() {
                    buffer.pop();
                    self.mark_dirty();
                }
            }
            AppEvent::PromptIncrement => self.adjust_prompt(1),
            AppEvent::PromptDecrement => self.adjust_prompt(-1),
            AppEvent::PromptSubmit => self.submit_run_prompt(),
            AppEvent::None => {}
        }
    }

    /// Open the agent count prompt, prefilled from configuration.
    fn open_run_prompt(&mut self) {
        if self.session.run_state().is_running() {
            // The input handler already flipped into prompt mode on the
            // hotkey; flip it back since no prompt opens
            self.input_handler.set_prompt_mode(false);
            self.status_message = Some("A run is already in progress".to_string());
            self.mark_dirty();
            return;
        }

        let default_count = self.session.config().default_agent_count;
        self.agent_prompt = Some(default_count.to_string());
        self.mark_dirty();
    }

    /// Step the prompt's agent count, staying inside the valid range.
    ///
    /// An emptied buffer steps from the configured default.
    fn adjust_prompt(&mut self, delta: i64) {
        let Some(buffer) = self.agent_prompt.as_mut() else {
            return;
        };

        let current = buffer
            .trim()
            .parse::<i64>()
            .unwrap_or(i64::from(self.session.config().default_agent_count));
        let stepped = (current + delta)
            .clamp(i64::from(MIN_AGENT_COUNT), i64::from(MAX_AGENT_COUNT));
        *buffer = stepped.to_string();
        self.mark_dirty();
    }

    /// Move the agent selection, wrapping at either end of the roster.
    fn move_selection(&mut self, delta: i64) {
        let count = self.session.agents().len();
        if count == 0 {
            self.selected_agent = None;
            return;
        }

        let current = self
            .selected_agent()
            .map(|index| index as i64)
            .unwrap_or(if delta > 0 { -1 } else { 0 });
        let next = (current + delta).rem_euclid(count as i64) as usize;
        self.selected_agent = Some(next);
        self.mark_dirty();
    }

    fn submit_run_prompt(&mut self) {
        let Some(buffer) = self.agent_prompt.take() else {
            return;
        };

        let Ok(requested) = buffer.trim().parse::<u32>() else {
            self.status_message = Some("Enter a number of agents".to_string());
            self.mark_dirty();
            return;
        };
        let agent_count = requested.clamp(MIN_AGENT_COUNT, MAX_AGENT_COUNT);

        match self.session.start_run(agent_count) {
            Ok(()) => {
                self.status_message = Some(format!("Starting run with {} agents", agent_count));
            }
            Err(e) => {
                self.status_message = Some(e.to_string());
            }
        }
        self.mark_dirty();
    }

    fn toggle_watch(&mut self) {
        match self.session.toggle_watch() {
            Ok(true) => {
                self.status_message = Some(format!(
                    "Watching {}",
                    self.session.config().event_log_path.display()
                ));
            }
            Ok(false) => {
                self.status_message = Some("Watch stopped".to_string());
            }
            Err(e) => {
                self.status_message = Some(format!("Watch failed: {}", e));
            }
        }
        self.mark_dirty();
    }

    fn demo_pulse(&mut self) {
        match self.session.demo_pulse(Instant::now()) {
            Some(agent_id) => {
                self.status_message = Some(format!("Pulse from {}", agent_id));
            }
            None => {
                self.status_message =
                    Some("No topology to pulse. Start a run first.".to_string());
            }
        }
        self.mark_dirty();
    }

    /// Run the main application loop.
    pub fn run(&mut self) -> AppResult<()> {
        // Setup terminal
        crossterm::terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(
            stdout,
            crossterm::terminal::EnterAlternateScreen,
            crossterm::event::EnableMouseCapture
        )?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Main loop
        let result = self.run_loop(&mut terminal);

        // Restore terminal
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::event::DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    /// The inner event loop with frame-rate limiting and interval polling.
    fn run_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> AppResult<()> {
        while !self.should_quit {
            let frame_start = Instant::now();

            let needs_poll = self.last_poll_time.elapsed() >= DATA_POLL_INTERVAL;
            if needs_poll {
                self.poll_session();
                self.last_poll_time = Instant::now();
            }

            // Animations advance every frame while anything is on stage
            if self.session.tick(Instant::now()) {
                self.mark_dirty();
            }

            // Only draw when dirty, with a floor so the clock keeps moving
            let needs_redraw =
                self.take_dirty() || self.last_render.elapsed() >= CLOCK_REFRESH;
            if needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.last_render = Instant::now();
            }

            // Calculate remaining time in frame for event handling
            let elapsed = frame_start.elapsed();
            let event_timeout = if elapsed < FRAME_DURATION {
                FRAME_DURATION - elapsed
            } else {
                Duration::from_millis(10)
            };

            if event::poll(event_timeout)? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key_event(key);
                }
            }

            // Frame-rate limiting: sleep if the frame was too fast
            let frame_elapsed = frame_start.elapsed();
            if frame_elapsed < FRAME_DURATION {
                std::thread::sleep(FRAME_DURATION - frame_elapsed);
            }
        }
        Ok(())
    }

    /// Draw the UI.
    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();

        // Main layout: header, content, footer
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(2),
            ])
            .split(area);

        self.draw_header(frame, chunks[0]);
        self.draw_content(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);

        if let Some(buffer) = &self.agent_prompt {
            self.draw_prompt_overlay(frame, area, buffer);
        }
        if self.show_help {
            self.draw_help_overlay(frame, area);
        }
    }

    /// Draw the header bar: title on the left, clock and run status right.
    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let title = format!(" Ember - {} ", self.current_view.title());
        let title_len = title.len();
        let clock = chrono::Local::now().format("%H:%M:%S").to_string();

        let (status_text, status_color) = match self.session.run_state() {
            RunState::Running { agent_count } => {
                let elapsed = self
                    .session
                    .run_elapsed(Instant::now())
                    .unwrap_or(Duration::ZERO);
                (
                    format!(
                        "[running: {} agents, {}]",
                        agent_count,
                        humantime::format_duration(Duration::from_secs(elapsed.as_secs()))
                    ),
                    self.palette.status_busy,
                )
            }
            RunState::Failed { .. } => ("[run failed]".to_string(), self.palette.status_error),
            _ if self.session.is_watching() => {
                let offset = self.session.tail_offset().unwrap_or(0);
                (
                    format!("[watching: {} B]", offset),
                    self.palette.status_ok,
                )
            }
            RunState::Succeeded => ("[run complete]".to_string(), self.palette.status_ok),
            RunState::Idle => ("[idle]".to_string(), self.palette.text_dim),
        };

        let right_len = clock.len() + 2 + status_text.len();
        let spacing = area
            .width
            .saturating_sub(title_len as u16 + right_len as u16 + 2) as usize;

        let header = Paragraph::new(Line::from(vec![
            Span::styled(
                title,
                Style::default()
                    .fg(self.palette.header)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" ".repeat(spacing)),
            Span::styled(clock, Style::default().fg(self.palette.text_dim)),
            Span::raw("  "),
            Span::styled(status_text, Style::default().fg(status_color)),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.palette.border_dim)),
        );

        frame.render_widget(header, area);
    }

    /// Draw the main content area based on the current view.
    fn draw_content(&self, frame: &mut Frame, area: Rect) {
        match self.current_view {
            View::Stage => self.draw_stage(frame, area),
            View::Events => frame.render_widget(
                EventsPanel::new(self.session.event_feed(), self.session.stats()),
                area,
            ),
            View::Output => frame.render_widget(
                OutputPanel::new(self.session.output_feed(), self.session.run_state()),
                area,
            ),
        }
    }

    /// The stage view: canvas, plus an agent sidebar on wide terminals.
    fn draw_stage(&self, frame: &mut Frame, area: Rect) {
        let frames = self.session.scene.frames(Instant::now());
        let selected = self.selected_agent();

        if area.width >= SIDEBAR_MIN_WIDTH {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(50), Constraint::Length(36)])
                .split(area);
            frame.render_widget(
                StagePanel::new(&self.session.scene, &frames).selected(selected),
                columns[0],
            );
            frame.render_widget(
                AgentsPanel::new(self.session.agents(), self.session.traffic())
                    .selected(selected),
                columns[1],
            );
        } else {
            frame.render_widget(
                StagePanel::new(&self.session.scene, &frames).selected(selected),
                area,
            );
        }
    }

    /// Draw the footer: hotkey hints, with the status message as its title.
    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let hotkey_style = Style::default().fg(self.palette.hotkey);
        let hints = vec![
            Span::styled("[1]", hotkey_style),
            Span::raw("Stage "),
            Span::styled("[2]", hotkey_style),
            Span::raw("Events "),
            Span::styled("[3]", hotkey_style),
            Span::raw("Output "),
            Span::styled("[s]", hotkey_style),
            Span::raw("Run "),
            Span::styled("[w]", hotkey_style),
            Span::raw("Watch "),
            Span::styled("[d]", hotkey_style),
            Span::raw("Pulse "),
            Span::styled("[c]", hotkey_style),
            Span::raw("Clear "),
            Span::styled("[?]", hotkey_style),
            Span::raw("Help "),
            Span::styled("[q]", hotkey_style),
            Span::raw("Quit"),
        ];

        let title = self
            .status_message
            .clone()
            .unwrap_or_else(|| format!("{}x{}", area.width, area.height));

        let footer = Paragraph::new(Line::from(hints))
            .style(Style::default().fg(self.palette.text_dim))
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .title(Span::styled(
                        title,
                        Style::default().fg(self.palette.border_dim),
                    ))
                    .title_alignment(ratatui::layout::Alignment::Right),
            );

        frame.render_widget(footer, area);
    }

    /// Draw the agent count prompt as a centered overlay.
    fn draw_prompt_overlay(&self, frame: &mut Frame, area: Rect, buffer: &str) {
        let overlay_width = 44.min(area.width.saturating_sub(4));
        let overlay_height = 5.min(area.height.saturating_sub(4));
        let overlay_x = (area.width - overlay_width) / 2;
        let overlay_y = (area.height - overlay_height) / 2;
        let overlay_area = Rect::new(overlay_x, overlay_y, overlay_width, overlay_height);

        frame.render_widget(Clear, overlay_area);

        let lines = vec![
            Line::raw(format!(
                "Number of agents ({}-{}):",
                MIN_AGENT_COUNT, MAX_AGENT_COUNT
            )),
            Line::from(vec![
                Span::styled("> ", Style::default().fg(self.palette.hotkey)),
                Span::styled(
                    buffer.to_string(),
                    Style::default()
                        .fg(self.palette.text)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled("_", Style::default().fg(self.palette.highlight)),
            ]),
            Line::styled(
                "Up/Down adjust, Enter to start, Esc to cancel",
                Style::default().fg(self.palette.text_dim),
            ),
        ];

        let prompt = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.palette.header))
                .title(Span::styled(
                    " Start Run ",
                    Style::default()
                        .fg(self.palette.header)
                        .add_modifier(Modifier::BOLD),
                ))
                .style(Style::default().bg(Color::Black)),
        );

        frame.render_widget(prompt, overlay_area);
    }

    /// Draw the help overlay.
    fn draw_help_overlay(&self, frame: &mut Frame, area: Rect) {
        let overlay_width = 60.min(area.width.saturating_sub(4));
        let overlay_height = 22.min(area.height.saturating_sub(4));
        let overlay_x = (area.width - overlay_width) / 2;
        let overlay_y = (area.height - overlay_height) / 2;
        let overlay_area = Rect::new(overlay_x, overlay_y, overlay_width, overlay_height);

        frame.render_widget(Clear, overlay_area);

        let help_text = "\
Ember Hotkey Reference

Views:
  1         Stage (topology and animations)
  2         Events feed
  3         Generator output
  Tab       Cycle views forward
  Shift+Tab Cycle views backward

Actions:
  s         Start a run (prompts for agent count)
  w         Toggle event log watch
  d         Demo pulse from a random node
  c         Clear feeds
  Up/Down   Select an agent (sidebar and stage)

General:
  ?  h      Show this help
  Esc       Cancel / close
  q         Quit
  Ctrl+C    Force quit

Press Esc to close this help.";

        let help = Paragraph::new(help_text)
            .style(Style::default().fg(self.palette.text))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.palette.header))
                    .title(Span::styled(
                        " Help ",
                        Style::default()
                            .fg(self.palette.header)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .style(Style::default().bg(Color::Black)),
            );

        frame.render_widget(help, overlay_area);
    }
}
