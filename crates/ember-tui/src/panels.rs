//! Feed and agent list panels.
//!
//! Plain scrolling panels around the stage: the decoded event feed, the
//! generator's live output, and the agent roster from the current manifest.
//! Each renders the tail of its feed so the newest entries are always
//! visible without scroll state.

use std::collections::{HashMap, VecDeque};

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use ember_core::types::AgentDescriptor;
use ember_run::{OutputLine, OutputStream};

use crate::session::{AgentTraffic, DispatchStats, RunState};
use crate::theme::Palette;

/// The decoded event feed with dispatch counters.
pub struct EventsPanel<'a> {
    feed: &'a VecDeque<String>,
    stats: DispatchStats,
    palette: Palette,
}

impl<'a> EventsPanel<'a> {
    pub fn new(feed: &'a VecDeque<String>, stats: DispatchStats) -> Self {
        Self {
            feed,
            stats,
            palette: Palette::default(),
        }
    }
}

impl Widget for EventsPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.palette.border_dim))
            .title(Span::styled(
                format!(" Events ({}) ", self.stats.records),
                Style::default().fg(self.palette.text),
            ));
        let inner = block.inner(area);
        block.render(area, buf);

        if self.feed.is_empty() {
            Paragraph::new("No events yet. They stream here while the log is tailed.")
                .style(Style::default().fg(self.palette.text_dim))
                .render(inner, buf);
            return;
        }

        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    format!("{} queries", self.stats.queries),
                    Style::default().fg(self.palette.node_emit),
                ),
                Span::raw("   "),
                Span::styled(
                    format!("{} responses", self.stats.responses),
                    Style::default().fg(self.palette.hub_emit),
                ),
                Span::raw("   "),
                Span::styled(
                    format!("{} ignored", self.stats.discarded),
                    Style::default().fg(self.palette.text_dim),
                ),
                Span::raw("   "),
                Span::styled(
                    format!("{} raw", self.stats.raw),
                    Style::default().fg(self.palette.text_dim),
                ),
                Span::raw("   "),
                Span::styled(
                    format!("{} batches", self.stats.batches),
                    Style::default().fg(self.palette.text_dim),
                ),
            ]),
            Line::raw(""),
        ];

        let budget = (inner.height as usize).saturating_sub(lines.len());
        let skip = self.feed.len().saturating_sub(budget);
        for entry in self.feed.iter().skip(skip) {
            lines.push(Line::styled(
                entry.clone(),
                Style::default().fg(self.palette.text),
            ));
        }

        Paragraph::new(lines).render(inner, buf);
    }
}

/// Live generator output with the run status on top.
pub struct OutputPanel<'a> {
    feed: &'a VecDeque<OutputLine>,
    state: &'a RunState,
    palette: Palette,
}

impl<'a> OutputPanel<'a> {
    pub fn new(feed: &'a VecDeque<OutputLine>, state: &'a RunState) -> Self {
        Self {
            feed,
            state,
            palette: Palette::default(),
        }
    }
}

impl Widget for OutputPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.palette.border_dim))
            .title(Span::styled(
                " Generator Output ",
                Style::default().fg(self.palette.text),
            ));
        let inner = block.inner(area);
        block.render(area, buf);

        let (status, color) = match self.state {
            RunState::Idle => (
                "No run yet. Press [s] to start.".to_string(),
                self.palette.text_dim,
            ),
            RunState::Running { agent_count } => (
                format!("Generating with {} agents...", agent_count),
                self.palette.status_busy,
            ),
            RunState::Succeeded => (
                "Generation complete. Tailing the event log.".to_string(),
                self.palette.status_ok,
            ),
            RunState::Failed { message } => (
                format!("Run failed: {}", message),
                self.palette.status_error,
            ),
        };

        let mut lines = vec![
            Line::styled(status, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Line::raw(""),
        ];

        let budget = (inner.height as usize).saturating_sub(lines.len());
        let skip = self.feed.len().saturating_sub(budget);
        for entry in self.feed.iter().skip(skip) {
            let style = match entry.stream {
                OutputStream::Stdout => Style::default().fg(self.palette.text),
                OutputStream::Stderr => Style::default().fg(self.palette.status_error),
            };
            lines.push(Line::styled(entry.line.clone(), style));
        }

        Paragraph::new(lines).render(inner, buf);
    }
}

/// The agent roster from the current run's manifest.
///
/// Rows carry the manifest fields plus the live sent/received counters; an
/// optional selection highlights one row in step with the stage.
pub struct AgentsPanel<'a> {
    agents: &'a [AgentDescriptor],
    traffic: &'a HashMap<String, AgentTraffic>,
    selected: Option<usize>,
    palette: Palette,
}

impl<'a> AgentsPanel<'a> {
    pub fn new(agents: &'a [AgentDescriptor], traffic: &'a HashMap<String, AgentTraffic>) -> Self {
        Self {
            agents,
            traffic,
            selected: None,
            palette: Palette::default(),
        }
    }

    /// Highlight the row at the given index.
    pub fn selected(mut self, selected: Option<usize>) -> Self {
        self.selected = selected;
        self
    }
}

impl Widget for AgentsPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.palette.border_dim))
            .title(Span::styled(
                format!(" Agents ({}) ", self.agents.len()),
                Style::default().fg(self.palette.text),
            ));
        let inner = block.inner(area);
        block.render(area, buf);

        if self.agents.is_empty() {
            Paragraph::new("No agents. A successful run fills this list.")
                .style(Style::default().fg(self.palette.text_dim))
                .render(inner, buf);
            return;
        }

        let mut lines = vec![Line::styled(
            format!("{:<12} {:<9} {:>3} {:>4} {:>4}", "ID", "PERSONA", "Q", "SENT", "RECV"),
            Style::default()
                .fg(self.palette.text_dim)
                .add_modifier(Modifier::BOLD),
        )];

        let budget = (inner.height as usize).saturating_sub(lines.len());
        for (index, agent) in self.agents.iter().take(budget).enumerate() {
            let persona = if agent.persona.is_empty() {
                "-"
            } else {
                agent.persona.as_str()
            };
            let traffic = self
                .traffic
                .get(&agent.agent_id)
                .copied()
                .unwrap_or_default();
            let style = if self.selected == Some(index) {
                Style::default()
                    .fg(self.palette.highlight)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.palette.text)
            };
            lines.push(Line::styled(
                format!(
                    "{:<12} {:<9} {:>3} {:>4} {:>4}",
                    agent.agent_id, persona, agent.query_count, traffic.sent, traffic.received
                ),
                style,
            ));
        }
        if self.agents.len() > budget {
            lines.push(Line::styled(
                format!("... and {} more", self.agents.len() - budget),
                Style::default().fg(self.palette.text_dim),
            ));
        }

        Paragraph::new(lines).render(inner, buf);
    }
}
