//! The stage: ring topology and animation frames on a braille canvas.
//!
//! Renders the hub at the center, agent nodes on their ring slots, the
//! connection wires between them, and whatever [`FlowFrame`]s the animator
//! sampled for this instant. Flashes override an actor's circle color and
//! swell its radius; particles are small colored dots along the wire.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Style},
    symbols::Marker,
    text::Line,
    widgets::{
        Block, Borders, Paragraph, Widget,
        canvas::{Canvas, Circle, Context, Line as Wire},
    },
};

use ember_core::topology::ActorId;

use crate::flow::FlowFrame;
use crate::scene::Scene;
use crate::theme::Palette;

/// Canvas margin beyond the ring, in stage units. Leaves room for labels.
const STAGE_MARGIN: f64 = 60.0;

/// Hub circle radius, in stage units.
const HUB_RADIUS: f64 = 20.0;

/// Node circle radius, in stage units.
const NODE_RADIUS: f64 = 12.0;

/// Extra radius a flash adds at full intensity, decaying to zero.
const FLASH_SWELL: f64 = 6.0;

/// Particle dot radius, in stage units.
const PARTICLE_RADIUS: f64 = 2.5;

const HUB_LABEL: &str = "FIRESTORM";

/// The topology view with live animation overlays.
pub struct StagePanel<'a> {
    scene: &'a Scene,
    frames: &'a [FlowFrame],
    selected: Option<usize>,
    palette: Palette,
}

impl<'a> StagePanel<'a> {
    pub fn new(scene: &'a Scene, frames: &'a [FlowFrame]) -> Self {
        Self {
            scene,
            frames,
            selected: None,
            palette: Palette::default(),
        }
    }

    /// Highlight the node at the given slot index, in step with the agent
    /// panel's selection.
    pub fn selected(mut self, selected: Option<usize>) -> Self {
        self.selected = selected;
        self
    }

    /// Body color and radius swell for the node at `index`.
    ///
    /// A flash wins over the selection highlight, which wins over idle.
    fn node_paint(&self, index: usize) -> (Color, f64) {
        if let Some(flash) = self.flash_for(ActorId::Node(index)) {
            return flash;
        }
        if self.selected == Some(index) {
            return (self.palette.highlight, 0.0);
        }
        (self.palette.node, 0.0)
    }

    /// The color and radius swell of the most recent flash on `actor`.
    fn flash_for(&self, actor: ActorId) -> Option<(Color, f64)> {
        let mut found = None;
        for frame in self.frames {
            match *frame {
                FlowFrame::EmitFlash {
                    actor: a, progress, ..
                } if a == actor => {
                    found = Some((self.palette.emit_color(actor), swell(progress)));
                }
                FlowFrame::AcceptFlash {
                    actor: a, progress, ..
                } if a == actor => {
                    found = Some((self.palette.accept_color(actor), swell(progress)));
                }
                _ => {}
            }
        }
        found
    }

    fn paint(&self, ctx: &mut Context<'_>) {
        let topology = self.scene.topology();

        for (from, to) in topology.connection_lines() {
            ctx.draw(&Wire {
                x1: from.x,
                y1: from.y,
                x2: to.x,
                y2: to.y,
                color: self.palette.wire,
            });
        }

        // Fresh layer so circles do not merge braille dots with the wires
        ctx.layer();

        let (hub_color, hub_swell) = self
            .flash_for(ActorId::Hub)
            .unwrap_or((self.palette.hub, 0.0));
        ctx.draw(&Circle {
            x: 0.0,
            y: 0.0,
            radius: HUB_RADIUS + hub_swell,
            color: hub_color,
        });

        for (i, slot) in topology.slots().iter().enumerate() {
            let (color, extra) = self.node_paint(i);
            ctx.draw(&Circle {
                x: slot.position.x,
                y: slot.position.y,
                radius: NODE_RADIUS + extra,
                color,
            });
        }

        for frame in self.frames {
            if let FlowFrame::Particle { source, at } = *frame {
                ctx.draw(&Circle {
                    x: at.x,
                    y: at.y,
                    radius: PARTICLE_RADIUS,
                    color: self.palette.particle_color(source),
                });
            }
        }

        ctx.layer();

        ctx.print(
            -24.0,
            0.0,
            Line::styled(HUB_LABEL, Style::default().fg(self.palette.hub)),
        );
        for (i, slot) in topology.slots().iter().enumerate() {
            let label_color = if self.selected == Some(i) {
                self.palette.highlight
            } else {
                self.palette.text_dim
            };
            ctx.print(
                slot.position.x - 18.0,
                slot.position.y - NODE_RADIUS - 10.0,
                Line::styled(slot.agent_id.clone(), Style::default().fg(label_color)),
            );
        }
    }
}

fn swell(progress: f64) -> f64 {
    FLASH_SWELL * (1.0 - progress.clamp(0.0, 1.0))
}

impl Widget for StagePanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.palette.border_dim))
            .title(" Stage ");

        if !self.scene.has_topology() {
            let placeholder = Paragraph::new(vec![
                Line::raw(""),
                Line::styled("No topology", Style::default().fg(self.palette.text_dim)),
                Line::styled(
                    "Press [s] to start a run",
                    Style::default().fg(self.palette.text_dim),
                ),
            ])
            .alignment(Alignment::Center)
            .block(block);
            placeholder.render(area, buf);
            return;
        }

        let bound = self.scene.topology().radius() + STAGE_MARGIN;
        Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds([-bound, bound])
            .y_bounds([-bound, bound])
            .paint(|ctx| self.paint(ctx))
            .render(area, buf);
    }
}
