//! Color palette for the Ember dashboard.
//!
//! The stage colors follow the Firestorm convention: queries leave a node in
//! orange and arrive at the hub in blue, responses leave the hub in purple
//! and arrive at a node in green.

use ember_core::topology::ActorId;
use ratatui::style::Color;

/// Fixed color palette.
#[derive(Debug, Clone)]
pub struct Palette {
    /// Primary headers and focused borders
    pub header: Color,
    /// Hotkey hints
    pub hotkey: Color,
    /// Normal text
    pub text: Color,
    /// Secondary text (timestamps, dim info)
    pub text_dim: Color,
    /// Unfocused borders
    pub border_dim: Color,
    /// Status: success
    pub status_ok: Color,
    /// Status: in progress
    pub status_busy: Color,
    /// Status: error
    pub status_error: Color,
    /// Hub body and label
    pub hub: Color,
    /// Node body and label
    pub node: Color,
    /// Selection and ring highlight
    pub highlight: Color,
    /// Spoke lines between hub and nodes
    pub wire: Color,
    /// Emit flash on a node (query leaving)
    pub node_emit: Color,
    /// Accept flash on a node (response arriving)
    pub node_accept: Color,
    /// Emit flash on the hub (response leaving)
    pub hub_emit: Color,
    /// Accept flash on the hub (query arriving)
    pub hub_accept: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            header: Color::Cyan,
            hotkey: Color::Yellow,
            text: Color::White,
            text_dim: Color::Gray,
            border_dim: Color::DarkGray,
            status_ok: Color::Green,
            status_busy: Color::Yellow,
            status_error: Color::Red,
            hub: Color::Rgb(60, 210, 165),
            node: Color::White,
            highlight: Color::Rgb(60, 210, 165),
            wire: Color::DarkGray,
            node_emit: Color::Rgb(255, 165, 0),
            node_accept: Color::Rgb(0, 255, 0),
            hub_emit: Color::Rgb(128, 0, 128),
            hub_accept: Color::Rgb(0, 0, 255),
        }
    }
}

impl Palette {
    /// Flash color for an actor emitting.
    pub fn emit_color(&self, actor: ActorId) -> Color {
        match actor {
            ActorId::Hub => self.hub_emit,
            ActorId::Node(_) => self.node_emit,
        }
    }

    /// Flash color for an actor accepting.
    pub fn accept_color(&self, actor: ActorId) -> Color {
        match actor {
            ActorId::Hub => self.hub_accept,
            ActorId::Node(_) => self.node_accept,
        }
    }

    /// Particle color, taken from the emitting actor.
    pub fn particle_color(&self, source: ActorId) -> Color {
        self.emit_color(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_colors_follow_firestorm_convention() {
        let palette = Palette::default();

        assert_eq!(palette.emit_color(ActorId::Node(0)), palette.node_emit);
        assert_eq!(palette.emit_color(ActorId::Hub), palette.hub_emit);
        assert_eq!(palette.accept_color(ActorId::Node(3)), palette.node_accept);
        assert_eq!(palette.accept_color(ActorId::Hub), palette.hub_accept);
    }

    #[test]
    fn test_particle_takes_source_color() {
        let palette = Palette::default();

        assert_eq!(
            palette.particle_color(ActorId::Node(1)),
            palette.node_emit
        );
        assert_eq!(palette.particle_color(ActorId::Hub), palette.hub_emit);
    }
}
