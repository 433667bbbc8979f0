//! View types and navigation for the Ember dashboard.
//!
//! Views represent the different screens available in the dashboard.

use std::fmt;

/// Available views in the Ember dashboard.
///
/// Each view is a distinct screen with its own content. Views are switched
/// with number hotkeys or cycled with Tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// The animated topology stage
    #[default]
    Stage,
    /// Decoded event feed from the tailed log
    Events,
    /// Live generator output
    Output,
}

impl View {
    /// Returns the hotkey character for this view.
    pub fn hotkey(&self) -> char {
        match self {
            View::Stage => '1',
            View::Events => '2',
            View::Output => '3',
        }
    }

    /// Returns the display title for this view.
    pub fn title(&self) -> &'static str {
        match self {
            View::Stage => "Stage",
            View::Events => "Events",
            View::Output => "Output",
        }
    }

    /// All views in display order (for Tab cycling).
    pub const ALL: [View; 3] = [View::Stage, View::Events, View::Output];

    /// Returns the next view in the cycle (for Tab navigation).
    pub fn next(&self) -> View {
        let idx = Self::ALL.iter().position(|v| v == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Returns the previous view in the cycle (for Shift+Tab navigation).
    pub fn prev(&self) -> View {
        let idx = Self::ALL.iter().position(|v| v == self).unwrap_or(0);
        if idx == 0 {
            Self::ALL[Self::ALL.len() - 1]
        } else {
            Self::ALL[idx - 1]
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}
