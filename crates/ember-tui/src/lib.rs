//! Terminal UI for Ember.
//!
//! This crate provides the Ratatui-based terminal interface for Ember.
//!
//! ## Features
//!
//! - Hub-and-spoke stage with animated query/response traffic
//! - Live event feed tailed from the generator's log
//! - Generator output capture with run status
//! - Agent roster from the run manifest
//!
//! ## Hotkeys
//!
//! - `1` - Stage view
//! - `2` - Events view
//! - `3` - Output view
//! - `s` - Start a run
//! - `w` - Toggle event log watch
//! - `d` - Demo pulse
//! - `c` - Clear feeds
//! - `?` or `h` - Help
//! - `q` - Quit
//! - `Tab` - Cycle views
//! - `Esc` - Cancel/back

pub mod app;
pub mod event;
pub mod flow;
pub mod panels;
pub mod scene;
pub mod session;
pub mod stage;
pub mod theme;
pub mod view;

pub use app::{App, AppResult};
pub use scene::{ActorHandle, DispatchOutcome, Scene};
pub use session::{RunState, Session};
pub use view::View;
