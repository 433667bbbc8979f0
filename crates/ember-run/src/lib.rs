//! # ember-run
//!
//! Run orchestration for the Ember dashboard: invoking the Firestorm test
//! generator and shepherding a run from launch through manifest load to a
//! live event tail.
//!
//! This crate provides:
//! - [`generator`] - Generator process invocation with streamed output
//! - [`controller`] - The one-run-at-a-time lifecycle driver
//!
//! ## Example
//!
//! ```no_run
//! use ember_core::AppConfig;
//! use ember_run::{RunController, RunNotice};
//!
//! let controller = RunController::new(AppConfig::default());
//! let mut notices = controller.start_run(5)?;
//!
//! while let Some(notice) = notices.blocking_recv() {
//!     match notice {
//!         RunNotice::Succeeded(assets) => {
//!             println!("{} agents ready", assets.agents.len());
//!             break;
//!         }
//!         RunNotice::Failed { message } => {
//!             eprintln!("run failed: {}", message);
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok::<(), ember_core::EmberError>(())
//! ```

pub mod controller;
pub mod generator;

// Re-export main types for convenience
pub use controller::{RunAssets, RunController, RunNotice};
pub use generator::{OutputLine, OutputStream, SUCCESS_MARKER, run_generator};
