//! Display client for the doodle wall.
//!
//! - [`preview`] -- full-screen preview sequencer.
//! - [`grid`] -- non-overlapping grid placement with bounded capacity.
//! - [`scheduler`] -- single-task driver combining the two.
//! - [`render`] -- the drawing surface seam.
//! - [`client`] -- hub WebSocket + snapshot fetch with reconnect.

pub mod client;
pub mod config;
pub mod controls;
pub mod grid;
pub mod preview;
pub mod reconnect;
pub mod render;
pub mod scheduler;

pub use grid::{Cell, GridConfig, GridPlacer, Placement, Viewport};
pub use preview::{PreviewQueue, PreviewState};
pub use render::{Entrance, Renderer, TracingRenderer};
pub use scheduler::{DisplayCommand, DisplayScheduler, SchedulerConfig};
