//! The drawing surface seam.
//!
//! [`DisplayScheduler`](crate::scheduler::DisplayScheduler) decides what goes
//! where and when; a [`Renderer`] puts it on screen.

use std::time::Duration;

use crate::grid::Placement;

/// Animation parameters for a doodle entering the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entrance {
    /// Wait before the entrance animation starts.
    pub delay: Duration,
    /// Phase into the float loop, applied as a negative animation delay.
    pub float_offset: Duration,
}

pub trait Renderer: Send {
    /// Show `uri` full-screen.
    fn show_preview(&mut self, uri: &str);

    /// Take down the full-screen preview of `uri`.
    fn hide_preview(&mut self, uri: &str);

    /// Draw a new grid occupant.
    fn place(&mut self, placement: &Placement, entrance: Entrance);

    /// Remove an evicted or cleared occupant.
    fn remove(&mut self, placement: &Placement);

    /// Move an occupant to its new cell after a viewport change.
    fn relocate(&mut self, placement: &Placement);

    /// Trigger the enter transition. Called once per placement.
    fn reveal(&mut self, placement: &Placement);
}

/// Renderer that only logs. Used by the headless display binary.
#[derive(Debug, Default)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn show_preview(&mut self, uri: &str) {
        tracing::info!(uri, "Preview shown");
    }

    fn hide_preview(&mut self, uri: &str) {
        tracing::debug!(uri, "Preview hidden");
    }

    fn place(&mut self, placement: &Placement, entrance: Entrance) {
        tracing::info!(
            id = placement.id,
            uri = %placement.uri,
            x = placement.cell.x,
            y = placement.cell.y,
            delay_ms = entrance.delay.as_millis() as u64,
            float_offset_ms = entrance.float_offset.as_millis() as u64,
            "Doodle placed"
        );
    }

    fn remove(&mut self, placement: &Placement) {
        tracing::info!(id = placement.id, uri = %placement.uri, "Doodle removed");
    }

    fn relocate(&mut self, placement: &Placement) {
        tracing::debug!(
            id = placement.id,
            x = placement.cell.x,
            y = placement.cell.y,
            "Doodle relocated"
        );
    }

    fn reveal(&mut self, placement: &Placement) {
        tracing::debug!(id = placement.id, "Doodle visible");
    }
}
