//! Display Scheduler: drives the preview queue and grid placer for one
//! display client.
//!
//! All state is owned by a single task. Commands arrive over an mpsc
//! channel; the only timer is the preview dwell.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::grid::{float_offset, GridConfig, GridPlacer, PlacementId, Viewport};
use crate::preview::PreviewQueue;
use crate::render::{Entrance, Renderer};

/// How long each doodle stays full-screen by default.
pub const DEFAULT_DWELL: Duration = Duration::from_secs(2);

/// Entrance delay step between snapshot doodles.
pub const SEED_STAGGER: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCommand {
    /// A `new_doodle` broadcast.
    NewDoodle(String),
    /// A `latest-doodles` snapshot, newest first. Replaces the grid.
    Snapshot(Vec<String>),
    Resize(Viewport),
    /// Clear the grid.
    Reset,
    /// The renderer measured how much of a placement is on screen.
    Visibility { id: PlacementId, ratio: f64 },
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub grid: GridConfig,
    pub viewport: Viewport,
    pub dwell: Duration,
}

pub struct DisplayScheduler<R> {
    preview: PreviewQueue,
    grid: GridPlacer,
    renderer: R,
    dwell: Duration,
    /// When the doodle on screen should go to the grid.
    deadline: Option<Instant>,
}

impl<R: Renderer> DisplayScheduler<R> {
    pub fn new(config: SchedulerConfig, renderer: R) -> Self {
        Self::with_grid(GridPlacer::new(config.grid, config.viewport), config.dwell, renderer)
    }

    pub fn with_grid(grid: GridPlacer, dwell: Duration, renderer: R) -> Self {
        Self {
            preview: PreviewQueue::new(),
            grid,
            renderer,
            dwell,
            deadline: None,
        }
    }

    pub fn grid(&self) -> &GridPlacer {
        &self.grid
    }

    pub fn preview(&self) -> &PreviewQueue {
        &self.preview
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// When the current preview ends, if one is showing.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn handle(&mut self, command: DisplayCommand) {
        match command {
            DisplayCommand::NewDoodle(uri) => self.enqueue(uri),
            DisplayCommand::Snapshot(uris) => self.seed(uris),
            DisplayCommand::Resize(viewport) => self.resize(viewport),
            DisplayCommand::Reset => self.reset(),
            DisplayCommand::Visibility { id, ratio } => {
                if self.grid.mark_visible(id, ratio) {
                    if let Some(placement) = self.grid.get(id) {
                        self.renderer.reveal(placement);
                    }
                }
            }
        }
    }

    /// Queue a broadcast doodle for full-screen preview.
    pub fn enqueue(&mut self, uri: String) {
        if let Some(uri) = self.preview.enqueue(uri) {
            self.start_preview(&uri);
        } else {
            tracing::debug!(pending = self.preview.pending(), "Preview queued");
        }
    }

    /// The dwell timer for the current preview expired.
    ///
    /// Moves the doodle to the grid and starts the next preview, if any.
    pub fn dwell_elapsed(&mut self) {
        self.deadline = None;
        let Some(finished) = self.preview.finish() else {
            return;
        };

        self.renderer.hide_preview(&finished.done);
        self.place(finished.done, Duration::ZERO);

        if let Some(next) = finished.next {
            self.start_preview(&next);
        }
    }

    /// Replace the grid with a snapshot, newest first.
    ///
    /// The oldest doodle is placed first so eviction order stays correct;
    /// entrance delays are staggered from the newest.
    pub fn seed(&mut self, uris: Vec<String>) {
        for placement in self.grid.reset() {
            self.renderer.remove(&placement);
        }

        let count = uris.len();
        for (index, uri) in uris.into_iter().enumerate().rev() {
            self.place(uri, SEED_STAGGER * index as u32);
        }
        tracing::info!(count, occupied = self.grid.len(), "Grid seeded from snapshot");
    }

    pub fn resize(&mut self, viewport: Viewport) {
        let reflow = self.grid.resize(viewport);
        for placement in &reflow.evicted {
            self.renderer.remove(placement);
        }
        for placement in &reflow.moved {
            self.renderer.relocate(placement);
        }
        self.reveal_visible();
    }

    pub fn reset(&mut self) {
        let cleared = self.grid.reset();
        tracing::info!(cleared = cleared.len(), "Grid reset");
        for placement in &cleared {
            self.renderer.remove(placement);
        }
    }

    /// Process commands until the channel closes, firing dwell timers as
    /// they come due. Returns the renderer.
    pub async fn run(mut self, mut commands: mpsc::Receiver<DisplayCommand>) -> R {
        loop {
            let deadline = self.deadline;
            let dwell = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                () = dwell => self.dwell_elapsed(),
            }
        }

        tracing::debug!("Display scheduler stopped");
        self.renderer
    }

    fn start_preview(&mut self, uri: &str) {
        self.renderer.show_preview(uri);
        self.deadline = Some(Instant::now() + self.dwell);
    }

    fn place(&mut self, uri: String, delay: Duration) {
        let placed = self.grid.place(uri);
        for evicted in &placed.evicted {
            self.renderer.remove(evicted);
        }

        let entrance = Entrance {
            delay,
            float_offset: float_offset(wall_clock()),
        };
        self.renderer.place(&placed.placement, entrance);
        self.reveal_visible();
    }

    fn reveal_visible(&mut self) {
        for placement in self.grid.observe_visibility() {
            self.renderer.reveal(&placement);
        }
    }
}

fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
