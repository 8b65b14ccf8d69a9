//! Full-screen preview sequencer.
//!
//! Incoming doodles are queued and shown one at a time, strictly in arrival
//! order. The queue itself has no clock: the caller starts the dwell timer
//! when a doodle begins showing and calls [`PreviewQueue::finish`] when it
//! expires.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Showing(String),
}

/// Result of ending the current preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    /// The doodle whose dwell just ended; it goes to the grid next.
    pub done: String,
    /// The doodle that started showing in its place, if any were waiting.
    pub next: Option<String>,
}

#[derive(Debug, Default)]
pub struct PreviewQueue {
    pending: VecDeque<String>,
    showing: Option<String>,
}

impl PreviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PreviewState {
        match &self.showing {
            Some(uri) => PreviewState::Showing(uri.clone()),
            None => PreviewState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.showing.is_none()
    }

    /// Doodles waiting behind the one currently shown.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queue `uri` for preview.
    ///
    /// Returns `Some(uri)` when the queue was idle and the doodle starts
    /// showing immediately, `None` when it has to wait its turn.
    pub fn enqueue(&mut self, uri: impl Into<String>) -> Option<String> {
        let uri = uri.into();
        if self.showing.is_some() {
            self.pending.push_back(uri);
            return None;
        }
        self.showing = Some(uri.clone());
        Some(uri)
    }

    /// End the current preview and advance to the next queued doodle.
    ///
    /// Returns `None` if nothing was showing.
    pub fn finish(&mut self) -> Option<Finished> {
        let done = self.showing.take()?;
        self.showing = self.pending.pop_front();
        Some(Finished {
            done,
            next: self.showing.clone(),
        })
    }

    /// Drop everything, including the doodle on screen.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.showing = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_enqueue_starts_showing() {
        let mut q = PreviewQueue::new();

        assert_eq!(q.enqueue("a"), Some("a".to_string()));
        assert_eq!(q.state(), PreviewState::Showing("a".into()));
    }

    #[test]
    fn enqueue_while_showing_waits() {
        let mut q = PreviewQueue::new();
        q.enqueue("a");

        assert_eq!(q.enqueue("b"), None);
        assert_eq!(q.pending(), 1);
        assert_eq!(q.state(), PreviewState::Showing("a".into()));
    }

    #[test]
    fn burst_drains_in_fifo_order_one_at_a_time() {
        let mut q = PreviewQueue::new();
        for uri in ["a", "b", "c", "d"] {
            q.enqueue(uri);
        }

        let mut shown = Vec::new();
        while let Some(step) = q.finish() {
            shown.push(step.done);
        }

        assert_eq!(shown, vec!["a", "b", "c", "d"]);
        assert!(q.is_idle());
    }

    #[test]
    fn finish_reports_the_next_head() {
        let mut q = PreviewQueue::new();
        q.enqueue("a");
        q.enqueue("b");

        assert_eq!(
            q.finish(),
            Some(Finished {
                done: "a".into(),
                next: Some("b".into())
            })
        );
        assert_eq!(
            q.finish(),
            Some(Finished {
                done: "b".into(),
                next: None
            })
        );
        assert_eq!(q.finish(), None);
    }

    #[test]
    fn enqueue_after_drain_restarts() {
        let mut q = PreviewQueue::new();
        q.enqueue("a");
        q.finish();

        assert_eq!(q.enqueue("b"), Some("b".to_string()));
    }
}
