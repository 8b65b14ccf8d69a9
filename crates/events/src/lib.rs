//! Doodle event bus.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DoodleEvent`] -- the event envelope published once per accepted
//!   submission.

pub mod bus;

pub use bus::{DoodleEvent, EventBus};
