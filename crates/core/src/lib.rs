//! Domain types shared by the doodle hub and the display clients.
//!
//! - [`doodle`] -- the immutable [`Doodle`](doodle::Doodle) record and its
//!   orderable [`DoodleId`](doodle::DoodleId).
//! - [`store`] -- the ordered, newest-first history of accepted doodles.
//! - [`naming`] -- persisted filename convention and its parser.
//! - [`protocol`] -- WebSocket event envelopes exchanged with clients.
//! - [`settings`] -- normalization settings and their defaults.

pub mod doodle;
pub mod error;
pub mod naming;
pub mod protocol;
pub mod settings;
pub mod store;
pub mod types;
