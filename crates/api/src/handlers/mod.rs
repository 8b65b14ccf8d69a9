//! Request handlers.
//!
//! Handlers read from [`AppState`](crate::state::AppState) and map errors
//! via [`AppError`](crate::error::AppError).

pub mod doodles;
