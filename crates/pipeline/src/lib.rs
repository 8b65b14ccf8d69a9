//! Submission pipeline: data-URI decoding, image normalization, and the
//! commit step that appends to the doodle store and publishes the event.
//!
//! - [`normalizer`] -- decode, resize, re-encode, persist.
//! - [`settings_source`] -- where normalization settings are read from.
//! - [`scan`] -- startup scan of the doodle directory.
//! - [`submission`] -- the per-submission state machine.

pub mod normalizer;
pub mod scan;
pub mod settings_source;
pub mod submission;

pub use normalizer::{ImageNormalizer, NormalizeError, Normalized, Normalizer};
pub use settings_source::{FixedSettings, JsonFileSettings, SettingsSource};
pub use submission::{Submission, SubmissionError, SubmissionPipeline};
