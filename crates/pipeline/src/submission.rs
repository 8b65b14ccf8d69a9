//! Per-submission state machine.
//!
//! ```text
//! Received --(data-URI decode)--> Normalizing --(normalizer)--> Accepted
//!     |                                |
//!     +--------------------------------+------------------------> Rejected
//! ```
//!
//! Many submissions may be `Normalizing` at once. The commit step (id
//! allocation, final file name, store insert, event publish) is serialized,
//! so the broadcast order, the store order and the on-disk name order all
//! agree: normalization-completion order rather than arrival order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use doodlewall_core::doodle::{Doodle, DoodleId};
use doodlewall_core::store::DoodleStore;
use doodlewall_core::types::Timestamp;
use doodlewall_events::{DoodleEvent, EventBus};
use tokio::sync::Mutex;

/// Upper bound on final-name collisions before a commit gives up.
const MAX_NAME_ATTEMPTS: u32 = 64;

use crate::normalizer::{NormalizeError, Normalized, Normalizer};
use crate::settings_source::SettingsSource;

/// A raw drawing waiting to be normalized. Not retained after processing.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Transport-encoded raster, e.g. `data:image/png;base64,...`.
    pub image: String,
    pub received_at: Timestamp,
}

impl Submission {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Received,
    Normalizing,
    Accepted,
    Rejected,
}

impl SubmissionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStage::Received => "received",
            SubmissionStage::Normalizing => "normalizing",
            SubmissionStage::Accepted => "accepted",
            SubmissionStage::Rejected => "rejected",
        }
    }
}

/// Why a submission was rejected. Reported to the submitter only.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The payload envelope is malformed (missing or invalid data-URI prefix).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The payload could not be decoded into an image.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The normalized image could not be persisted.
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubmissionError {
    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SubmissionError::Protocol(_) => "protocol",
            SubmissionError::Decode(_) => "decode",
            SubmissionError::Io(_) => "io",
            SubmissionError::Internal(_) => "internal",
        }
    }

    /// Message sent back in the `save_error` event. Server-side details
    /// such as file paths are not exposed.
    pub fn client_message(&self) -> String {
        match self {
            SubmissionError::Protocol(msg) => format!("Malformed submission: {msg}"),
            SubmissionError::Decode(msg) => format!("Could not decode image: {msg}"),
            SubmissionError::Io(_) | SubmissionError::Internal(_) => {
                "Failed to save doodle.".to_string()
            }
        }
    }
}

impl From<NormalizeError> for SubmissionError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Decode(msg) => SubmissionError::Decode(msg),
            NormalizeError::Io(msg) => SubmissionError::Io(msg),
            NormalizeError::InvalidSettings(msg) => SubmissionError::Internal(msg),
            NormalizeError::NameTaken(name) => {
                SubmissionError::Io(format!("no free name after {name}"))
            }
        }
    }
}

/// Decode a `data:image/<type>;base64,<payload>` string into raw bytes.
pub fn decode_data_uri(payload: &str) -> Result<Vec<u8>, SubmissionError> {
    let (header, data) = payload
        .trim()
        .split_once(',')
        .ok_or_else(|| SubmissionError::Protocol("missing ',' after data-URI header".into()))?;

    let media = header
        .strip_prefix("data:")
        .ok_or_else(|| SubmissionError::Protocol("missing 'data:' prefix".into()))?;

    let mime = media
        .strip_suffix(";base64")
        .ok_or_else(|| SubmissionError::Protocol("payload is not base64-encoded".into()))?;

    if !mime.starts_with("image/") {
        return Err(SubmissionError::Protocol(format!(
            "expected an image/* media type, got '{mime}'"
        )));
    }

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| SubmissionError::Decode(format!("invalid base64: {e}")))?;

    if bytes.is_empty() {
        return Err(SubmissionError::Decode("empty image payload".into()));
    }
    Ok(bytes)
}

/// Decrements the in-flight counter when a submission leaves `Normalizing`.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The only writer of the [`DoodleStore`].
pub struct SubmissionPipeline {
    store: Arc<DoodleStore>,
    event_bus: Arc<EventBus>,
    normalizer: Arc<dyn Normalizer>,
    settings: Arc<dyn SettingsSource>,
    /// Serializes id allocation, final naming, insert and publish.
    commit_lock: Mutex<()>,
    in_flight: AtomicUsize,
}

impl SubmissionPipeline {
    pub fn new(
        store: Arc<DoodleStore>,
        event_bus: Arc<EventBus>,
        normalizer: Arc<dyn Normalizer>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            store,
            event_bus,
            normalizer,
            settings,
            commit_lock: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Number of submissions currently being normalized.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run one submission to completion.
    ///
    /// On success the image sits under its final name, the doodle has been
    /// inserted into the store and exactly one [`DoodleEvent::Accepted`] has
    /// been published. On failure none of that happened.
    pub async fn submit(&self, submission: Submission) -> Result<Doodle, SubmissionError> {
        let submission_id = uuid::Uuid::new_v4();
        tracing::debug!(
            %submission_id,
            stage = SubmissionStage::Received.as_str(),
            bytes = submission.image.len(),
            "Submission received"
        );

        let result = self.process(submission_id, &submission).await;

        match &result {
            Ok(doodle) => tracing::info!(
                %submission_id,
                stage = SubmissionStage::Accepted.as_str(),
                doodle_id = %doodle.id,
                uri = %doodle.uri,
                queued_ms = (doodle.created_at - submission.received_at).num_milliseconds(),
                "Submission accepted"
            ),
            Err(e) => tracing::warn!(
                %submission_id,
                stage = SubmissionStage::Rejected.as_str(),
                kind = e.kind(),
                error = %e,
                "Submission rejected"
            ),
        }
        result
    }

    async fn process(
        &self,
        submission_id: uuid::Uuid,
        submission: &Submission,
    ) -> Result<Doodle, SubmissionError> {
        let raw = decode_data_uri(&submission.image)?;

        let normalized = {
            let _in_flight = InFlightGuard::enter(&self.in_flight);
            let settings = self.settings.current().await;
            tracing::debug!(
                %submission_id,
                stage = SubmissionStage::Normalizing.as_str(),
                width = settings.resize_width,
                height = settings.resize_height,
                quality = settings.image_quality,
                "Normalizing submission"
            );
            self.normalizer.normalize(raw, settings).await?
        };

        match self.commit(&normalized).await {
            Ok(doodle) => Ok(doodle),
            Err(e) => {
                self.normalizer.discard(normalized).await;
                Err(e)
            }
        }
    }

    /// Allocate the id, give the staged image its final name, insert,
    /// then publish. Held under one lock so no other commit can interleave.
    async fn commit(&self, normalized: &Normalized) -> Result<Doodle, SubmissionError> {
        let _commit = self.commit_lock.lock().await;
        let now = Utc::now();
        let mut id = self.store.next_id(now).await;

        let mut attempts = 0;
        let uri = loop {
            match self.normalizer.commit(normalized, id).await {
                Ok(uri) => break uri,
                Err(NormalizeError::NameTaken(name)) if attempts + 1 < MAX_NAME_ATTEMPTS => {
                    tracing::warn!(%name, doodle_id = %id, "Doodle name taken, bumping sequence");
                    attempts += 1;
                    id = DoodleId::next_after(Some(id), id.millis);
                }
                Err(e) => return Err(e.into()),
            }
        };

        let doodle = Doodle {
            id,
            uri,
            created_at: now,
        };
        self.store
            .insert(doodle.clone())
            .await
            .map_err(|e| SubmissionError::Internal(e.to_string()))?;
        self.event_bus.publish(DoodleEvent::accepted(doodle.clone()));
        Ok(doodle)
    }
}
