//! The accepted-doodle record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{EpochMillis, Timestamp};

/// Monotonically orderable doodle identifier.
///
/// Ordered by `millis` first, then by the `seq` disambiguator, so two
/// doodles appended within the same millisecond still get distinct,
/// strictly increasing ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DoodleId {
    pub millis: EpochMillis,
    pub seq: u32,
}

impl DoodleId {
    /// Allocate the id that follows `last`, preferring `candidate_millis`.
    ///
    /// If the candidate is not strictly later than `last` (clock skew, same
    /// millisecond), the id stays on `last.millis` and bumps `seq`.
    pub fn next_after(last: Option<DoodleId>, candidate_millis: EpochMillis) -> DoodleId {
        match last {
            Some(last) if candidate_millis <= last.millis => DoodleId {
                millis: last.millis,
                seq: last.seq + 1,
            },
            _ => DoodleId {
                millis: candidate_millis,
                seq: 0,
            },
        }
    }
}

impl fmt::Display for DoodleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

/// One accepted, normalized drawing. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doodle {
    pub id: DoodleId,
    /// Public URI of the normalized image, e.g. `/static/doodles/doodle_1700000000000.png`.
    pub uri: String,
    pub created_at: Timestamp,
}
