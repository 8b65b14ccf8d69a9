//! Doodle file naming convention.
//!
//! Normalized images are persisted as `doodle_{millis}.png`, with the
//! doodle id's `_{seq}` suffix when two land in the same millisecond.
//! Millisecond timestamps keep a fixed width of 13 digits until the
//! year 2286, so lexical order of the names matches temporal order.

use crate::types::EpochMillis;

/// Filename prefix for every persisted doodle.
pub const DOODLE_PREFIX: &str = "doodle_";

/// Extension of every persisted doodle.
pub const DOODLE_EXTENSION: &str = "png";

/// Appended to images that are written but not yet committed.
pub const STAGING_SUFFIX: &str = ".part";

/// Build a doodle filename.
///
/// # Examples
///
/// ```
/// use doodlewall_core::naming::doodle_filename;
///
/// assert_eq!(doodle_filename(1700000000000, None), "doodle_1700000000000.png");
/// assert_eq!(doodle_filename(1700000000000, Some(2)), "doodle_1700000000000_2.png");
/// ```
pub fn doodle_filename(millis: EpochMillis, index: Option<u32>) -> String {
    match index {
        Some(idx) => format!("{DOODLE_PREFIX}{millis}_{idx}.{DOODLE_EXTENSION}"),
        None => format!("{DOODLE_PREFIX}{millis}.{DOODLE_EXTENSION}"),
    }
}

/// Whether a directory entry name looks like a servable doodle image.
///
/// Hidden files, which include staged images, never qualify.
pub fn is_doodle_image(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && ext.eq_ignore_ascii_case(DOODLE_EXTENSION),
        None => false,
    }
}

/// Recover `(millis, index)` from a name produced by [`doodle_filename`].
///
/// Returns `None` for any other image name; callers fall back to the
/// file's modification time for ordering.
pub fn parse_doodle_filename(name: &str) -> Option<(EpochMillis, u32)> {
    let stem = name
        .strip_prefix(DOODLE_PREFIX)?
        .strip_suffix(DOODLE_EXTENSION)?
        .strip_suffix('.')?;

    let (millis, index) = match stem.split_once('_') {
        Some((millis, index)) => (millis, index.parse::<u32>().ok()?),
        None => (stem, 0),
    };

    if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((millis.parse().ok()?, index))
}

/// Join the public URI prefix and a filename with exactly one slash.
pub fn public_uri(prefix: &str, filename: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), filename)
}
