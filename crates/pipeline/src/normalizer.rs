//! Image normalization: decode -> resize -> re-encode -> stage -> commit.
//!
//! [`ImageNormalizer`] writes each normalized image to a hidden staging
//! file first. The final `doodle_<millis>[_<seq>].png` name is only chosen
//! in [`Normalizer::commit`], from the id the store assigns, so file names
//! sort in the same order as the in-memory history. Existing files are
//! never overwritten. Decoding, resizing and encoding are CPU-bound and run
//! on the blocking pool; the writes are async.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use doodlewall_core::doodle::DoodleId;
use doodlewall_core::naming::{doodle_filename, public_uri, STAGING_SUFFIX};
use doodlewall_core::settings::NormalizeSettings;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::DynamicImage;
use tokio::io::AsyncWriteExt;

/// A normalized image waiting in its staging file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Staging location on disk. Not served and not picked up by the
    /// startup scan.
    pub staged: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// The input bytes are not a decodable image.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Encoding or writing the normalized image failed.
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// The final name for the offered id is already on disk.
    #[error("Doodle file already exists: {0}")]
    NameTaken(String),
}

/// Turns raw submitted bytes into a persisted, normalized image.
///
/// Persisting is two-phase: [`normalize`](Self::normalize) stages the
/// image, [`commit`](Self::commit) gives it its final name once the doodle
/// id is known, and [`discard`](Self::discard) drops a staged image that
/// will never be committed.
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(
        &self,
        raw: Vec<u8>,
        settings: NormalizeSettings,
    ) -> Result<Normalized, NormalizeError>;

    /// Move the staged image to the name derived from `id` and return its
    /// public URI. Fails with [`NormalizeError::NameTaken`] rather than
    /// overwriting an existing file.
    async fn commit(
        &self,
        normalized: &Normalized,
        id: DoodleId,
    ) -> Result<String, NormalizeError>;

    async fn discard(&self, normalized: Normalized);
}

/// Filesystem-backed PNG normalizer.
pub struct ImageNormalizer {
    doodle_dir: PathBuf,
    public_prefix: String,
}

impl ImageNormalizer {
    /// * `doodle_dir`    - directory the normalized files are written to.
    /// * `public_prefix` - URI prefix under which that directory is served.
    pub fn new(doodle_dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            doodle_dir: doodle_dir.into(),
            public_prefix: public_prefix.into(),
        }
    }
}

#[async_trait]
impl Normalizer for ImageNormalizer {
    async fn normalize(
        &self,
        raw: Vec<u8>,
        settings: NormalizeSettings,
    ) -> Result<Normalized, NormalizeError> {
        settings
            .validate()
            .map_err(|e| NormalizeError::InvalidSettings(e.to_string()))?;

        let encoded = tokio::task::spawn_blocking(move || transcode(&raw, &settings))
            .await
            .map_err(|e| NormalizeError::Io(format!("Transcode task failed: {e}")))??;

        let staged = write_staged(&self.doodle_dir, &encoded).await?;

        tracing::debug!(
            path = %staged.display(),
            bytes = encoded.len(),
            width = settings.resize_width,
            height = settings.resize_height,
            "Doodle image staged"
        );

        Ok(Normalized {
            staged,
            width: settings.resize_width,
            height: settings.resize_height,
        })
    }

    async fn commit(
        &self,
        normalized: &Normalized,
        id: DoodleId,
    ) -> Result<String, NormalizeError> {
        let file_name = doodle_filename(id.millis, (id.seq > 0).then_some(id.seq));
        let path = self.doodle_dir.join(&file_name);

        // A hard link fails instead of replacing an existing target.
        match tokio::fs::hard_link(&normalized.staged, &path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(NormalizeError::NameTaken(file_name));
            }
            Err(e) => {
                return Err(NormalizeError::Io(format!(
                    "Failed to commit {}: {e}",
                    path.display()
                )));
            }
        }

        if let Err(e) = tokio::fs::remove_file(&normalized.staged).await {
            tracing::warn!(
                path = %normalized.staged.display(),
                error = %e,
                "Failed to remove staging file"
            );
        }

        tracing::debug!(path = %path.display(), doodle_id = %id, "Doodle image committed");
        Ok(public_uri(&self.public_prefix, &file_name))
    }

    async fn discard(&self, normalized: Normalized) {
        if let Err(e) = tokio::fs::remove_file(&normalized.staged).await {
            tracing::warn!(
                path = %normalized.staged.display(),
                error = %e,
                "Failed to discard staging file"
            );
        }
    }
}

/// Decode, resize to exactly the target size, and encode as PNG.
pub fn transcode(raw: &[u8], settings: &NormalizeSettings) -> Result<Vec<u8>, NormalizeError> {
    let image = image::load_from_memory(raw).map_err(|e| NormalizeError::Decode(e.to_string()))?;

    let resized = image.resize_exact(
        settings.resize_width,
        settings.resize_height,
        FilterType::Lanczos3,
    );
    let rgba = DynamicImage::ImageRgba8(resized.to_rgba8());

    let mut buf = Cursor::new(Vec::new());
    let encoder = PngEncoder::new_with_quality(
        &mut buf,
        compression_for_quality(settings.image_quality),
        PngFilter::Adaptive,
    );
    rgba.write_with_encoder(encoder)
        .map_err(|e| NormalizeError::Io(format!("PNG encode failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Map the 1-100 quality knob onto PNG compression effort.
///
/// PNG is lossless, so quality only trades encode time against file size:
/// top quality favours the fastest encode, low quality the smallest file.
pub fn compression_for_quality(quality: u8) -> CompressionType {
    match quality {
        90..=u8::MAX => CompressionType::Fast,
        50..=89 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Write `bytes` to a fresh hidden staging file in `dir`.
async fn write_staged(dir: &Path, bytes: &[u8]) -> Result<PathBuf, NormalizeError> {
    let path = dir.join(format!(".doodle_{}.png{STAGING_SUFFIX}", uuid::Uuid::new_v4()));

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
        .map_err(|e| NormalizeError::Io(format!("Failed to create {}: {e}", path.display())))?;

    if let Err(e) = write_all(&mut file, bytes).await {
        // Best effort: do not leave a truncated image behind.
        drop(file);
        let _ = tokio::fs::remove_file(&path).await;
        return Err(NormalizeError::Io(format!(
            "Failed to write {}: {e}",
            path.display()
        )));
    }

    Ok(path)
}

async fn write_all(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use doodlewall_core::naming::is_doodle_image;
    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn settings(w: u32, h: u32, q: u8) -> NormalizeSettings {
        NormalizeSettings {
            resize_width: w,
            resize_height: h,
            image_quality: q,
        }
    }

    #[test]
    fn transcode_produces_target_dimensions() {
        let out = transcode(&png_bytes(40, 25), &settings(64, 48, 80)).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn transcode_rejects_garbage() {
        let result = transcode(b"definitely not an image", &settings(10, 10, 100));
        assert_matches!(result, Err(NormalizeError::Decode(_)));
    }

    #[test]
    fn quality_maps_to_compression() {
        assert!(matches!(compression_for_quality(100), CompressionType::Fast));
        assert!(matches!(compression_for_quality(60), CompressionType::Default));
        assert!(matches!(compression_for_quality(10), CompressionType::Best));
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn normalize_stages_a_hidden_file() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(dir.path(), "/static/doodles");

        let result = normalizer
            .normalize(png_bytes(30, 30), settings(32, 16, 100))
            .await
            .unwrap();

        assert_eq!((result.width, result.height), (32, 16));
        let names = file_names(dir.path());
        assert_eq!(names.len(), 1);
        assert!(!is_doodle_image(&names[0]));

        let on_disk = image::load_from_memory(&std::fs::read(&result.staged).unwrap()).unwrap();
        assert_eq!((on_disk.width(), on_disk.height()), (32, 16));
    }

    #[tokio::test]
    async fn commit_names_the_file_after_the_id() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(dir.path(), "/static/doodles");

        let first = normalizer
            .normalize(png_bytes(8, 8), settings(8, 8, 100))
            .await
            .unwrap();
        let second = normalizer
            .normalize(png_bytes(8, 8), settings(8, 8, 100))
            .await
            .unwrap();

        let uri = normalizer
            .commit(&first, DoodleId { millis: 1_700_000_000_000, seq: 0 })
            .await
            .unwrap();
        assert_eq!(uri, "/static/doodles/doodle_1700000000000.png");

        let uri = normalizer
            .commit(&second, DoodleId { millis: 1_700_000_000_000, seq: 1 })
            .await
            .unwrap();
        assert_eq!(uri, "/static/doodles/doodle_1700000000000_1.png");

        assert_eq!(
            file_names(dir.path()),
            vec!["doodle_1700000000000.png", "doodle_1700000000000_1.png"]
        );
    }

    #[tokio::test]
    async fn commit_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doodle_5000.png"), b"keep me").unwrap();
        let normalizer = ImageNormalizer::new(dir.path(), "/static/doodles");

        let staged = normalizer
            .normalize(png_bytes(8, 8), settings(8, 8, 100))
            .await
            .unwrap();
        let result = normalizer
            .commit(&staged, DoodleId { millis: 5_000, seq: 0 })
            .await;

        assert_matches!(result, Err(NormalizeError::NameTaken(name)) if name == "doodle_5000.png");
        assert_eq!(std::fs::read(dir.path().join("doodle_5000.png")).unwrap(), b"keep me");
        assert!(staged.staged.exists());
    }

    #[tokio::test]
    async fn discard_removes_the_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(dir.path(), "/static/doodles");

        let staged = normalizer
            .normalize(png_bytes(8, 8), settings(8, 8, 100))
            .await
            .unwrap();
        normalizer.discard(staged).await;

        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn decode_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(dir.path(), "/static/doodles");

        let result = normalizer
            .normalize(b"garbage".to_vec(), settings(8, 8, 100))
            .await;

        assert_matches!(result, Err(NormalizeError::Decode(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(dir.path().join("nope"), "/static/doodles");

        let result = normalizer
            .normalize(png_bytes(8, 8), settings(8, 8, 100))
            .await;

        assert_matches!(result, Err(NormalizeError::Io(_)));
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected_before_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(dir.path(), "/static/doodles");

        let result = normalizer
            .normalize(png_bytes(8, 8), settings(0, 8, 100))
            .await;

        assert_matches!(result, Err(NormalizeError::InvalidSettings(_)));
    }
}
