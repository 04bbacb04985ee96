use std::path::{Path, PathBuf};

use carousel_core::Slide;
use carousel_logging::{carousel_info, carousel_warn};
use thiserror::Error;

use crate::persist::{ensure_dir, AtomicFileWriter, PersistError};
use crate::{GenerationClient, RequestError};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("output directory unusable: {0}")]
    Output(#[from] PersistError),
}

/// What happened to each slide of a download run.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub saved: Vec<PathBuf>,
    /// Slides with no image URL.
    pub skipped: usize,
    /// Zero-based slide index and the reason it failed.
    pub failed: Vec<(usize, RequestError)>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.skipped == 0 && self.failed.is_empty()
    }
}

/// Saves each slide image as `slide-<n>.jpg` under `dir`, one at a time.
///
/// A single bad slide does not abort the run; only an unusable output
/// directory does.
pub async fn download_slides(
    client: &GenerationClient,
    slides: &[Slide],
    dir: &Path,
) -> Result<DownloadReport, DownloadError> {
    ensure_dir(dir)?;
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    let mut report = DownloadReport::default();

    for (index, slide) in slides.iter().enumerate() {
        let Some(url) = slide.primary_url() else {
            carousel_warn!("Slide {} has no image URL, skipping", index + 1);
            report.skipped += 1;
            continue;
        };
        let bytes = match client.download(url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                carousel_warn!("Slide {} download failed: {}", index + 1, err);
                report.failed.push((index, err));
                continue;
            }
        };
        let path = writer.write(&Slide::download_filename(index), &bytes)?;
        report.saved.push(path);
    }

    carousel_info!(
        "Downloaded {} of {} slides to {}",
        report.saved.len(),
        slides.len(),
        dir.display()
    );
    Ok(report)
}
