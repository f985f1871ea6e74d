//! Removal of transient image artifacts

use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Suffix of the visualization files predictors may leave behind
pub const IMAGE_SUFFIX: &str = ".png";

/// Delete every regular file in `dir` whose name ends in `.png`.
///
/// Files already removed by a concurrent worker are skipped; other removal
/// failures are logged and do not stop the sweep. Returns how many files
/// were deleted.
pub fn cleanup_images(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let is_png = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(IMAGE_SUFFIX));
        if !is_png || !entry.file_type()?.is_file() {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove image artifact"),
        }
    }
    if removed > 0 {
        debug!(dir = %dir.display(), removed, "Removed image artifacts");
    }
    Ok(removed)
}
