use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// File extensions of the image formats the slideshow picks up, in lowercase.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "avif", "jxl", "tif", "tiff",
];

/// Whether `path` has the extension of a supported image format, ignoring case.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Lists all image files in `folder`, sorted by path.
///
/// Subfolders are searched only if `recursive` is set.
pub fn find_images(folder: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut images = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            // The root itself must be readable, anything below it is skipped with a warning.
            Err(error) if error.depth() == 0 => {
                return Err(error)
                    .with_context(|| format!("failed to read folder {}", folder.display()));
            }
            Err(error) => {
                tracing::warn!(error = &error as &dyn std::error::Error, "Skipping entry");
                continue;
            }
        };

        if entry.file_type().is_file() && is_image_path(entry.path()) {
            images.push(entry.into_path());
        }
    }

    images.sort();
    tracing::debug!(folder = %folder.display(), images = images.len(), "Discovered images");
    Ok(images)
}
