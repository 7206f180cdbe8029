use std::path::Path;

use crate::foundation::error::{BackdropError, BackdropResult};
use crate::model::ImageAsset;

pub mod decode;

/// Extensions (lower-case, no dot) accepted as conversion sources.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// List the supported raster files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into. An unreadable directory is an error.
pub fn list_images(dir: &Path) -> BackdropResult<Vec<ImageAsset>> {
    let entries = std::fs::read_dir(dir).map_err(|e| BackdropError::io(dir, e))?;

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BackdropError::io(dir, e))?;
        let path = entry.path();
        if !is_supported_image(&path) {
            continue;
        }
        // Follows symlinks, so a linked image counts as a file.
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        out.push(ImageAsset {
            source_path: path,
            size_bytes: meta.len(),
        });
    }

    out.sort_by(|a, b| a.source_path.file_name().cmp(&b.source_path.file_name()));
    Ok(out)
}
