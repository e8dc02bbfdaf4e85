//! # Media Catalog Module
//!
//! Scansione di una directory e classificazione dei file media.
//!
//! ## Responsabilità:
//! - Elenca le entry (non ricorsivo) di una directory
//! - Classifica per estensione: `.mp4` → video, `.jpg/.jpeg` → JPEG, `.png` → PNG
//! - Esclude file sconosciuti e file sotto la soglia minima di dimensione
//! - Fallisce l'intero scan se la directory non si apre o non si elenca

use crate::error::ShrinkError;
use crate::media::{MediaFile, MediaType};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory scanner
pub struct MediaCatalog;

impl MediaCatalog {
    /// Scan `dir` and return its media files, skipping anything smaller than
    /// `min_size` bytes.
    pub fn scan(dir: &Path, min_size: u64) -> Result<Vec<MediaFile>, ShrinkError> {
        let metadata = std::fs::metadata(dir).map_err(|e| ShrinkError::scan(dir, e))?;
        if !metadata.is_dir() {
            return Err(ShrinkError::scan(dir, "not a directory"));
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                // The directory itself could not be listed
                Err(e) if e.depth() == 0 => return Err(ShrinkError::scan(dir, e)),
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let media_type = MediaType::from_path(entry.path());
            if media_type == MediaType::Unknown {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            if size < min_size {
                debug!("Skipping small file {} ({} bytes)", entry.path().display(), size);
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            files.push(MediaFile::new(dir, name, media_type, size));
        }

        debug!("Found {} media files in {}", files.len(), dir.display());
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_classifies_and_filters() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp4"), vec![0u8; 300]).unwrap();
        std::fs::write(dir.path().join("b.PNG"), vec![0u8; 200]).unwrap();
        std::fs::write(dir.path().join("c.jpeg"), vec![0u8; 10]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let files = MediaCatalog::scan(dir.path(), 0).unwrap();
        let summary: Vec<_> = files
            .iter()
            .map(|f| (f.name.as_str(), f.media_type, f.size))
            .collect();
        assert_eq!(
            summary,
            [
                ("a.mp4", MediaType::Video, 300),
                ("b.PNG", MediaType::Png, 200),
                ("c.jpeg", MediaType::Jpeg, 10),
            ]
        );
        assert!(files.iter().all(|f| f.dir == dir.path()));

        let files = MediaCatalog::scan(dir.path(), 100).unwrap();
        assert_eq!(files.len(), 2, "c.jpeg is below the threshold");
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");

        let err = MediaCatalog::scan(&missing, 0).unwrap_err();
        assert!(matches!(err, ShrinkError::Scan { .. }));
    }
}
