//! # File Management Module
//!
//! Questo modulo raccoglie le operazioni sui file usate dalla pipeline.
//!
//! ## Responsabilità:
//! - Formattazione human-readable delle dimensioni
//! - Calcolo percentuali di riduzione
//! - Posizionamento sicuro dell'output finale (rename o copia staged)
//! - Propagazione della data di modifica dalla sorgente all'output
//!
//! ## Sicurezza operazioni:
//! - Una copia non viene mai scritta direttamente sul path finale:
//!   si scrive `.<nome>.partial` nella stessa directory e poi si fa rename
//! - Se la copia fallisce il file parziale viene rimosso
//!
//! ## Esempio:
//! ```rust,ignore
//! FileManager::move_into_place(&temp_path, &final_path).await?;
//! FileManager::copy_modified_time(&source_path, &final_path)?;
//! ```

use anyhow::{Context, Result};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// File operations used by the pipeline
pub struct FileManager;

impl FileManager {
    /// Move a finished temp file to its final path.
    ///
    /// Tries a plain rename first; when that fails (typically across
    /// filesystems) the bytes are copied through a staged sibling and the
    /// temp file is removed afterwards.
    pub async fn move_into_place(temp_path: &Path, final_path: &Path) -> Result<()> {
        match fs::rename(temp_path, final_path).await {
            Ok(()) => return Ok(()),
            Err(e) => debug!(
                "Rename {} -> {} failed ({}), falling back to copy",
                temp_path.display(),
                final_path.display(),
                e
            ),
        }

        Self::copy_into_place(temp_path, final_path).await?;
        if let Err(e) = fs::remove_file(temp_path).await {
            warn!("Failed to remove temp file {}: {}", temp_path.display(), e);
        }
        Ok(())
    }

    /// Copy `source` byte-for-byte to `final_path` without ever exposing a
    /// partially written file at `final_path`.
    pub async fn copy_into_place(source: &Path, final_path: &Path) -> Result<()> {
        let staged = Self::staged_path(final_path)?;

        if let Err(e) = fs::copy(source, &staged).await {
            let _ = fs::remove_file(&staged).await;
            return Err(e).with_context(|| {
                format!("Copy failed, could not write {}", staged.display())
            });
        }

        fs::rename(&staged, final_path).await.with_context(|| {
            format!(
                "Could not move {} into {}",
                staged.display(),
                final_path.display()
            )
        })
    }

    /// Hidden sibling used while a copy is in flight
    pub fn staged_path(final_path: &Path) -> Result<PathBuf> {
        let name = final_path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", final_path.display()))?
            .to_string_lossy();
        Ok(final_path.with_file_name(format!(".{}.partial", name)))
    }

    /// Give `target` the modification time of `source`, so photo and video
    /// libraries keep sorting shrunk files by their original date.
    pub fn copy_modified_time(source: &Path, target: &Path) -> Result<()> {
        let metadata = std::fs::metadata(source)
            .with_context(|| format!("Could not stat {}", source.display()))?;
        let mtime = FileTime::from_last_modification_time(&metadata);
        filetime::set_file_times(target, mtime, mtime)
            .with_context(|| format!("Could not set timestamps on {}", target.display()))?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_index])
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
