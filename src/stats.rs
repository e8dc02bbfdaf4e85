//! # Statistics Module
//!
//! Statistiche aggregate calcolate on demand ripiegando la lista dei file.
//!
//! ## Statistiche tracciate:
//! - **count**: File con output valido (`shrunk_size > 0` e nessun errore)
//! - **size_before / size_after**: Somma delle dimensioni originali e ridotte
//! - **deleted_***: File sorgente rimossi dopo la conversione
//!
//! Non viene mantenuto nessuno stato incrementale: i numeri sono sempre
//! coerenti con lo stato corrente dei file.

use crate::file_manager::FileManager;
use crate::media::MediaFile;
use serde::{Deserialize, Serialize};

/// Aggregate results over a run snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShrunkStats {
    pub count: usize,
    pub size_before: u64,
    pub size_after: u64,

    pub deleted_count: usize,
    pub deleted_size: u64,
    pub deleted_shrunk_size: u64,
}

impl ShrunkStats {
    pub fn from_files(files: &[MediaFile]) -> Self {
        files.iter().fold(Self::default(), |mut stats, file| {
            stats.add(file);
            stats
        })
    }

    fn add(&mut self, file: &MediaFile) {
        if file.shrunk_size > 0 && file.error.is_none() {
            self.count += 1;
            self.size_before += file.size;
            self.size_after += file.shrunk_size;
        }
        if file.deleted {
            self.deleted_count += 1;
            self.deleted_size += file.size;
            self.deleted_shrunk_size += file.shrunk_size;
        }
    }

    /// Shrunk bytes as a percentage of the original bytes
    pub fn shrunk_percentage(&self) -> f64 {
        if self.size_before == 0 {
            0.0
        } else {
            self.size_after as f64 / self.size_before as f64 * 100.0
        }
    }

    pub fn saved_percentage(&self) -> f64 {
        FileManager::calculate_reduction(self.size_before, self.size_after)
    }

    pub fn shrunk_summary(&self) -> String {
        format!(
            "Shrunk {} files [{}] -> [{}] ({:.2}%)",
            self.count,
            FileManager::format_size(self.size_before),
            FileManager::format_size(self.size_after),
            self.shrunk_percentage()
        )
    }

    pub fn cleaned_summary(&self) -> String {
        format!(
            "Deleted {} files [{}]. Space opened up after shrinking: [{}]",
            self.deleted_count,
            FileManager::format_size(self.deleted_size),
            FileManager::format_size(self.deleted_size.saturating_sub(self.deleted_shrunk_size))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShrinkError;
    use crate::media::{MediaType, Stage};

    #[test]
    fn test_fold_over_files() {
        let mut done = MediaFile::new("/s", "a.mp4", MediaType::Video, 1000);
        done.stage = Stage::AlreadyProcessed;
        done.shrunk_size = 250;
        done.deleted = true;

        let mut converted = MediaFile::new("/s", "b.jpg", MediaType::Jpeg, 1000);
        converted.begin_attempt();
        converted.succeed(500);

        let mut failed = MediaFile::new("/s", "c.png", MediaType::Png, 4000);
        failed.begin_attempt();
        failed.fail(ShrinkError::Codec("bad header".into()));

        let waiting = MediaFile::new("/s", "d.png", MediaType::Png, 9000);

        let stats = ShrunkStats::from_files(&[done, converted, failed, waiting]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.size_before, 2000);
        assert_eq!(stats.size_after, 750);
        assert_eq!(stats.deleted_count, 1);
        assert_eq!(stats.deleted_size, 1000);
        assert_eq!(stats.deleted_shrunk_size, 250);
        assert_eq!(stats.shrunk_percentage(), 37.5);
        assert_eq!(stats.saved_percentage(), 62.5);
        assert_eq!(
            stats.cleaned_summary(),
            "Deleted 1 files [1000.00 B]. Space opened up after shrinking: [750.00 B]"
        );
    }

    #[test]
    fn test_empty_run_has_no_division_by_zero() {
        let stats = ShrunkStats::from_files(&[]);
        assert_eq!(stats, ShrunkStats::default());
        assert_eq!(stats.shrunk_percentage(), 0.0);
        assert_eq!(stats.shrunk_summary(), "Shrunk 0 files [0.00 B] -> [0.00 B] (0.00%)");
    }
}
