//! # Media Data Model
//!
//! Tipi condivisi dalla pipeline: il tipo di media, lo stage del ciclo di vita
//! e il record `MediaFile` creato dallo scan e mutato solo dall'orchestratore.
//!
//! ## Invarianti:
//! - `shrunk_size > 0` solo in `Success` o `AlreadyProcessed`
//! - `deleted == true` solo in `Success` o `AlreadyProcessed`
//! - `percentage` / `processed_duration` validi solo durante `InProgress`

use crate::error::ShrinkError;
use crate::file_manager::FileManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Kind of media, decided from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Unknown,
    Video,
    Jpeg,
    Png,
}

impl MediaType {
    /// Classify a file name by extension (case-insensitive)
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());

        match ext.as_deref() {
            Some("mp4") => Self::Video,
            Some("jpg") | Some("jpeg") => Self::Jpeg,
            Some("png") => Self::Png,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Video => "video",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a file within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Waiting,
    InProgress,
    /// Attempted this run and failed
    Error,
    /// Converted this run
    Success,
    /// Found in the destination directory at scan time
    AlreadyProcessed,
}

impl Stage {
    /// Stages in which an output exists at the destination
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Success | Self::AlreadyProcessed)
    }
}

/// One discovered media file
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub media_type: MediaType,
    pub dir: PathBuf,
    pub name: String,
    /// Bytes of the source at scan time
    pub size: u64,

    pub stage: Stage,
    pub shrunk_size: u64,
    pub error: Option<ShrinkError>,

    pub percentage: f64,
    /// Seconds of video already encoded
    pub processed_duration: f64,

    pub deleted: bool,

    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
}

impl MediaFile {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>, media_type: MediaType, size: u64) -> Self {
        Self {
            media_type,
            dir: dir.into(),
            name: name.into(),
            size,
            stage: Stage::Waiting,
            shrunk_size: 0,
            error: None,
            percentage: 0.0,
            processed_duration: 0.0,
            deleted: false,
            start_time: None,
            end_time: None,
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Shrunk size as a percentage of the original size
    pub fn shrunk_percentage(&self) -> f64 {
        if self.size == 0 {
            0.0
        } else {
            self.shrunk_size as f64 / self.size as f64 * 100.0
        }
    }

    /// One-line summary, e.g. `Shrunk a.mp4 [50.00 MB] -> [12.10 MB] (24.20%)`
    pub fn summary(&self, prefix: &str) -> String {
        if self.shrunk_size == 0 {
            format!("{} {} [{}]", prefix, self.name, FileManager::format_size(self.size))
        } else {
            format!(
                "{} {} [{}] -> [{}] ({:.2}%)",
                prefix,
                self.name,
                FileManager::format_size(self.size),
                FileManager::format_size(self.shrunk_size),
                self.shrunk_percentage()
            )
        }
    }

    /// Wall time spent on the last attempt; measured up to now while it runs
    pub fn elapsed(&self) -> Option<Duration> {
        let start = self.start_time?;
        let end = self.end_time.unwrap_or_else(SystemTime::now);
        Some(end.duration_since(start).unwrap_or_default())
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.stage = Stage::InProgress;
        self.error = None;
        self.percentage = 0.0;
        self.processed_duration = 0.0;
        self.start_time = Some(SystemTime::now());
        self.end_time = None;
    }

    /// Record transcoder progress; values lower than the last one are ignored
    pub(crate) fn record_progress(&mut self, processed_duration: f64, percentage: f64) -> bool {
        if self.stage != Stage::InProgress || percentage < self.percentage {
            return false;
        }
        self.percentage = percentage;
        self.processed_duration = processed_duration;
        true
    }

    pub(crate) fn fail(&mut self, error: ShrinkError) {
        self.stage = Stage::Error;
        self.error = Some(error);
        self.shrunk_size = 0;
        self.percentage = 0.0;
        self.processed_duration = 0.0;
        self.end_time = Some(SystemTime::now());
    }

    pub(crate) fn succeed(&mut self, shrunk_size: u64) {
        self.stage = Stage::Success;
        self.error = None;
        self.shrunk_size = shrunk_size;
        self.percentage = 0.0;
        self.processed_duration = 0.0;
        self.end_time = Some(SystemTime::now());
    }
}

/// Order in which the run walks its files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Sort the run snapshot; size ties fall back to the name
pub fn sort_files(files: &mut [MediaFile], key: SortKey, order: SortOrder) {
    files.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Size => a.size.cmp(&b.size).then_with(|| a.name.cmp(&b.name)),
        };
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

/// Request handed to a shrink operation
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    pub input_path: PathBuf,
    /// Always inside the temp directory, never the final destination
    pub output_path: PathBuf,
}
