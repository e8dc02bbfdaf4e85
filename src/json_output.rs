//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON, una riga per evento,
//! per chi pilota il programma da un altro processo.
//!
//! ## Tipi di messaggi:
//! - `start`: Catalogo pronto (totali e configurazione)
//! - `file`: Nuovo stato di un file (stage, progresso, dimensioni, errore)
//! - `log`: Riga di log dell'orchestratore
//! - `complete`: Statistiche finali del run
//! - `error`: Errore che interrompe il run

use crate::config::Config;
use crate::media::{MediaFile, MediaType, SortKey, SortOrder, Stage};
use crate::stats::ShrunkStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One JSON line on stdout
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Start {
        src_dir: PathBuf,
        dst_dir: PathBuf,
        total_files: usize,
        to_process: usize,
        config: JsonConfig,
    },

    File {
        index: usize,
        name: String,
        media_type: MediaType,
        stage: Stage,
        size: u64,
        shrunk_size: u64,
        percentage: f64,
        processed_duration: f64,
        deleted: bool,
        /// Wall time of the last attempt, still growing while in progress
        elapsed_seconds: Option<f64>,
        error: Option<String>,
        error_kind: Option<String>,
    },

    Log {
        message: String,
    },

    Complete {
        files_shrunk: usize,
        size_before: u64,
        size_after: u64,
        shrunk_percentage: f64,
        saved_percentage: f64,
        files_deleted: usize,
        deleted_size: u64,
        duration_seconds: f64,
    },

    Error {
        message: String,
    },
}

/// Settings echoed in the `start` message
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub jpeg_quality: u8,
    pub video_crf: u8,
    pub clean_source: bool,
    pub report_only: bool,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    pub video_timeout_secs: Option<u64>,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(config: &Config, files: &[MediaFile]) -> Self {
        Self::Start {
            src_dir: config.src_dir.clone(),
            dst_dir: config.dst_dir.clone(),
            total_files: files.len(),
            to_process: files.iter().filter(|f| f.stage == Stage::Waiting).count(),
            config: JsonConfig::from(config),
        }
    }

    pub fn file(index: usize, file: &MediaFile) -> Self {
        Self::File {
            index,
            name: file.name.clone(),
            media_type: file.media_type,
            stage: file.stage,
            size: file.size,
            shrunk_size: file.shrunk_size,
            percentage: file.percentage,
            processed_duration: file.processed_duration,
            deleted: file.deleted,
            elapsed_seconds: file.elapsed().map(|e| e.as_secs_f64()),
            error: file.error.as_ref().map(|e| e.to_string()),
            error_kind: file.error.as_ref().map(|e| e.kind().to_string()),
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
        }
    }

    pub fn complete(stats: &ShrunkStats, duration_seconds: f64) -> Self {
        Self::Complete {
            files_shrunk: stats.count,
            size_before: stats.size_before,
            size_after: stats.size_after,
            shrunk_percentage: stats.shrunk_percentage(),
            saved_percentage: stats.saved_percentage(),
            files_deleted: stats.deleted_count,
            deleted_size: stats.deleted_size,
            duration_seconds,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            video_crf: config.video_crf,
            clean_source: config.clean_source,
            report_only: config.report_only,
            sort_key: config.sort_key,
            sort_order: config.sort_order,
            video_timeout_secs: config.video_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShrinkError;

    #[test]
    fn test_file_message_shape() {
        let mut file = MediaFile::new("/src", "a.mp4", MediaType::Video, 100);
        file.begin_attempt();
        file.fail(ShrinkError::DurationMismatch {
            expected: 10.0,
            actual: 4.0,
        });

        let value = serde_json::to_value(JsonMessage::file(2, &file)).unwrap();
        assert_eq!(value["type"], "file");
        assert_eq!(value["index"], 2);
        assert_eq!(value["media_type"], "video");
        assert_eq!(value["stage"], "error");
        assert_eq!(value["error_kind"], "duration_mismatch");
        assert!(value["error"].as_str().unwrap().contains("duration mismatch"));
        assert!(value["elapsed_seconds"].as_f64().unwrap() >= 0.0);

        let waiting = MediaFile::new("/src", "b.mp4", MediaType::Video, 100);
        let value = serde_json::to_value(JsonMessage::file(3, &waiting)).unwrap();
        assert!(value["elapsed_seconds"].is_null());
    }

    #[test]
    fn test_start_counts_waiting_files() {
        let mut done = MediaFile::new("/src", "b.png", MediaType::Png, 10);
        done.stage = Stage::AlreadyProcessed;
        let files = vec![MediaFile::new("/src", "a.png", MediaType::Png, 10), done];

        let value = serde_json::to_value(JsonMessage::start(&Config::default(), &files)).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["total_files"], 2);
        assert_eq!(value["to_process"], 1);
        assert_eq!(value["config"]["sort_key"], "name");
    }

    #[test]
    fn test_complete_message() {
        let stats = ShrunkStats {
            count: 2,
            size_before: 200,
            size_after: 50,
            ..Default::default()
        };
        let value = serde_json::to_value(JsonMessage::complete(&stats, 1.5)).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["shrunk_percentage"], 25.0);
        assert_eq!(value["saved_percentage"], 75.0);
    }
}
