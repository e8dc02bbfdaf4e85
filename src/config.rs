//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri del run
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `src_dir` / `dst_dir` / `tmp_dir`: Directory sorgente, destinazione e temporanea
//! - `clean_source`: Cancella la sorgente dopo una conversione riuscita (default: false)
//! - `report_only`: Solo scan + diff + statistiche (default: false)
//! - `sort_key` / `sort_order`: Ordine di elaborazione (default: nome crescente)
//! - `min_file_size`: File più piccoli vengono ignorati (default: 0)
//! - `video_crf`: CRF video (0-51, default: 26)
//! - `jpeg_quality`: Qualità JPEG (1-100, default: 90)
//! - `video_timeout_secs`: Limite per ogni chiamata esterna video (default: nessuno)
//! - `ffmpeg_path` / `ffprobe_path`: Programmi esterni
//! - `json_output`: Eventi JSON su stdout al posto della vista terminale
//!
//! ## Validazione:
//! - Controlla che jpeg_quality sia 1-100
//! - Controlla che video_crf sia 0-51
//! - Controlla che il timeout, se presente, sia > 0
//! - Controlla che sorgente, destinazione e temp siano directory diverse
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     src_dir: "/photos".into(),
//!     clean_source: true,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::media::{SortKey, SortOrder};
use crate::platform::PlatformCommands;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for one shrinking run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory with the source media files
    pub src_dir: PathBuf,
    /// Directory where shrunk files are placed
    pub dst_dir: PathBuf,
    /// Directory where files are written while being processed
    pub tmp_dir: PathBuf,
    /// Delete source files once a shrunk copy exists
    pub clean_source: bool,
    /// Report current status without processing any file
    pub report_only: bool,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    /// Files below this many bytes are left out of the catalog
    pub min_file_size: u64,
    /// Video CRF value (0-51, lower = better quality)
    pub video_crf: u8,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Limit for each ffprobe/ffmpeg call; None waits forever
    pub video_timeout_secs: Option<u64>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        let platform = PlatformCommands::instance();
        Self {
            src_dir: PathBuf::from("."),
            dst_dir: PathBuf::from("./smaller"),
            tmp_dir: PathBuf::from("./_temp_"),
            clean_source: false,
            report_only: false,
            sort_key: SortKey::Name,
            sort_order: SortOrder::Ascending,
            min_file_size: 0,
            video_crf: 26,
            jpeg_quality: 90,
            video_timeout_secs: None,
            ffmpeg_path: platform.get_command("ffmpeg").to_string(),
            ffprobe_path: platform.get_command("ffprobe").to_string(),
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("JPEG quality must be between 1 and 100"));
        }

        if self.video_crf > 51 {
            return Err(anyhow::anyhow!("Video CRF must be between 0 and 51"));
        }

        if self.video_timeout_secs == Some(0) {
            return Err(anyhow::anyhow!("Video timeout must be greater than 0 seconds"));
        }

        let dirs = [
            ("source", &self.src_dir),
            ("destination", &self.dst_dir),
            ("temporary", &self.tmp_dir),
        ];
        for (i, (name_a, a)) in dirs.iter().enumerate() {
            for (name_b, b) in &dirs[i + 1..] {
                if same_directory(a, b) {
                    return Err(anyhow::anyhow!(
                        "The {} and {} directories must differ (both are {})",
                        name_a,
                        name_b,
                        a.display()
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn video_timeout(&self) -> Option<Duration> {
        self.video_timeout_secs.map(Duration::from_secs)
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("media-shrinker").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Compare directories by their canonical form when they exist
fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
