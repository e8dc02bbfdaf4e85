//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path di un file: sorgente, temporaneo e finale.
//! L'output di una conversione va sempre nella directory temporanea,
//! mai direttamente nella destinazione.

use crate::{config::Config, error::ShrinkError, media::MediaFile, media::ProcessingRequest};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Computes where each file is read from and written to
#[derive(Debug, Clone)]
pub struct PathResolver {
    dst_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl PathResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            dst_dir: config.dst_dir.clone(),
            tmp_dir: config.tmp_dir.clone(),
        }
    }

    pub fn temp_path(&self, name: &str) -> PathBuf {
        self.tmp_dir.join(name)
    }

    pub fn final_path(&self, name: &str) -> PathBuf {
        self.dst_dir.join(name)
    }

    /// Request for a shrink operation: source in, temp out
    pub fn request(&self, file: &MediaFile) -> ProcessingRequest {
        ProcessingRequest {
            input_path: file.source_path(),
            output_path: self.temp_path(&file.name),
        }
    }

    /// Create the destination and temporary directories if absent
    pub async fn ensure_dirs(&self) -> Result<(), ShrinkError> {
        for dir in [&self.dst_dir, &self.tmp_dir] {
            Self::ensure_dir(dir).await?;
        }
        Ok(())
    }

    async fn ensure_dir(dir: &Path) -> Result<(), ShrinkError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ShrinkError::scan(dir, format!("failed to create directory: {}", e)))?;
        debug!("Directory ready: {}", dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_request_never_targets_destination() {
        let root = TempDir::new().unwrap();
        let config = Config {
            src_dir: root.path().join("src"),
            dst_dir: root.path().join("out").join("dst"),
            tmp_dir: root.path().join("tmp"),
            ..Default::default()
        };
        let resolver = PathResolver::new(&config);
        let file = MediaFile::new(&config.src_dir, "a.mp4", MediaType::Video, 1);

        let request = resolver.request(&file);
        assert_eq!(request.input_path, config.src_dir.join("a.mp4"));
        assert_eq!(request.output_path, config.tmp_dir.join("a.mp4"));
        assert_eq!(resolver.final_path("a.mp4"), config.dst_dir.join("a.mp4"));

        resolver.ensure_dirs().await.unwrap();
        assert!(config.dst_dir.is_dir());
        assert!(config.tmp_dir.is_dir());
    }
}
