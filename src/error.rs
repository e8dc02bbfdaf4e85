//! # Error Types Module
//!
//! Questo modulo definisce la tassonomia degli errori della pipeline.
//!
//! ## Responsabilità:
//! - Definisce `ShrinkError` enum per categorizzare tutti i fallimenti possibili
//! - Distingue errori di run (scan delle directory) da errori per singolo file
//! - Fornisce messaggi di errore descrittivi e strutturati
//!
//! ## Categorie di errori:
//! - `Scan`: Directory non leggibile (interrompe tutto il run)
//! - `Probe`: Dimensioni/durata del video non ottenibili
//! - `TranscodeProcess`: Avvio o uscita anomala del transcoder
//! - `DurationMismatch`: Durata dell'output diversa da quella della sorgente
//! - `Codec`: Decode/resize/encode delle immagini
//! - `Finalize`: Spostamento temp → destinazione o stat finale
//! - `Timeout` / `Cancelled`: Processo esterno fermato
//!
//! ## Nota:
//! L'enum è `Clone` perché una copia vive dentro ogni `MediaFile`
//! e dentro ogni snapshot inviato al display.

use std::path::PathBuf;

/// Failure classes of the shrinking pipeline
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShrinkError {
    #[error("Error scanning directory {}: {message}", dir.display())]
    Scan { dir: PathBuf, message: String },

    #[error("Probing video failed: {0}")]
    Probe(String),

    #[error("Transcoder failed: {0}")]
    TranscodeProcess(String),

    #[error("Conversion failed; duration mismatch: {expected:8.2} -> {actual:8.2}")]
    DurationMismatch { expected: f64, actual: f64 },

    #[error("Image codec error: {0}")]
    Codec(String),

    #[error("Finalizing output failed: {0}")]
    Finalize(String),

    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },

    #[error("{0} was cancelled")]
    Cancelled(String),
}

impl ShrinkError {
    pub fn scan(dir: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Scan {
            dir: dir.into(),
            message: err.to_string(),
        }
    }

    /// Short, stable name of the failure class, used by the JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scan { .. } => "scan",
            Self::Probe(_) => "probe",
            Self::TranscodeProcess(_) => "transcode_process",
            Self::DurationMismatch { .. } => "duration_mismatch",
            Self::Codec(_) => "codec",
            Self::Finalize(_) => "finalize",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

impl From<image::ImageError> for ShrinkError {
    fn from(err: image::ImageError) -> Self {
        Self::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = ShrinkError::scan("/nope", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Error scanning directory /nope: No such file or directory"
        );

        let err = ShrinkError::DurationMismatch {
            expected: 10.0,
            actual: 4.5,
        };
        assert!(err.to_string().contains("10.00"));
        assert!(err.to_string().contains("4.50"));
        assert_eq!(err.kind(), "duration_mismatch");
    }
}
