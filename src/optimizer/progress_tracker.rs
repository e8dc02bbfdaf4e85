//! # Progress Tracking Module
//!
//! Unico punto da cui l'orchestratore notifica il display.
//! Ogni messaggio di log viene anche emesso via `tracing` a livello info,
//! così le esecuzioni senza display mantengono una traccia completa.

use crate::{
    media::MediaFile,
    stats::ShrunkStats,
    updates::{UiEvent, UpdateSink},
};
use std::sync::Arc;
use tracing::info;

/// Thin wrapper over the update sink, cheap to clone
#[derive(Clone)]
pub struct ProgressTracker {
    sink: Arc<dyn UpdateSink>,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn UpdateSink>) -> Self {
        Self { sink }
    }

    /// Send the whole run snapshot
    pub fn catalog(&self, files: &[MediaFile]) {
        self.sink.notify(UiEvent::Catalog(files.to_vec()));
    }

    /// Send the new state of one file
    pub fn file_changed(&self, index: usize, file: &MediaFile) {
        self.sink.notify(UiEvent::File {
            index,
            file: file.clone(),
        });
    }

    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.sink.log(message);
    }

    pub fn finished(&self, stats: ShrunkStats) {
        self.sink.notify(UiEvent::Finished(stats));
    }
}
