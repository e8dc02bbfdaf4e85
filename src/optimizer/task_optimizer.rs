//! # Task Optimizer Module
//!
//! Worker per la riduzione di un singolo file.
//!
//! ## Algoritmo per file:
//! 1. Solo file in `Waiting`; start time e stage `InProgress`
//! 2. Operazione specifica per tipo, output nella directory temporanea
//! 3. Fallimento: stage `Error`, il file temporaneo resta per ispezione
//! 4. Successo: se l'output è più grande dell'originale si copia l'originale,
//!    altrimenti si sposta il temporaneo nella destinazione
//! 5. Stat del file finale, propagazione della data di modifica
//! 6. Stage `Success`; con la pulizia attiva la sorgente viene cancellata

use crate::{
    config::Config,
    error::ShrinkError,
    file_manager::FileManager,
    image_processor::ImageProcessor,
    media::{MediaFile, MediaType, Stage},
    optimizer::{path_resolver::PathResolver, progress_tracker::ProgressTracker},
    process_registry::ProcessRegistry,
    video_processor::VideoProcessor,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Runs the per-file pipeline
pub struct TaskOptimizer {
    clean_source: bool,
    paths: PathResolver,
    image_processor: ImageProcessor,
    video_processor: VideoProcessor,
    tracker: ProgressTracker,
}

impl TaskOptimizer {
    pub fn new(config: &Config, tracker: ProgressTracker, registry: ProcessRegistry) -> Self {
        Self {
            clean_source: config.clean_source,
            paths: PathResolver::new(config),
            image_processor: ImageProcessor::new(config),
            video_processor: VideoProcessor::new(config, registry),
            tracker,
        }
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn video_processor(&self) -> &VideoProcessor {
        &self.video_processor
    }

    /// Process one file of the catalog. Failures end up on the file, never
    /// in the return value.
    pub async fn process(&self, index: usize, file: &mut MediaFile) {
        if file.stage != Stage::Waiting {
            return;
        }

        file.begin_attempt();
        self.tracker.file_changed(index, file);
        debug!("Processing {}", file.name);

        match self.shrink_and_finalize(index, file).await {
            Ok(shrunk_size) => {
                file.succeed(shrunk_size);
                self.tracker.file_changed(index, file);
                self.tracker.log(file.summary("Shrunk"));

                if self.clean_source {
                    self.remove_source(index, file).await;
                }
            }
            Err(e) => {
                warn!("Failed to shrink {}: {}", file.name, e);
                self.tracker.log(format!("Error shrinking {}: {}", file.name, e));
                file.fail(e);
                self.tracker.file_changed(index, file);
            }
        }
    }

    /// Delete the source of a file whose shrunk copy exists
    pub async fn remove_source(&self, index: usize, file: &mut MediaFile) {
        if !file.stage.is_done() || file.deleted {
            return;
        }

        let source = file.source_path();
        match tokio::fs::remove_file(&source).await {
            Ok(()) => {
                file.deleted = true;
                self.tracker.file_changed(index, file);
                self.tracker.log(format!("Deleted {}", source.display()));
            }
            Err(e) => {
                warn!("Could not delete {}: {}", source.display(), e);
                self.tracker.log(format!("Error deleting {}: {}", source.display(), e));
            }
        }
    }

    /// Shrink into the temp dir and place the result; returns the final size
    async fn shrink_and_finalize(&self, index: usize, file: &mut MediaFile) -> Result<u64, ShrinkError> {
        let request = self.paths.request(file);
        let input_size = file_size(&request.input_path).await?;

        match file.media_type {
            MediaType::Video => {
                let tracker = &self.tracker;
                self.video_processor
                    .shrink(&request, |progress| {
                        if file.record_progress(progress.processed, progress.percentage) {
                            tracker.file_changed(index, file);
                        }
                    })
                    .await?
            }
            MediaType::Jpeg | MediaType::Png => {
                self.image_processor.shrink(&request, file.media_type).await?
            }
            MediaType::Unknown => {
                return Err(ShrinkError::Codec(format!("Unsupported file type: {}", file.name)));
            }
        }

        let temp_size = file_size(&request.output_path).await?;
        let final_path = self.paths.final_path(&file.name);

        if temp_size > input_size {
            info!(
                "Output for {} is larger than the original ({} > {}), keeping the original",
                file.name,
                FileManager::format_size(temp_size),
                FileManager::format_size(input_size)
            );
            FileManager::copy_into_place(&request.input_path, &final_path)
                .await
                .map_err(finalize_error)?;
            if let Err(e) = tokio::fs::remove_file(&request.output_path).await {
                warn!("Could not remove {}: {}", request.output_path.display(), e);
            }
        } else {
            FileManager::move_into_place(&request.output_path, &final_path)
                .await
                .map_err(finalize_error)?;
        }

        let shrunk_size = file_size(&final_path).await?;

        if let Err(e) = FileManager::copy_modified_time(&request.input_path, &final_path) {
            warn!("{:#}", e);
        }

        Ok(shrunk_size)
    }
}

async fn file_size(path: &Path) -> Result<u64, ShrinkError> {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.len())
        .map_err(|e| ShrinkError::Finalize(format!("Could not stat {}: {}", path.display(), e)))
}

fn finalize_error(err: anyhow::Error) -> ShrinkError {
    ShrinkError::Finalize(format!("{:#}", err))
}
