//! # Media Optimizer Main Orchestrator
//!
//! Orchestratore di un run: scan, diff, ordinamento, pulizia preliminare e
//! ciclo sui file, delegando il lavoro per singolo file a `TaskOptimizer`.
//!
//! ## Scheduling:
//! Un solo file alla volta in `InProgress`, nell'ordine scelto dalla
//! configurazione (nome o dimensione, crescente o decrescente). La
//! transcodifica video satura già CPU e disco: nessun parallelismo.
//!
//! ## Fasi del run:
//! 1. Scan della sorgente e della destinazione, diff per nome
//! 2. Riepilogo per file e statistiche iniziali
//! 3. Modalità report: fine qui, nessuna scrittura su disco
//! 4. Pulizia delle sorgenti già processate (se attiva)
//! 5. Verifica di ffmpeg/ffprobe se ci sono video da convertire
//! 6. Ciclo sui file, interrotto se il run viene cancellato
//! 7. Statistiche finali e `Done`

use crate::{
    catalog::MediaCatalog,
    config::Config,
    error::ShrinkError,
    media::{sort_files, MediaFile, MediaType, Stage},
    optimizer::{progress_tracker::ProgressTracker, task_optimizer::TaskOptimizer},
    process_registry::ProcessRegistry,
    resolver::StageResolver,
    stats::ShrunkStats,
    updates::UpdateSink,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Final state of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub files: Vec<MediaFile>,
    pub stats: ShrunkStats,
}

/// Orchestrates one shrinking run
pub struct MediaOptimizer {
    config: Config,
    registry: ProcessRegistry,
    tracker: ProgressTracker,
    task: TaskOptimizer,
}

impl MediaOptimizer {
    pub fn new(config: Config, sink: Arc<dyn UpdateSink>, registry: ProcessRegistry) -> Result<Self> {
        config.validate()?;
        let tracker = ProgressTracker::new(sink);
        let task = TaskOptimizer::new(&config, tracker.clone(), registry.clone());

        Ok(Self {
            config,
            registry,
            tracker,
            task,
        })
    }

    /// Run the whole pipeline. Only directory scan failures abort the run;
    /// per-file failures are recorded on the files.
    pub async fn run(&self) -> Result<RunReport, ShrinkError> {
        let mut files = self.build_catalog().await?;

        self.tracker.catalog(&files);
        for file in &files {
            self.tracker.log(file.summary("File"));
        }

        let initial = ShrunkStats::from_files(&files);
        if initial.count > 0 {
            self.tracker.log(initial.shrunk_summary());
        }

        if self.config.report_only {
            self.tracker.finished(initial);
            return Ok(RunReport {
                files,
                stats: initial,
            });
        }

        if self.config.clean_source {
            self.clean_already_processed(&mut files).await;
        }

        self.check_dependencies(&files).await;

        for (index, file) in files.iter_mut().enumerate() {
            if self.registry.is_cancelled() {
                warn!("Run cancelled, {} left untouched", file.name);
                self.tracker.log("Cancelled");
                break;
            }
            self.task.process(index, file).await;
        }

        let stats = ShrunkStats::from_files(&files);
        if stats.count > initial.count {
            self.tracker.log(stats.shrunk_summary());
        }
        if stats.deleted_count > 0 {
            self.tracker.log(stats.cleaned_summary());
        }
        self.tracker.log("Done");
        self.tracker.finished(stats);

        Ok(RunReport { files, stats })
    }

    /// Scan both directories, diff them and sort the result
    async fn build_catalog(&self) -> Result<Vec<MediaFile>, ShrinkError> {
        let config = &self.config;
        let source = MediaCatalog::scan(&config.src_dir, config.min_file_size)?;

        let destination = if config.report_only && !config.dst_dir.exists() {
            // Report mode writes nothing, a missing destination is just empty
            Vec::new()
        } else {
            if !config.report_only {
                self.task.paths().ensure_dirs().await?;
            }
            MediaCatalog::scan(&config.dst_dir, 0)?
        };

        info!(
            "Found {} media files in {}, {} in {}",
            source.len(),
            config.src_dir.display(),
            destination.len(),
            config.dst_dir.display()
        );

        let mut files = StageResolver::resolve(source, &destination);
        sort_files(&mut files, config.sort_key, config.sort_order);
        Ok(files)
    }

    /// Remove sources left over by earlier runs, before any transcoding starts
    async fn clean_already_processed(&self, files: &mut [MediaFile]) {
        for (index, file) in files.iter_mut().enumerate() {
            if file.stage == Stage::AlreadyProcessed {
                self.task.remove_source(index, file).await;
            }
        }
    }

    async fn check_dependencies(&self, files: &[MediaFile]) {
        let has_videos = files
            .iter()
            .any(|f| f.stage == Stage::Waiting && f.media_type == MediaType::Video);
        if !has_videos {
            return;
        }

        let missing = self.task.video_processor().missing_dependencies().await;
        if missing.is_empty() {
            debug!("Video tools available");
        } else {
            warn!("Missing video tools: {}", missing.join(", "));
            self.tracker.log(format!(
                "Missing external tools: {}. Videos will fail to convert",
                missing.join(", ")
            ));
        }
    }
}
