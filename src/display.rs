//! # Display Module
//!
//! Il collaboratore esterno che rende visibile lo stato del run.
//!
//! ## Responsabilità:
//! - `DisplayState`: copia locale della lista file, aggiornata dagli snapshot
//! - `TerminalDisplay`: barre `indicatif` (totale + file in corso) e log sopra le barre
//! - `JsonDisplay`: un `JsonMessage` per evento su stdout
//!
//! Il display consuma il canale finché l'orchestratore non lo chiude;
//! non tocca mai i dati dell'orchestratore.
//!
//! ## Visual feedback:
//! ```text
//! [00:01:12] [=========>------------------------------] 3/12 files
//!   clip.mp4 [##############>-------------------------] 37% 00:00:41
//! ```

use crate::config::Config;
use crate::json_output::JsonMessage;
use crate::media::{MediaFile, MediaType, Stage};
use crate::updates::UiEvent;
use crate::video_processor::format_time;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// What an event changed in the display state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Catalog,
    /// File entered `InProgress`
    Started(usize),
    /// New progress for the file in flight
    Progress(usize),
    /// File left `InProgress`
    Completed(usize),
    /// Any other change, e.g. a source deletion
    Changed(usize),
    Ignored,
}

/// The display's own view of the run
#[derive(Debug, Default)]
pub struct DisplayState {
    files: Vec<MediaFile>,
    queued: usize,
    completed: usize,
    active: Option<usize>,
}

impl DisplayState {
    pub fn apply(&mut self, event: &UiEvent) -> Transition {
        match event {
            UiEvent::Catalog(files) => {
                self.queued = files.iter().filter(|f| f.stage == Stage::Waiting).count();
                self.completed = 0;
                self.active = None;
                self.files = files.clone();
                Transition::Catalog
            }
            UiEvent::File { index, file } => {
                let Some(slot) = self.files.get_mut(*index) else {
                    return Transition::Ignored;
                };
                let previous = slot.stage;
                *slot = file.clone();

                match (previous, file.stage) {
                    (Stage::InProgress, Stage::InProgress) => Transition::Progress(*index),
                    (_, Stage::InProgress) => {
                        self.active = Some(*index);
                        Transition::Started(*index)
                    }
                    (Stage::InProgress, _) => {
                        self.completed += 1;
                        if self.active == Some(*index) {
                            self.active = None;
                        }
                        Transition::Completed(*index)
                    }
                    _ => Transition::Changed(*index),
                }
            }
            UiEvent::Log(_) | UiEvent::Finished(_) => Transition::Ignored,
        }
    }

    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    /// Files that were waiting when the catalog arrived
    pub fn queued(&self) -> usize {
        self.queued
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn active(&self) -> Option<&MediaFile> {
        self.active.and_then(|index| self.files.get(index))
    }
}

/// Anything that renders update events
pub trait View {
    fn handle(&mut self, event: UiEvent);

    fn close(&mut self) {}
}

/// Drive a view until the orchestrator drops its end of the channel
pub async fn render<V: View>(mut view: V, mut rx: mpsc::UnboundedReceiver<UiEvent>) {
    while let Some(event) = rx.recv().await {
        view.handle(event);
    }
    view.close();
}

/// Per-file bar text: name, encoded position for videos, wall time so far
pub fn file_label(file: &MediaFile) -> String {
    let elapsed = file.elapsed().map(|e| e.as_secs_f64()).unwrap_or_default();
    if file.media_type == MediaType::Video {
        format!(
            "{} {} (elapsed {})",
            file.name,
            format_time(file.processed_duration),
            format_time(elapsed)
        )
    } else {
        format!("{} (elapsed {})", file.name, format_time(elapsed))
    }
}

/// Progress bars on the terminal
pub struct TerminalDisplay {
    state: DisplayState,
    multi: MultiProgress,
    overall: ProgressBar,
    current: Option<ProgressBar>,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        Self {
            state: DisplayState::default(),
            multi,
            overall,
            current: None,
        }
    }

    fn println(&self, line: impl AsRef<str>) {
        // Fails only when the draw target is hidden
        let _ = self.multi.println(line);
    }

    fn start_file(&mut self, file: &MediaFile) {
        let bar = if file.media_type == MediaType::Video {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {msg} [{bar:40.green/white}] {pos}%")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            bar
        } else {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        };
        bar.set_message(file_label(file));

        let bar = self.multi.add(bar);
        if let Some(previous) = self.current.replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn finish_file(&mut self, file: &MediaFile) {
        if let Some(bar) = self.current.take() {
            bar.finish_and_clear();
        }
        self.overall.set_position(self.state.completed() as u64);

        if let Some(error) = &file.error {
            self.println(format!("{} {}: {}", style("✗").red(), file.name, style(error).red()));
        }
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl View for TerminalDisplay {
    fn handle(&mut self, event: UiEvent) {
        let transition = self.state.apply(&event);

        match transition {
            Transition::Catalog => {
                self.overall.set_length(self.state.queued() as u64);
                self.overall.set_position(0);
            }
            Transition::Started(index) | Transition::Progress(index) => {
                let Some(file) = self.state.files().get(index).cloned() else {
                    return;
                };
                if transition == Transition::Started(index) {
                    self.start_file(&file);
                }
                if let Some(bar) = &self.current {
                    if file.media_type == MediaType::Video {
                        bar.set_position(file.percentage.clamp(0.0, 100.0) as u64);
                    }
                    bar.set_message(file_label(&file));
                }
            }
            Transition::Completed(index) => {
                if let Some(file) = self.state.files().get(index).cloned() {
                    self.finish_file(&file);
                }
            }
            Transition::Changed(_) | Transition::Ignored => {}
        }

        match event {
            UiEvent::Log(message) => self.println(message),
            UiEvent::Finished(stats) => {
                self.overall
                    .finish_with_message(style(stats.shrunk_summary()).green().bold().to_string());
            }
            _ => {}
        }
    }

    fn close(&mut self) {
        if let Some(bar) = self.current.take() {
            bar.finish_and_clear();
        }
        if !self.overall.is_finished() {
            self.overall.abandon();
        }
    }
}

/// JSON lines on stdout
pub struct JsonDisplay {
    config: Config,
    started: Instant,
}

impl JsonDisplay {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            started: Instant::now(),
        }
    }

    pub fn message(&self, event: &UiEvent) -> JsonMessage {
        match event {
            UiEvent::Catalog(files) => JsonMessage::start(&self.config, files),
            UiEvent::File { index, file } => JsonMessage::file(*index, file),
            UiEvent::Log(message) => JsonMessage::log(message.clone()),
            UiEvent::Finished(stats) => JsonMessage::complete(stats, self.started.elapsed().as_secs_f64()),
        }
    }
}

impl View for JsonDisplay {
    fn handle(&mut self, event: UiEvent) {
        self.message(&event).emit();
    }
}
