//! # Media Shrinker Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test
//!
//! ## Architettura dei moduli:
//! - `media`: Modello dati (`MediaFile`, stage, ordinamento)
//! - `catalog` / `resolver`: Scan delle directory e diff sorgente/destinazione
//! - `image_processor`: Riduzione immagini (JPEG/PNG) in memoria
//! - `video_processor`: Riduzione video (MP4) con ffprobe/ffmpeg
//! - `process_registry`: Processi figli del run, per la cancellazione
//! - `optimizer`: Orchestratore del run e pipeline per singolo file
//! - `stats`: Statistiche aggregate
//! - `updates` / `display` / `json_output`: Notifiche verso il display
//! - `terminal`: Ascolto di Escape e ripristino del terminale
//! - `config` / `error` / `file_manager` / `platform`: Infrastruttura
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use media_shrinker::{ChannelSink, Config, MediaOptimizer, ProcessRegistry};
//!
//! let (sink, rx) = ChannelSink::new();
//! let optimizer = MediaOptimizer::new(Config::default(), Arc::new(sink), ProcessRegistry::new())?;
//! let report = optimizer.run().await?;
//! ```

pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod media;
pub mod optimizer;
pub mod platform;
pub mod process_registry;
pub mod resolver;
pub mod stats;
pub mod terminal;
pub mod updates;
pub mod video_processor;

#[cfg(all(test, unix))]
mod test_support;

pub use catalog::MediaCatalog;
pub use config::Config;
pub use error::ShrinkError;
pub use media::{MediaFile, MediaType, SortKey, SortOrder, Stage};
pub use optimizer::{MediaOptimizer, RunReport};
pub use process_registry::ProcessRegistry;
pub use resolver::StageResolver;
pub use stats::ShrunkStats;
pub use updates::{ChannelSink, UiEvent, UpdateSink};
