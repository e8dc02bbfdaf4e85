//! # Optimizer Module
//!
//! L'orchestratore separato in sottomoduli:
//! - `media_optimizer`: Run completo (scan, diff, pulizia, ciclo sui file)
//! - `task_optimizer`: Pipeline di un singolo file
//! - `progress_tracker`: Notifiche verso il display
//! - `path_resolver`: Path sorgente, temporaneo e finale

pub mod media_optimizer;
pub mod path_resolver;
pub mod progress_tracker;
pub mod task_optimizer;

pub use media_optimizer::{MediaOptimizer, RunReport};
pub use path_resolver::PathResolver;
pub use progress_tracker::ProgressTracker;
pub use task_optimizer::TaskOptimizer;
