//! # Process Registry
//!
//! Registro dei processi figli avviati da un singolo run.
//!
//! ## Responsabilità:
//! - Traccia i PID dei processi esterni (ffprobe/ffmpeg) ancora in esecuzione
//! - Su richiesta di cancellazione li termina forzatamente
//! - Notifica via broadcast le operazioni in corso, che smettono di attendere
//! - Dopo la cancellazione uccide subito ogni processo registrato in ritardo
//!
//! Il registro è posseduto dall'orchestratore e iniettato in ogni operazione:
//! due run nello stesso processo (ad esempio nei test) non interferiscono.

use crate::platform::PlatformCommands;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct ProcessRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    children: Mutex<Children>,
    stop: broadcast::Sender<()>,
}

#[derive(Default)]
struct Children {
    pids: HashMap<u32, String>,
    /// Set once by `kill_all`, never cleared
    cancelled: bool,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        let (stop, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(Inner {
                children: Mutex::new(Children::default()),
                stop,
            }),
        }
    }

    /// Track a spawned child until the returned guard is dropped. A child
    /// registered after `kill_all` is killed on the spot.
    pub fn register(&self, pid: u32, label: impl Into<String>) -> RegisteredProcess {
        let label = label.into();
        let mut children = self.children();
        if children.cancelled {
            drop(children);
            warn!("Run already cancelled, killing {} (pid {})", label, pid);
            kill(pid, &label);
        } else {
            debug!("Registered child process {} ({})", pid, label);
            children.pids.insert(pid, label);
        }
        RegisteredProcess {
            registry: self.clone(),
            pid,
        }
    }

    /// Receiver that fires when the run is cancelled
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.inner.stop.subscribe()
    }

    /// True once `kill_all` ran; no new child should be started
    pub fn is_cancelled(&self) -> bool {
        self.children().cancelled
    }

    pub fn running(&self) -> Vec<u32> {
        self.children().pids.keys().copied().collect()
    }

    /// Kill every registered child and tell in-flight operations to stop.
    /// Returns how many processes were signalled.
    pub fn kill_all(&self) -> usize {
        let children: Vec<(u32, String)> = {
            let mut children = self.children();
            children.cancelled = true;
            children.pids.drain().collect()
        };
        let _ = self.inner.stop.send(());

        for (pid, label) in &children {
            kill(*pid, label);
        }
        children.len()
    }

    fn children(&self) -> MutexGuard<'_, Children> {
        // A poisoned map is still a valid map of pids
        self.inner
            .children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn kill(pid: u32, label: &str) {
    match PlatformCommands::instance().kill_process(pid) {
        Ok(()) => info!("Killed {} (pid {})", label, pid),
        Err(e) => warn!("Could not kill {} (pid {}): {}", label, pid, e),
    }
}

/// Removes its pid from the registry when dropped
pub struct RegisteredProcess {
    registry: ProcessRegistry,
    pid: u32,
}

impl Drop for RegisteredProcess {
    fn drop(&mut self) {
        self.registry.children().pids.remove(&self.pid);
    }
}
