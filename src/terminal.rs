//! # Terminal Module
//!
//! Ascolto del tasto Escape e ripristino della modalità del terminale.
//!
//! ## Responsabilità:
//! - Salva gli attributi del terminale prima di qualsiasi lettura in raw mode
//! - Ascolta Escape su un thread dedicato con `console::Term::read_key`
//! - Ripristina gli attributi salvati alla chiusura, anche con la lettura
//!   ancora bloccata o quando il processo esce con `std::process::exit`
//!
//! `read_key` attiva la raw mode per tutta la durata della lettura e la
//! disattiva solo quando arriva un tasto.

use console::{Key, Term};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Terminal attributes captured before the listener starts
pub struct TerminalModes {
    #[cfg(unix)]
    saved: Option<(std::fs::File, nix::sys::termios::Termios)>,
}

impl TerminalModes {
    /// Nothing to restore
    pub fn none() -> Self {
        Self {
            #[cfg(unix)]
            saved: None,
        }
    }

    /// Capture the controlling terminal's attributes
    #[cfg(unix)]
    pub fn capture() -> Self {
        match std::fs::OpenOptions::new().read(true).write(true).open("/dev/tty") {
            Ok(tty) => Self::capture_from(tty),
            Err(e) => {
                debug!("No controlling terminal: {}", e);
                Self::none()
            }
        }
    }

    #[cfg(not(unix))]
    pub fn capture() -> Self {
        Self::none()
    }

    #[cfg(unix)]
    pub fn capture_from(tty: std::fs::File) -> Self {
        match nix::sys::termios::tcgetattr(&tty) {
            Ok(termios) => Self {
                saved: Some((tty, termios)),
            },
            Err(e) => {
                debug!("Could not read terminal settings: {}", e);
                Self::none()
            }
        }
    }

    /// Put the saved attributes back; safe to call more than once
    #[cfg(unix)]
    pub fn restore(&self) {
        use nix::sys::termios::{tcsetattr, SetArg};

        if let Some((tty, termios)) = &self.saved {
            if let Err(e) = tcsetattr(tty, SetArg::TCSANOW, termios) {
                warn!("Could not restore terminal settings: {}", e);
            }
        }
    }

    #[cfg(not(unix))]
    pub fn restore(&self) {}
}

impl Drop for TerminalModes {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Background Escape listener. Shutting it down (or dropping it) restores the
/// terminal even while the listening thread is still blocked on a read.
pub struct EscapeListener {
    shutdown: Arc<AtomicBool>,
    modes: TerminalModes,
}

impl EscapeListener {
    /// Start listening when `enabled` and stderr is a terminal. The receiver
    /// fires on Escape, or on Ctrl+C typed while the read holds raw mode.
    pub fn spawn(enabled: bool) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let term = Term::stderr();

        if !enabled || !term.is_term() {
            let listener = Self {
                shutdown,
                modes: TerminalModes::none(),
            };
            return (listener, rx);
        }

        let modes = TerminalModes::capture();
        let stop = shutdown.clone();
        std::thread::spawn(move || loop {
            let key = term.read_key();
            if stop.load(Ordering::SeqCst) {
                break;
            }
            match key {
                Ok(Key::Escape) => {
                    let _ = tx.send(());
                    break;
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    let _ = tx.send(());
                    break;
                }
                Err(e) => {
                    error!("Stopped listening for Escape: {}", e);
                    break;
                }
            }
        });

        (Self { shutdown, modes }, rx)
    }

    /// Stop reacting to keys and give the terminal back its saved settings
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.modes.restore();
    }
}

impl Drop for EscapeListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Resolves on Escape; never resolves when nobody is listening
pub async fn escape_pressed(rx: oneshot::Receiver<()>) {
    if rx.await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_disabled_listener_never_fires() {
        let (listener, rx) = EscapeListener::spawn(false);
        let waited = tokio::time::timeout(Duration::from_millis(50), escape_pressed(rx)).await;
        assert!(waited.is_err());
        listener.shutdown();
    }

    #[cfg(unix)]
    #[test]
    fn test_restore_undoes_raw_mode() {
        use nix::pty::{openpty, OpenptyResult};
        use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, LocalFlags, SetArg};

        let OpenptyResult { master: _master, slave } = openpty(None, None).unwrap();
        let tty = std::fs::File::from(slave);
        let check = tty.try_clone().unwrap();
        let cooked = LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG;
        assert!(tcgetattr(&check).unwrap().local_flags.contains(cooked));

        let modes = TerminalModes::capture_from(tty);

        let mut raw = tcgetattr(&check).unwrap();
        cfmakeraw(&mut raw);
        tcsetattr(&check, SetArg::TCSANOW, &raw).unwrap();
        assert!(!tcgetattr(&check).unwrap().local_flags.intersects(cooked));

        modes.restore();
        assert!(tcgetattr(&check).unwrap().local_flags.contains(cooked));

        tcsetattr(&check, SetArg::TCSANOW, &raw).unwrap();
        drop(modes);
        assert!(tcgetattr(&check).unwrap().local_flags.contains(cooked), "dropping restores too");
    }
}
