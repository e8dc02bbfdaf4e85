//! # Update Channel
//!
//! Contratto tra l'orchestratore e il display esterno.
//!
//! ## Responsabilità:
//! - `notify`: invia uno snapshot immutabile dello stato (mai bloccante)
//! - `log`: aggiunge una riga leggibile al log che il display può mostrare
//!
//! Il display non legge mai la lista dei file dell'orchestratore: riceve copie
//! via canale e mantiene la propria vista. Nessuno stato condiviso mutabile.

use crate::media::MediaFile;
use crate::stats::ShrunkStats;
use tokio::sync::mpsc;

/// Immutable snapshot sent to the display
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Whole run snapshot, sent once after scan and diff
    Catalog(Vec<MediaFile>),
    /// New state of the file at `index` in the catalog
    File { index: usize, file: MediaFile },
    Log(String),
    /// Final stats; no more events follow
    Finished(ShrunkStats),
}

/// Receiver side of the display contract. Implementations must never block
/// the caller.
pub trait UpdateSink: Send + Sync {
    fn notify(&self, event: UiEvent);

    fn log(&self, message: String) {
        self.notify(UiEvent::Log(message));
    }
}

/// Delivers events over an unbounded channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UpdateSink for ChannelSink {
    fn notify(&self, event: UiEvent) {
        // A display that went away must not stop the run
        let _ = self.tx.send(event);
    }
}

/// Discards every event
pub struct NullSink;

impl UpdateSink for NullSink {
    fn notify(&self, _event: UiEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        let file = MediaFile::new("/src", "a.mp4", MediaType::Video, 10);

        sink.notify(UiEvent::Catalog(vec![file.clone()]));
        sink.log("hello".to_string());
        sink.notify(UiEvent::File { index: 0, file });

        assert!(matches!(rx.try_recv(), Ok(UiEvent::Catalog(files)) if files.len() == 1));
        assert!(matches!(rx.try_recv(), Ok(UiEvent::Log(message)) if message == "hello"));
        assert!(matches!(rx.try_recv(), Ok(UiEvent::File { index: 0, .. })));
    }

    #[test]
    fn test_closed_display_does_not_block_or_panic() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.log("nobody listens".to_string());
        NullSink.log("nor here".to_string());
    }
}
