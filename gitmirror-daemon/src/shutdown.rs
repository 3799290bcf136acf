//! Cooperative stop signal shared by every mirror task.

use tokio::sync::broadcast::{self, error::TryRecvError};

/// Listens for the process-wide stop broadcast.
///
/// Once a stop has been observed it stays observed. A closed channel counts as
/// a stop, so dropping the sender also ends every loop.
#[derive(Debug)]
pub struct Shutdown {
    triggered: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn new(notify: broadcast::Receiver<()>) -> Self {
        Self {
            triggered: false,
            notify,
        }
    }

    /// Non-blocking check.
    pub fn is_triggered(&mut self) -> bool {
        if !self.triggered {
            match self.notify.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Lagged(_)) | Err(TryRecvError::Closed) => {
                    self.triggered = true;
                }
            }
        }
        self.triggered
    }

    /// Wait until the stop signal is sent. Cancel-safe.
    pub async fn recv(&mut self) {
        if self.triggered {
            return;
        }
        let _ = self.notify.recv().await;
        self.triggered = true;
    }
}
