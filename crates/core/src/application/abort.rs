// Abort signal for a running sequence

use tokio::sync::watch;

/// Receiving side, polled by the sequence runner between ticks
#[derive(Clone)]
pub struct AbortToken {
    rx: watch::Receiver<bool>,
}

impl AbortToken {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once an abort is signalled (or the handle is dropped)
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Sending side, held by whoever may cancel the run
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn abort_channel() -> (AbortHandle, AbortToken) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortToken { rx })
}
