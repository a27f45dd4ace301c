//! A cancellation signal shared between a caller and the ledger's background
//! tasks.

use tokio::sync::watch;

/// Create a linked [CancellationHandle] and [Cancellation].
///
/// Clones of the [Cancellation] all observe the same handle.
pub fn cancellation() -> (CancellationHandle, Cancellation) {
    let (sender, receiver) = watch::channel(false);

    (CancellationHandle { sender }, Cancellation { receiver })
}

/// The sending half of a cancellation signal.
#[derive(Debug)]
pub struct CancellationHandle {
    sender: watch::Sender<bool>,
}

impl CancellationHandle {
    /// Signal every linked [Cancellation].
    ///
    /// Cancelling more than once has no further effect.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// The receiving half of a cancellation signal.
#[derive(Debug, Clone)]
pub struct Cancellation {
    receiver: watch::Receiver<bool>,
}

impl Cancellation {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_handle, cancellation) = cancellation();

        cancellation
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until the signal fires.
    ///
    /// If the handle is dropped without cancelling, this never completes.
    pub async fn cancelled(&mut self) {
        let fired = self
            .receiver
            .wait_for(|cancelled| *cancelled)
            .await
            .map(|_| ());

        if fired.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
