use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_QUIESCENCE_WINDOW: Duration = Duration::from_millis(100);

/// Emits the latest pushed value once `window` passes without another push.
///
/// At most one timer is alive per debouncer: every push aborts the pending
/// one before arming a new timer, and dropping the debouncer aborts it
/// without emitting.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    output: mpsc::UnboundedSender<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Must be called from within a tokio runtime before the first push.
    pub fn new(window: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (output, rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer {
            window,
            output,
            pending: None,
        };
        (debouncer, rx)
    }

    pub fn push(&mut self, value: T) {
        self.cancel();
        let output = self.output.clone();
        let window = self.window;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // The receiver may be gone if the consumer shut down first.
            let _ = output.send(value);
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
