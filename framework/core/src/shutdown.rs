use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// Broadcasts a one-shot stop request to every test case that is running or waiting to run.
///
/// The request is sticky: listeners created after [ShutdownHandle::shutdown] was called still
/// observe it, so cases scheduled after a fail-fast stop are cancelled rather than started.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request shutdown. Calling this more than once has no further effect.
    pub fn shutdown(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.sender.send(()) {
            // Nobody is subscribed, the sticky flag is enough for later listeners.
            log::trace!("No listeners for shutdown signal: {e:?}");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe(), self.triggered.clone())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
    triggered: Arc<AtomicBool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>, triggered: Arc<AtomicBool>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            triggered,
        }
    }

    /// Point in time check for whether shutdown has been requested.
    pub fn should_shutdown(&mut self) -> bool {
        if self.triggered.load(Ordering::SeqCst) {
            return true;
        }

        match self.receiver.try_lock() {
            Ok(mut guard) => match guard.try_recv() {
                Ok(_) => true,
                Err(tokio::sync::broadcast::error::TryRecvError::Closed) => true,
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// Wait until shutdown is requested. Safe to race against other futures with `tokio::select!`
    /// so that a running test case can be cancelled.
    pub async fn wait_for_shutdown(&mut self) {
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }

        let mut receiver = self.receiver.lock().await;
        // A closed channel means the handle is gone, which is treated as a shutdown too.
        let _ = receiver.recv().await;
    }

    /// Drive `fut` to completion unless shutdown is requested first.
    pub async fn cancellable<F: Future>(
        &mut self,
        fut: F,
    ) -> Result<F::Output, ShutdownSignalError> {
        tokio::select! {
            output = fut => Ok(output),
            _ = self.wait_for_shutdown() => Err(ShutdownSignalError::default()),
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn listener_sees_shutdown_requested_before_it_was_created() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let mut listener = handle.new_listener();
        assert!(listener.should_shutdown());
        assert!(handle.is_shutdown());
    }

    #[test]
    fn listener_not_shutdown_by_default() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();
        assert!(!listener.should_shutdown());
    }

    #[tokio::test]
    async fn wait_for_shutdown_wakes_on_signal() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.shutdown();
        });

        tokio::time::timeout(Duration::from_secs(5), listener.wait_for_shutdown())
            .await
            .expect("listener was not woken by shutdown");
    }

    #[tokio::test]
    async fn cancellable_completes_without_shutdown() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let result = listener.cancellable(async { 7 }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancellable_is_cut_short_by_shutdown() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();
        handle.shutdown();

        let result = listener.cancellable(std::future::pending::<()>()).await;
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Execution cancelled by shutdown signal");
    }

    #[test]
    fn repeated_shutdown_is_harmless() {
        let handle = ShutdownHandle::new();
        handle.shutdown();
        handle.shutdown();
        assert!(handle.is_shutdown());
    }
}
