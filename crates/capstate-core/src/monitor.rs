//! Poll-based status detection for managers without push callbacks.
//!
//! Some platforms report permission changes only when asked. A
//! [`PollingMonitor`] runs the asking: a background task evaluates a
//! check closure on a fixed interval and forwards any resulting event to
//! the emitter. Start and stop are idempotent so manager implementations
//! can wire them straight into
//! [`CapabilityManager::start_monitoring`](crate::CapabilityManager::start_monitoring)
//! / [`stop_monitoring`](crate::CapabilityManager::stop_monitoring).

use crate::event::PermissionEvent;
use crate::manager::PermissionEventEmitter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Status check evaluated on every poll tick.
///
/// Return `Some(event)` to report a change, `None` when there is
/// nothing new to say. The closure decides its own change detection.
pub type StatusCheck = Arc<dyn Fn() -> Option<PermissionEvent> + Send + Sync>;

/// Idempotent polling loop for a capability manager.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use capstate_core::{PermissionEvent, PermissionEventEmitter, PollingMonitor};
///
/// let (emitter, _rx) = PermissionEventEmitter::new();
/// let monitor = PollingMonitor::new(
///     emitter,
///     Arc::new(|| Some(PermissionEvent::granted())),
/// );
///
/// monitor.start(Duration::from_secs(1));
/// monitor.start(Duration::from_secs(1)); // no-op, still one loop
/// monitor.stop();
/// monitor.stop(); // no-op
/// ```
pub struct PollingMonitor {
    emitter: PermissionEventEmitter,
    check: StatusCheck,
    stop: Mutex<Option<watch::Sender<()>>>,
}

impl std::fmt::Debug for PollingMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingMonitor")
            .field("emitter", &self.emitter)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl PollingMonitor {
    /// Creates a monitor that forwards `check` results to `emitter`.
    ///
    /// No task runs until [`start`](Self::start) is called.
    #[must_use]
    pub fn new(emitter: PermissionEventEmitter, check: StatusCheck) -> Self {
        Self {
            emitter,
            check,
            stop: Mutex::new(None),
        }
    }

    /// Starts the polling task.
    ///
    /// A no-op when a loop is already running; never creates a second
    /// one. Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration) {
        let mut stop = self.stop.lock();
        if stop.is_some() {
            debug!("polling monitor already running");
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(());
        let emitter = self.emitter.clone();
        let check = Arc::clone(&self.check);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately, giving a prompt initial poll.
            loop {
                tokio::select! {
                    changed = stop_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Some(event) = (check)() {
                            emitter.emit(event);
                        }
                    }
                }
            }
            debug!("polling monitor stopped");
        });

        *stop = Some(stop_tx);
    }

    /// Stops the polling task. A no-op while not running.
    pub fn stop(&self) {
        // Dropping the sender ends the loop on its next poll.
        self.stop.lock().take();
    }

    /// Returns `true` while the polling task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.stop.lock().is_some()
    }
}

impl Drop for PollingMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    const POLL: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn polls_and_emits() {
        let (emitter, mut rx) = PermissionEventEmitter::new();
        let monitor = PollingMonitor::new(emitter, Arc::new(|| Some(PermissionEvent::granted())));

        monitor.start(POLL);
        assert!(monitor.is_running());

        let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(event, PermissionEvent::granted());

        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let check_calls = Arc::clone(&calls);

        let (emitter, mut rx) = PermissionEventEmitter::new();
        let monitor = PollingMonitor::new(
            emitter,
            Arc::new(move || {
                check_calls.fetch_add(1, Ordering::SeqCst);
                Some(PermissionEvent::denied())
            }),
        );

        // A second start must not spawn a second loop. One stop() must
        // silence everything: a leaked loop would keep polling past it.
        monitor.start(POLL);
        monitor.start(POLL);

        let _ = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        monitor.stop();
        assert!(!monitor.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        while rx.try_recv().is_ok() {} // drain in-flight ticks
        let settled = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), settled);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (emitter, _rx) = PermissionEventEmitter::new();
        let monitor = PollingMonitor::new(emitter, Arc::new(|| None));

        monitor.stop(); // never started
        monitor.start(POLL);
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn none_results_emit_nothing() {
        let (emitter, mut rx) = PermissionEventEmitter::new();
        let monitor = PollingMonitor::new(emitter, Arc::new(|| None));

        monitor.start(POLL);
        tokio::time::sleep(Duration::from_millis(50)).await;
        monitor.stop();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn restart_after_stop() {
        let (emitter, mut rx) = PermissionEventEmitter::new();
        let monitor = PollingMonitor::new(emitter, Arc::new(|| Some(PermissionEvent::granted())));

        monitor.start(POLL);
        let _ = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        monitor.stop();

        monitor.start(POLL);
        assert!(monitor.is_running());
        let event = timeout(WAIT, rx.recv()).await.unwrap();
        assert!(event.is_some());
        monitor.stop();
    }
}
