//! Test doubles for the capability manager contract.
//!
//! [`MockCapabilityManager`] records every contract call with atomic
//! counters and keeps its emitter so tests script event delivery. It is
//! a normal public module (not `cfg(test)`) so downstream crates can use
//! it from their own test suites.

use crate::event::PermissionEvent;
use crate::manager::{CapabilityManager, ManagerBuilder, PermissionEventEmitter};
use capstate_types::Capability;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Recording mock for [`CapabilityManager`].
///
/// # Example
///
/// ```
/// use capstate_core::testing::MockCapabilityManager;
/// use capstate_core::{CapabilityManager, PermissionEventEmitter};
/// use std::time::Duration;
///
/// let (emitter, mut rx) = PermissionEventEmitter::new();
/// let mock = MockCapabilityManager::new(emitter);
///
/// mock.start_monitoring(Duration::from_secs(1));
/// assert_eq!(mock.start_calls(), 1);
/// assert!(mock.is_monitoring());
///
/// mock.emitter().grant();
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Debug)]
pub struct MockCapabilityManager {
    emitter: PermissionEventEmitter,
    request_calls: AtomicUsize,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    monitoring: AtomicBool,
    /// Event emitted automatically when monitoring starts (initial status).
    initial_event: Mutex<Option<PermissionEvent>>,
    /// Event emitted automatically on each `request_capability` call.
    request_response: Mutex<Option<PermissionEvent>>,
}

impl MockCapabilityManager {
    /// Creates a mock bound to `emitter`.
    #[must_use]
    pub fn new(emitter: PermissionEventEmitter) -> Arc<Self> {
        Arc::new(Self {
            emitter,
            request_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            monitoring: AtomicBool::new(false),
            initial_event: Mutex::new(None),
            request_response: Mutex::new(None),
        })
    }

    /// Schedules an event to emit when monitoring starts.
    ///
    /// Simulates a platform that reports the initial status as soon as
    /// detection begins.
    pub fn respond_on_start(&self, event: PermissionEvent) {
        *self.initial_event.lock() = Some(event);
    }

    /// Schedules an event to emit on every `request_capability` call.
    ///
    /// Simulates a user answering the prompt.
    pub fn respond_on_request(&self, event: PermissionEvent) {
        *self.request_response.lock() = Some(event);
    }

    /// The emitter this mock reports through.
    #[must_use]
    pub fn emitter(&self) -> &PermissionEventEmitter {
        &self.emitter
    }

    /// Number of `request_capability` calls observed.
    #[must_use]
    pub fn request_calls(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }

    /// Number of `start_monitoring` calls observed.
    #[must_use]
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Number of `stop_monitoring` calls observed.
    #[must_use]
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Returns `true` between a start and the next stop.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }
}

impl CapabilityManager for MockCapabilityManager {
    fn request_capability(&self) {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(event) = *self.request_response.lock() {
            self.emitter.emit(event);
        }
    }

    fn start_monitoring(&self, _interval: Duration) {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.monitoring.store(true, Ordering::SeqCst);
        if let Some(event) = *self.initial_event.lock() {
            self.emitter.emit(event);
        }
    }

    fn stop_monitoring(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.monitoring.store(false, Ordering::SeqCst);
    }
}

/// Probe into managers produced by [`mock_builder`].
///
/// Lets a test reach the mock instance a repository constructed
/// internally, and count how many times the builder ran.
#[derive(Debug, Clone)]
pub struct MockProbe {
    built: Arc<Mutex<Vec<Arc<MockCapabilityManager>>>>,
}

impl MockProbe {
    /// The most recently built manager, if any.
    #[must_use]
    pub fn manager(&self) -> Option<Arc<MockCapabilityManager>> {
        self.built.lock().last().cloned()
    }

    /// How many times the builder has been invoked.
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.built.lock().len()
    }
}

/// Creates a [`ManagerBuilder`] producing recording mocks, plus a probe
/// observing every instance it builds.
///
/// `configure` runs on each new mock before it is handed to the
/// repository, so tests can script start/request responses up front.
#[must_use]
pub fn mock_builder(
    configure: impl Fn(&MockCapabilityManager) + Send + Sync + 'static,
) -> (ManagerBuilder, MockProbe) {
    let built = Arc::new(Mutex::new(Vec::new()));
    let probe = MockProbe {
        built: Arc::clone(&built),
    };

    let builder: ManagerBuilder = Arc::new(move |_capability: &Capability, emitter| {
        let mock = MockCapabilityManager::new(emitter);
        configure(&mock);
        built.lock().push(Arc::clone(&mock));
        let manager: Arc<dyn CapabilityManager> = mock;
        manager
    });

    (builder, probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_records_calls() {
        let (emitter, _rx) = PermissionEventEmitter::new();
        let mock = MockCapabilityManager::new(emitter);

        mock.request_capability();
        mock.start_monitoring(Duration::from_secs(1));
        mock.stop_monitoring();

        assert_eq!(mock.request_calls(), 1);
        assert_eq!(mock.start_calls(), 1);
        assert_eq!(mock.stop_calls(), 1);
        assert!(!mock.is_monitoring());
    }

    #[test]
    fn respond_on_start_emits_initial_status() {
        let (emitter, mut rx) = PermissionEventEmitter::new();
        let mock = MockCapabilityManager::new(emitter);
        mock.respond_on_start(PermissionEvent::denied());

        mock.start_monitoring(Duration::from_secs(1));
        assert_eq!(rx.try_recv().unwrap(), PermissionEvent::denied());
    }

    #[test]
    fn respond_on_request_emits_answer() {
        let (emitter, mut rx) = PermissionEventEmitter::new();
        let mock = MockCapabilityManager::new(emitter);
        mock.respond_on_request(PermissionEvent::granted());

        mock.request_capability();
        assert_eq!(rx.try_recv().unwrap(), PermissionEvent::granted());
    }

    #[test]
    fn builder_feeds_probe() {
        let (builder, probe) = mock_builder(|_| {});
        assert_eq!(probe.build_count(), 0);
        assert!(probe.manager().is_none());

        let (emitter, _rx) = PermissionEventEmitter::new();
        let capability = Capability::camera();
        let manager = builder(&capability, emitter);

        assert_eq!(probe.build_count(), 1);
        let seen: Arc<dyn CapabilityManager> = probe.manager().unwrap();
        assert!(Arc::ptr_eq(&seen, &manager));
    }
}
