//! Lifecycle-bound permission repository.
//!
//! [`PermissionStateRepo`] hosts one capability's [`PermissionState`]
//! behind a single-consumer command loop, the same shape as a manager
//! task owning shared state behind a command queue: every mutation
//! (observer attach/detach, event folding, explicit transitions) flows
//! through the loop, so transitions are serialized by construction and
//! never computed off a stale state.
//!
//! # Cold Activation
//!
//! The repository is cold: the capability manager is constructed lazily
//! when the first observer attaches, monitoring starts and stops as the
//! observer count crosses zero, and the manager is parked (not
//! destroyed) when the last observer detaches. Entry/exit actions fire
//! exactly once per transition, exit before entry.
//!
//! # Observation
//!
//! State is published two ways:
//!
//! - a `watch` channel for the synchronous latest value
//!   ([`RepoHandle::current_state`]) and for [`RepoHandle::request`]'s
//!   wait loop
//! - a `broadcast` channel so a [`StateObserver`] sees every published
//!   transition in order, not only the latest value
//!
//! Publishing never blocks on observers.

use crate::config::MonitorConfig;
use crate::error::RepoError;
use capstate_core::{ManagerBuilder, PermissionEvent, PermissionEventEmitter, PermissionState, StateKind};
use capstate_types::Capability;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Capacity of the per-repository state broadcast.
///
/// An observer that falls more than this many transitions behind loses
/// the oldest values (broadcast lag semantics). Permission state changes
/// are rare; 64 is generous.
const STATE_BUFFER_SIZE: usize = 64;

/// Boxed transition applied through [`RepoHandle::take_and_change_state`].
///
/// Returning `None` keeps the current state (explicit identity).
type StateTransition = Box<dyn FnOnce(&PermissionState) -> Option<PermissionState> + Send>;

/// Commands processed by the repository loop.
enum RepoCommand {
    /// An observer attaches. Replied to after the activation transition
    /// (if any) has been published, with a subscription that will see
    /// every state published from that point on.
    Attach {
        reply: oneshot::Sender<broadcast::Receiver<PermissionState>>,
    },
    /// An observer detaches. Fire-and-forget so guards can send from
    /// `Drop`.
    Detach,
    /// Trigger the platform prompt if the state still allows one.
    Request,
    /// Apply an explicit transition, serialized with event folding.
    Transition {
        f: StateTransition,
        reply: oneshot::Sender<PermissionState>,
    },
    /// Tear the repository down.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Input multiplexed by the repository loop.
enum Input {
    Command(Option<RepoCommand>),
    Event(Option<PermissionEvent>),
}

/// The repository actor. Owns the state and the only paths that mutate it.
///
/// Create with [`PermissionStateRepo::new`] and drive with
/// [`run`](Self::run), or use [`spawn`](Self::spawn) to do both.
pub struct PermissionStateRepo {
    capability: Capability,
    builder: ManagerBuilder,
    interval: Duration,
    observers: usize,
    state_tx: watch::Sender<PermissionState>,
    stream_tx: broadcast::Sender<PermissionState>,
    command_rx: mpsc::UnboundedReceiver<RepoCommand>,
    /// Manager event stream; `Some` from first activation until teardown.
    events: Option<mpsc::UnboundedReceiver<PermissionEvent>>,
}

impl PermissionStateRepo {
    /// Creates a repository in `Uninitialized` state.
    ///
    /// Returns the actor and a handle. The actor does nothing until
    /// [`run`](Self::run) is awaited.
    #[must_use]
    pub fn new(
        capability: Capability,
        builder: ManagerBuilder,
        config: &MonitorConfig,
    ) -> (Self, RepoHandle) {
        let (state_tx, state_rx) = watch::channel(PermissionState::Uninitialized);
        let (stream_tx, _) = broadcast::channel(STATE_BUFFER_SIZE);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let repo = Self {
            capability: capability.clone(),
            builder,
            interval: config.interval(),
            observers: 0,
            state_tx,
            stream_tx,
            command_rx,
            events: None,
        };
        let handle = RepoHandle {
            capability,
            commands: command_tx,
            state_rx,
        };
        (repo, handle)
    }

    /// Creates a repository and spawns its loop onto the current runtime.
    #[must_use]
    pub fn spawn(
        capability: Capability,
        builder: ManagerBuilder,
        config: &MonitorConfig,
    ) -> RepoHandle {
        let (repo, handle) = Self::new(capability, builder, config);
        tokio::spawn(repo.run());
        handle
    }

    /// Runs the command/event loop until shutdown or until every handle
    /// and observer is gone.
    pub async fn run(mut self) {
        info!(capability = %self.capability, "permission repository started");

        loop {
            let input = tokio::select! {
                cmd = self.command_rx.recv() => Input::Command(cmd),
                event = Self::next_event(&mut self.events) => Input::Event(event),
            };

            match input {
                Input::Command(Some(cmd)) => {
                    if !self.apply_command(cmd) {
                        break;
                    }
                }
                Input::Command(None) => {
                    // All handles and observer guards dropped.
                    debug!(capability = %self.capability, "all handles gone");
                    break;
                }
                Input::Event(Some(event)) => self.fold_event(event),
                Input::Event(None) => {
                    // The manager dropped its emitter; stop polling the
                    // closed stream but keep serving commands.
                    warn!(capability = %self.capability, "manager event stream ended");
                    self.events = None;
                }
            }
        }

        self.teardown();
        info!(capability = %self.capability, "permission repository stopped");
    }

    async fn next_event(
        events: &mut Option<mpsc::UnboundedReceiver<PermissionEvent>>,
    ) -> Option<PermissionEvent> {
        match events {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Applies one command. Returns `false` to stop the loop.
    fn apply_command(&mut self, cmd: RepoCommand) -> bool {
        match cmd {
            RepoCommand::Attach { reply } => {
                self.observers += 1;
                debug!(
                    capability = %self.capability,
                    observers = self.observers,
                    "observer attached"
                );
                // Subscribe before activating so the new observer's
                // stream starts with the activation transition.
                let subscription = self.stream_tx.subscribe();
                if self.observers == 1 {
                    self.activate();
                }
                let _ = reply.send(subscription);
                true
            }

            RepoCommand::Detach => {
                self.observers = self.observers.saturating_sub(1);
                debug!(
                    capability = %self.capability,
                    observers = self.observers,
                    "observer detached"
                );
                if self.observers == 0 {
                    self.deactivate();
                }
                true
            }

            RepoCommand::Request => {
                let state = self.state_tx.borrow().clone();
                if let PermissionState::DeniedRequestable { manager, .. } = &state {
                    manager.request_capability();
                } else {
                    debug!(
                        capability = %self.capability,
                        state = %state.kind(),
                        "request trigger skipped"
                    );
                }
                true
            }

            RepoCommand::Transition { f, reply } => {
                let current = self.state_tx.borrow().clone();
                if let Some(next) = f(&current) {
                    self.publish(next);
                }
                let _ = reply.send(self.state_tx.borrow().clone());
                true
            }

            RepoCommand::Shutdown { reply } => {
                // Park the state before acknowledging, so callers that
                // awaited the reply observe the final state.
                self.teardown();
                let _ = reply.send(());
                false
            }
        }
    }

    /// First observer arrived: enter `Initializing`.
    ///
    /// Constructs the manager on the very first activation; later
    /// activations reuse the instance retained by `Deinitialized`.
    fn activate(&mut self) {
        let current = self.state_tx.borrow().clone();
        let next = match &current {
            PermissionState::Uninitialized => {
                let (emitter, rx) = PermissionEventEmitter::new();
                let manager = (self.builder)(&self.capability, emitter);
                self.events = Some(rx);
                current.initialize(manager, self.interval)
            }
            PermissionState::Deinitialized { .. } => current.reinitialize(),
            _ => None,
        };

        if let Some(next) = next {
            self.publish(next);
        }
    }

    /// Last observer left: park in `Deinitialized`.
    fn deactivate(&mut self) {
        let current = self.state_tx.borrow().clone();
        if let Some(next) = current.deinitialize() {
            self.publish(next);
        }
    }

    /// Folds one manager event into a transition, in arrival order.
    fn fold_event(&mut self, event: PermissionEvent) {
        let current = self.state_tx.borrow().clone();
        match current.on_event(&event) {
            Some(next) => self.publish(next),
            None => debug!(
                capability = %self.capability,
                state = %current.kind(),
                %event,
                "event absorbed"
            ),
        }
    }

    /// Publishes a transition, firing exit/entry actions around it.
    ///
    /// Exit action of the old state runs before the entry action of the
    /// new one; transitions within the monitored chain fire neither.
    fn publish(&mut self, next: PermissionState) {
        let prev = self.state_tx.borrow().clone();

        if prev.is_monitored() && !next.is_monitored() {
            if let Some(manager) = prev.manager() {
                manager.stop_monitoring();
            }
        }

        debug!(
            capability = %self.capability,
            from = %prev.kind(),
            to = %next.kind(),
            "state transition"
        );
        self.state_tx.send_replace(next.clone());
        let _ = self.stream_tx.send(next.clone());

        if !prev.is_monitored() && next.is_monitored() {
            if let Some(manager) = next.manager() {
                manager.start_monitoring(self.interval);
            }
        }
    }

    /// Final teardown: stop monitoring and park the state.
    fn teardown(&mut self) {
        let current = self.state_tx.borrow().clone();
        if let Some(next) = current.deinitialize() {
            self.publish(next);
        }
    }
}

impl std::fmt::Debug for PermissionStateRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionStateRepo")
            .field("capability", &self.capability)
            .field("observers", &self.observers)
            .field("state", &self.state_tx.borrow().kind())
            .finish_non_exhaustive()
    }
}

/// Clone-able handle to a [`PermissionStateRepo`].
#[derive(Debug, Clone)]
pub struct RepoHandle {
    capability: Capability,
    commands: mpsc::UnboundedSender<RepoCommand>,
    state_rx: watch::Receiver<PermissionState>,
}

impl RepoHandle {
    /// The capability this repository tracks.
    #[must_use]
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Returns the latest published state synchronously.
    ///
    /// Safe to call from any context; after teardown it keeps returning
    /// the final state.
    #[must_use]
    pub fn current_state(&self) -> PermissionState {
        self.state_rx.borrow().clone()
    }

    /// Attaches an observer.
    ///
    /// The first observer activates the repository
    /// (`Uninitialized`/`Deinitialized` → `Initializing`); the returned
    /// observer sees that transition and every one after it. Dropping
    /// the observer detaches; the last detach deactivates.
    ///
    /// # Errors
    ///
    /// [`RepoError::Closed`] when the repository has been torn down.
    pub async fn observe(&self) -> Result<StateObserver, RepoError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(RepoCommand::Attach { reply: reply_tx })
            .map_err(|_| RepoError::Closed)?;
        let stream = reply_rx.await.map_err(|_| RepoError::Closed)?;

        Ok(StateObserver {
            state_rx: self.state_rx.clone(),
            stream,
            _guard: DetachGuard {
                commands: self.commands.clone(),
            },
        })
    }

    /// Drives the capability toward `Allowed` if possible.
    ///
    /// Attaches an internal observer for the duration of the call, so a
    /// cold repository activates, resolves, and deactivates around it.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` once the state settles in `Allowed`
    /// - `Ok(false)` once it settles in `DeniedLocked` (a normal
    ///   outcome, not an error)
    ///
    /// From `DeniedRequestable` the platform prompt is triggered once
    /// per observed state and the next resulting state awaited.
    ///
    /// # Errors
    ///
    /// [`RepoError::Closed`] when the repository is torn down while the
    /// call is waiting.
    pub async fn request(&self) -> Result<bool, RepoError> {
        let _observer = self.observe().await?;
        let mut state_rx = self.state_rx.clone();

        loop {
            let kind = state_rx.borrow().kind();
            match kind {
                StateKind::Allowed => return Ok(true),
                StateKind::DeniedLocked => return Ok(false),
                StateKind::DeniedRequestable => {
                    self.commands
                        .send(RepoCommand::Request)
                        .map_err(|_| RepoError::Closed)?;
                    state_rx.changed().await.map_err(|_| RepoError::Closed)?;
                }
                _ => {
                    state_rx.changed().await.map_err(|_| RepoError::Closed)?;
                }
            }
        }
    }

    /// Applies a transition atomically with respect to event folding and
    /// other explicit transitions.
    ///
    /// `f` receives the current state; returning `None` keeps it (the
    /// explicit identity). The new (or unchanged) state is returned
    /// after it has been durably published.
    ///
    /// # Errors
    ///
    /// [`RepoError::Closed`] when the repository has been torn down.
    pub async fn take_and_change_state<F>(&self, f: F) -> Result<PermissionState, RepoError>
    where
        F: FnOnce(&PermissionState) -> Option<PermissionState> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(RepoCommand::Transition {
                f: Box::new(f),
                reply: reply_tx,
            })
            .map_err(|_| RepoError::Closed)?;
        reply_rx.await.map_err(|_| RepoError::Closed)
    }

    /// Tears the repository down: stops monitoring, parks the state in
    /// `Deinitialized`, and fails pending waiters with
    /// [`RepoError::Closed`].
    ///
    /// Safe to call on a repository that was never activated, and safe
    /// to call twice.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(RepoCommand::Shutdown { reply: reply_tx })
            .is_err()
        {
            return; // already down
        }
        let _ = reply_rx.await;
    }
}

/// A live observation of one repository's state.
///
/// Holding a `StateObserver` keeps the repository active; dropping it
/// detaches (and the last detach deactivates). Dropping never blocks.
#[derive(Debug)]
pub struct StateObserver {
    state_rx: watch::Receiver<PermissionState>,
    stream: broadcast::Receiver<PermissionState>,
    _guard: DetachGuard,
}

impl StateObserver {
    /// The latest published state.
    #[must_use]
    pub fn current(&self) -> PermissionState {
        self.state_rx.borrow().clone()
    }

    /// Awaits the next published state, in publication order.
    ///
    /// Every transition published since this observer attached is
    /// delivered exactly once, oldest first. An observer that falls more
    /// than the buffer size behind loses the oldest values and resumes
    /// from the earliest retained one.
    ///
    /// # Errors
    ///
    /// [`RepoError::Closed`] when the repository has been torn down and
    /// the stream is drained.
    pub async fn next(&mut self) -> Result<PermissionState, RepoError> {
        loop {
            match self.stream.recv().await {
                Ok(state) => return Ok(state),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "state observer lagged; skipping to oldest retained");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(RepoError::Closed),
            }
        }
    }
}

/// Sends the detach command when an observer is dropped.
///
/// Uses the unbounded command sender so `Drop` never blocks.
#[derive(Debug)]
struct DetachGuard {
    commands: mpsc::UnboundedSender<RepoCommand>,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        let _ = self.commands.send(RepoCommand::Detach);
    }
}

impl std::fmt::Debug for RepoCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Attach { .. } => "Attach",
            Self::Detach => "Detach",
            Self::Request => "Request",
            Self::Transition { .. } => "Transition",
            Self::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}
