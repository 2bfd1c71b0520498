//! Capability registry facade.
//!
//! [`Permissions`] is the single entry point application code talks to:
//! it maps capabilities to manager builders, spawns one
//! [`PermissionStateRepo`] per capability on first use, and hands out
//! [`RepoHandle`]s for everything else.

use crate::config::MonitorConfig;
use crate::error::{RegistryError, RepoError};
use crate::repo::{PermissionStateRepo, RepoHandle, StateObserver};
use capstate_core::{ManagerBuilder, PermissionState};
use capstate_types::Capability;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};

/// Registry of capability repositories.
///
/// Builders are registered up front (typically at app startup, one per
/// platform capability); repositories are created lazily and cached, so
/// all callers asking for the same capability share one repository and
/// one manager instance.
///
/// All methods take `&self`; the registry is `Send + Sync` and meant to
/// be shared (for example in an `Arc`) across tasks.
pub struct Permissions {
    config: MonitorConfig,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Permissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Permissions")
            .field("config", &self.config)
            .field("registered", &inner.builders.len())
            .field("spawned", &inner.repos.len())
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    builders: HashMap<Capability, ManagerBuilder>,
    repos: HashMap<Capability, RepoHandle>,
}

impl Permissions {
    /// Creates an empty registry with `config` applied to every
    /// repository it spawns.
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Registers the manager builder for `capability`.
    ///
    /// The first registration wins; repositories already spawned keep
    /// the builder they were created with.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyRegistered`] if a builder for this
    /// capability exists.
    pub fn register(
        &self,
        capability: Capability,
        builder: ManagerBuilder,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.builders.contains_key(&capability) {
            return Err(RegistryError::AlreadyRegistered(capability));
        }
        debug!(%capability, "manager builder registered");
        inner.builders.insert(capability, builder);
        Ok(())
    }

    /// Returns `true` if a builder is registered for `capability`.
    #[must_use]
    pub fn is_registered(&self, capability: &Capability) -> bool {
        self.inner.lock().builders.contains_key(capability)
    }

    /// Returns the repository handle for `capability`, spawning the
    /// repository on first use.
    ///
    /// The spawned repository starts cold (`Uninitialized`); nothing
    /// touches the platform until an observer attaches.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] if no builder was registered.
    pub fn get(&self, capability: &Capability) -> Result<RepoHandle, RegistryError> {
        let mut inner = self.inner.lock();
        if let Some(handle) = inner.repos.get(capability) {
            return Ok(handle.clone());
        }

        let builder = inner
            .builders
            .get(capability)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(capability.clone()))?;

        info!(%capability, "spawning permission repository");
        let handle = PermissionStateRepo::spawn(capability.clone(), builder, &self.config);
        inner.repos.insert(capability.clone(), handle.clone());
        Ok(handle)
    }

    /// Latest published state for `capability`.
    ///
    /// Spawns the repository if needed but does not activate it; a
    /// never-observed capability reports `Uninitialized`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] if no builder was registered.
    pub fn current_state(&self, capability: &Capability) -> Result<PermissionState, RegistryError> {
        Ok(self.get(capability)?.current_state())
    }

    /// Attaches an observer to `capability`'s repository.
    ///
    /// See [`RepoHandle::observe`] for activation semantics.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] if no builder was registered, or
    /// a [`RegistryError::Repo`] wrapping the repository failure.
    pub async fn observe(&self, capability: &Capability) -> Result<StateObserver, RegistryError> {
        let handle = self.get(capability)?;
        handle
            .observe()
            .await
            .map_err(|source| Self::repo_error(capability, source))
    }

    /// Drives `capability` toward `Allowed`, prompting the user if the
    /// platform still permits a prompt.
    ///
    /// Returns `Ok(true)` when the capability ends up granted and
    /// `Ok(false)` when it ends up locked; both are normal outcomes.
    /// See [`RepoHandle::request`].
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] if no builder was registered, or
    /// a [`RegistryError::Repo`] wrapping the repository failure.
    pub async fn request(&self, capability: &Capability) -> Result<bool, RegistryError> {
        let handle = self.get(capability)?;
        handle
            .request()
            .await
            .map_err(|source| Self::repo_error(capability, source))
    }

    /// Tears down every spawned repository.
    ///
    /// Pending `request()` calls fail with a closed-repository error;
    /// builders stay registered, so a later [`get`](Self::get) spawns a
    /// fresh repository. Safe to call on an empty registry and safe to
    /// call twice.
    pub async fn clean(&self) {
        // Drain under the lock, await shutdowns outside it.
        let repos: Vec<(Capability, RepoHandle)> =
            self.inner.lock().repos.drain().collect();

        for (capability, handle) in repos {
            debug!(%capability, "shutting down permission repository");
            handle.shutdown().await;
        }
        info!("permission registry cleaned");
    }

    fn repo_error(capability: &Capability, source: RepoError) -> RegistryError {
        RegistryError::Repo {
            capability: capability.clone(),
            source,
        }
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstate_core::testing::mock_builder;
    use capstate_core::{PermissionEvent, StateKind};

    #[tokio::test]
    async fn register_rejects_duplicates() {
        let permissions = Permissions::default();
        let (builder, _probe) = mock_builder(|_| {});

        permissions
            .register(Capability::camera(), builder.clone())
            .unwrap();
        let err = permissions
            .register(Capability::camera(), builder)
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered(Capability::camera()));
    }

    #[tokio::test]
    async fn get_requires_registration() {
        let permissions = Permissions::default();
        let err = permissions.get(&Capability::camera()).unwrap_err();
        assert_eq!(err, RegistryError::NotRegistered(Capability::camera()));
    }

    #[tokio::test]
    async fn get_caches_one_repo_per_capability() {
        let permissions = Permissions::default();
        let (builder, probe) = mock_builder(|_| {});
        permissions
            .register(Capability::camera(), builder)
            .unwrap();

        let first = permissions.get(&Capability::camera()).unwrap();
        let second = permissions.get(&Capability::camera()).unwrap();

        let _a = first.observe().await.unwrap();
        let _b = second.observe().await.unwrap();
        // Both handles reach the same repository and the same manager.
        assert_eq!(probe.build_count(), 1);
    }

    #[tokio::test]
    async fn current_state_does_not_activate() {
        let permissions = Permissions::default();
        let (builder, probe) = mock_builder(|_| {});
        permissions
            .register(Capability::location(), builder)
            .unwrap();

        let state = permissions.current_state(&Capability::location()).unwrap();
        assert_eq!(state.kind(), StateKind::Uninitialized);
        assert_eq!(probe.build_count(), 0);
    }

    #[tokio::test]
    async fn request_through_facade() {
        let permissions = Permissions::default();
        let (builder, _probe) = mock_builder(|mock| {
            mock.respond_on_start(PermissionEvent::denied());
            mock.respond_on_request(PermissionEvent::granted());
        });
        permissions
            .register(Capability::microphone(), builder)
            .unwrap();

        assert!(permissions.request(&Capability::microphone()).await.unwrap());
    }

    #[tokio::test]
    async fn clean_then_respawn() {
        let permissions = Permissions::default();
        let (builder, probe) = mock_builder(|_| {});
        permissions
            .register(Capability::camera(), builder)
            .unwrap();

        let handle = permissions.get(&Capability::camera()).unwrap();
        let _observer = handle.observe().await.unwrap();
        permissions.clean().await;
        assert_eq!(handle.current_state().kind(), StateKind::Deinitialized);

        // Builders survive; a later get spawns a fresh repository with a
        // fresh manager.
        let fresh = permissions.get(&Capability::camera()).unwrap();
        let _observer = fresh.observe().await.unwrap();
        assert_eq!(probe.build_count(), 2);
    }

    #[tokio::test]
    async fn clean_on_empty_registry_is_safe() {
        let permissions = Permissions::default();
        permissions.clean().await;
        permissions.clean().await;
    }
}
