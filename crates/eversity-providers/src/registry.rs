//! Provider registry and per-registration health.
//!
//! A [`ProviderRegistry`] is built once from a [`RegistryBuilder`] and never
//! changes shape afterwards; [`ProviderRegistry::reregister`] returns a new
//! registry instead. Each registration moves through
//!
//! ```text
//! Registered -> Active <-> Degraded
//!      \           |          /
//!       `----> Deregistered <'
//! ```
//!
//! - a successful call (or start hook) moves `Registered`/`Degraded` to `Active`
//! - `degraded_after` consecutive `Unavailable` failures move `Active` to
//!   `Degraded`; other error kinds neither count nor reset the counter
//! - `Deregistered` is terminal and every later call fails fast
//!
//! Health lives behind a `tokio::sync::RwLock` that is only held for
//! bookkeeping, never across a call into the integration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eversity_core::{Capability, ProviderDescriptor, ProviderId, Validate};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::provider::Provider;
use crate::query::{Acknowledgement, Entity, EntityQuery, Submission};

/// Lifecycle state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    /// Added to the registry, not yet started or used successfully.
    Registered,
    Active,
    /// Failing with `Unavailable`; still routed to.
    Degraded,
    /// Removed; terminal.
    Deregistered,
}

impl ProviderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Active => "active",
            Self::Degraded => "degraded",
            Self::Deregistered => "deregistered",
        }
    }

    /// Returns true if the registry routes calls to this registration.
    pub fn is_routable(&self) -> bool {
        !matches!(self, Self::Deregistered)
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time health of one registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub id: ProviderId,
    pub state: ProviderState,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Health {
    state: ProviderState,
    consecutive_failures: u32,
    last_error: Option<String>,
    last_success: Option<DateTime<Utc>>,
}

impl Health {
    fn new() -> Self {
        Self {
            state: ProviderState::Registered,
            consecutive_failures: 0,
            last_error: None,
            last_success: None,
        }
    }

    /// Returns the previous state if it changed.
    fn record_success(&mut self) -> Option<ProviderState> {
        if self.state == ProviderState::Deregistered {
            return None;
        }
        self.consecutive_failures = 0;
        self.last_success = Some(Utc::now());
        self.last_error = None;
        let previous = self.state;
        self.state = ProviderState::Active;
        (previous != ProviderState::Active).then_some(previous)
    }

    /// Returns true if the registration just became degraded.
    fn record_failure(&mut self, error: &ProviderError, degraded_after: u32) -> bool {
        if self.state == ProviderState::Deregistered {
            return false;
        }
        self.last_error = Some(error.to_string());
        if error.kind() != ProviderErrorKind::Unavailable {
            return false;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.state == ProviderState::Active && self.consecutive_failures >= degraded_after {
            self.state = ProviderState::Degraded;
            return true;
        }
        false
    }
}

struct Registration {
    id: ProviderId,
    descriptor: ProviderDescriptor,
    provider: Arc<dyn Provider>,
    health: RwLock<Health>,
}

impl Registration {
    fn load(provider: Arc<dyn Provider>) -> ProviderResult<Self> {
        let descriptor = provider.describe();
        let id = descriptor.id.clone();
        descriptor
            .validate()
            .map_err(|err| ProviderError::from(err).with_provider(&id))?;
        provider
            .on_load()
            .map_err(|err| ProviderError::classify(err).with_provider(&id))?;
        debug!(provider = %id, capabilities = descriptor.capabilities.len(), "Provider loaded");
        Ok(Self {
            id,
            descriptor,
            provider,
            health: RwLock::new(Health::new()),
        })
    }

    async fn state(&self) -> ProviderState {
        self.health.read().await.state
    }

    async fn ensure_routable(&self) -> ProviderResult<()> {
        if self.state().await.is_routable() {
            Ok(())
        } else {
            Err(ProviderError::unavailable("provider has been deregistered").with_provider(&self.id))
        }
    }

    fn ensure_capability(&self, capability: &Capability) -> ProviderResult<()> {
        if self.descriptor.supports(capability) {
            Ok(())
        } else {
            Err(ProviderError::capability_mismatch(format!(
                "`{capability}` is not declared by this provider"
            ))
            .with_provider(&self.id))
        }
    }

    async fn settle<T>(&self, result: ProviderResult<T>, degraded_after: u32) -> ProviderResult<T> {
        let mut health = self.health.write().await;
        match &result {
            Ok(_) => {
                if let Some(previous) = health.record_success() {
                    info!(provider = %self.id, from = %previous, "Provider active");
                }
            }
            Err(err) => {
                if health.record_failure(err, degraded_after) {
                    warn!(
                        provider = %self.id,
                        failures = health.consecutive_failures,
                        "Provider degraded"
                    );
                } else {
                    debug!(provider = %self.id, error = %err, "Provider call failed");
                }
            }
        }
        result
    }

    async fn shutdown(&self, deadline: Duration) -> ProviderResult<()> {
        {
            let mut health = self.health.write().await;
            if health.state == ProviderState::Deregistered {
                return Ok(());
            }
            health.state = ProviderState::Deregistered;
        }
        info!(provider = %self.id, "Provider deregistered");

        let stopped = match tokio::time::timeout(deadline, self.provider.on_stop()).await {
            Ok(result) => result,
            Err(elapsed) => Err(ProviderError::from(elapsed)),
        };
        self.provider.on_unload();
        stopped.map_err(|err| {
            let err = ProviderError::classify(err).with_provider(&self.id);
            warn!(provider = %self.id, error = %err, "Provider stop hook failed");
            err
        })
    }

    async fn status(&self) -> RegistrationStatus {
        let health = self.health.read().await;
        RegistrationStatus {
            id: self.id.clone(),
            state: health.state,
            consecutive_failures: health.consecutive_failures,
            last_error: health.last_error.clone(),
            last_success: health.last_success,
        }
    }
}

/// Collects providers into a [`ProviderRegistry`].
pub struct RegistryBuilder {
    config: RegistryConfig,
    registrations: BTreeMap<ProviderId, Arc<Registration>>,
}

impl RegistryBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            registrations: BTreeMap::new(),
        }
    }

    /// Adds a provider, running its load hook.
    ///
    /// Fails if another provider already uses the same id.
    pub fn register<P: Provider + 'static>(self, provider: P) -> ProviderResult<Self> {
        self.register_shared(Arc::new(provider))
    }

    /// Adds a shared provider, running its load hook.
    pub fn register_shared(mut self, provider: Arc<dyn Provider>) -> ProviderResult<Self> {
        let id = provider.describe().id;
        if self.registrations.contains_key(&id) {
            return Err(ProviderError::capability_mismatch(format!(
                "provider id `{id}` is already registered"
            )));
        }
        let registration = Registration::load(provider)?;
        self.registrations.insert(id, Arc::new(registration));
        Ok(self)
    }

    /// Finishes the registry.
    pub fn build(self) -> ProviderResult<ProviderRegistry> {
        self.config
            .validate()
            .map_err(|err| ProviderError::capability_mismatch(err.to_string()).with_source(err))?;
        info!(providers = self.registrations.len(), "Provider registry built");
        Ok(ProviderRegistry {
            config: self.config,
            registrations: self.registrations,
        })
    }
}

/// The set of registered providers.
///
/// Cloning is cheap and clones share registrations and their health.
#[derive(Clone)]
pub struct ProviderRegistry {
    config: RegistryConfig,
    registrations: BTreeMap<ProviderId, Arc<Registration>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("config", &self.config)
            .field("providers", &self.registrations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    /// Starts building a registry.
    pub fn builder(config: RegistryConfig) -> RegistryBuilder {
        RegistryBuilder::new(config)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the registered ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &ProviderId> {
        self.registrations.keys()
    }

    fn registration(&self, id: &ProviderId) -> ProviderResult<&Arc<Registration>> {
        self.registrations.get(id).ok_or_else(|| {
            ProviderError::unavailable(format!("no provider registered as `{id}`"))
        })
    }

    /// Returns the descriptor declared at registration.
    pub fn descriptor(&self, id: &ProviderId) -> ProviderResult<&ProviderDescriptor> {
        Ok(&self.registration(id)?.descriptor)
    }

    /// Returns the state of a registration.
    pub async fn state(&self, id: &ProviderId) -> ProviderResult<ProviderState> {
        Ok(self.registration(id)?.state().await)
    }

    /// Runs the start hook of one provider.
    ///
    /// Started providers are left alone. On failure the registration stays
    /// `Registered` and the classified error is returned.
    pub async fn start(&self, id: &ProviderId) -> ProviderResult<()> {
        let registration = self.registration(id)?;
        match registration.state().await {
            ProviderState::Registered => {}
            ProviderState::Active | ProviderState::Degraded => return Ok(()),
            ProviderState::Deregistered => return registration.ensure_routable().await,
        }

        let result = match tokio::time::timeout(self.config.start_deadline, registration.provider.on_start()).await
        {
            Ok(result) => result,
            Err(elapsed) => Err(ProviderError::from(elapsed)),
        }
        .map_err(|err| ProviderError::classify(err).with_provider(id));

        if let Err(err) = &result {
            warn!(provider = %id, error = %err, "Provider failed to start");
        }
        registration
            .settle(result, self.config.degraded_after)
            .await
    }

    /// Starts every provider concurrently and returns the failures.
    pub async fn start_all(&self) -> Vec<ProviderError> {
        let results = join_all(self.registrations.keys().map(|id| self.start(id))).await;
        results.into_iter().filter_map(Result::err).collect()
    }

    /// Fetches entities from a provider.
    ///
    /// `deadline` falls back to the configured default. Every returned
    /// entity is validated, and one invalid entity fails the whole fetch.
    pub async fn fetch(
        &self,
        id: &ProviderId,
        query: EntityQuery,
        deadline: Option<Duration>,
    ) -> ProviderResult<Vec<Entity>> {
        let registration = self.registration(id)?;
        registration.ensure_routable().await?;
        let capability = query.capability();
        registration.ensure_capability(&capability)?;
        query
            .validate()
            .map_err(|err| ProviderError::from(err).with_provider(id))?;

        debug!(provider = %id, capability = %capability, "Fetching");
        let deadline = deadline.unwrap_or(self.config.default_deadline);
        let result = match tokio::time::timeout(deadline, registration.provider.fetch(query)).await {
            Ok(Ok(entities)) => check_entities(&registration.descriptor, entities),
            Ok(Err(err)) => Err(err),
            Err(elapsed) => Err(ProviderError::from(elapsed)),
        }
        .map_err(|err| ProviderError::classify(err).with_provider(id));

        registration
            .settle(result, self.config.degraded_after)
            .await
    }

    /// Sends a write to a provider.
    ///
    /// The provider must declare the submission's capability and be
    /// read-write.
    pub async fn submit(
        &self,
        id: &ProviderId,
        submission: Submission,
        deadline: Option<Duration>,
    ) -> ProviderResult<Acknowledgement> {
        let registration = self.registration(id)?;
        registration.ensure_routable().await?;
        let capability = submission.capability();
        registration.ensure_capability(&capability)?;
        if !registration.descriptor.is_writable() {
            return Err(ProviderError::capability_mismatch("provider is read-only").with_provider(id));
        }
        submission
            .validate()
            .map_err(|err| ProviderError::from(err).with_provider(id))?;

        debug!(provider = %id, capability = %capability, "Submitting");
        let deadline = deadline.unwrap_or(self.config.default_deadline);
        let result = match tokio::time::timeout(deadline, registration.provider.submit(submission)).await {
            Ok(result) => result,
            Err(elapsed) => Err(ProviderError::from(elapsed)),
        }
        .map_err(|err| ProviderError::classify(err).with_provider(id));

        registration
            .settle(result, self.config.degraded_after)
            .await
    }

    /// Deregisters a provider, running its stop and unload hooks.
    ///
    /// The registration is `Deregistered` once this returns, even when the
    /// stop hook fails. Deregistering twice is a no-op.
    pub async fn deregister(&self, id: &ProviderId) -> ProviderResult<()> {
        self.registration(id)?
            .shutdown(self.config.default_deadline)
            .await
    }

    /// Returns a registry where `provider` replaces the registration with
    /// the same id, sharing every other registration.
    ///
    /// The replaced registration is deregistered; a failing stop hook is
    /// logged and does not prevent the swap.
    pub async fn reregister(&self, provider: Arc<dyn Provider>) -> ProviderResult<ProviderRegistry> {
        let registration = Arc::new(Registration::load(provider)?);
        let id = registration.id.clone();

        let mut registrations = self.registrations.clone();
        if let Some(previous) = registrations.insert(id.clone(), registration) {
            if let Err(err) = previous.shutdown(self.config.default_deadline).await {
                debug!(provider = %id, error = %err, "Replaced provider did not stop cleanly");
            }
        }
        info!(provider = %id, "Provider re-registered");
        Ok(ProviderRegistry {
            config: self.config.clone(),
            registrations,
        })
    }

    /// Returns the routable providers declaring `capability`, in id order.
    pub async fn providers_with(&self, capability: &Capability) -> Vec<ProviderId> {
        let mut ids = Vec::new();
        for (id, registration) in &self.registrations {
            if registration.descriptor.supports(capability) && registration.state().await.is_routable() {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// Returns the health of every registration, in id order.
    pub async fn snapshot(&self) -> Vec<RegistrationStatus> {
        let mut statuses = Vec::with_capacity(self.registrations.len());
        for registration in self.registrations.values() {
            statuses.push(registration.status().await);
        }
        statuses
    }
}

fn check_entities(descriptor: &ProviderDescriptor, entities: Vec<Entity>) -> ProviderResult<Vec<Entity>> {
    for (index, entity) in entities.iter().enumerate() {
        if !descriptor.entity_kinds.is_empty() && !descriptor.entity_kinds.contains(&entity.kind()) {
            return Err(ProviderError::data_validation(format!(
                "entity {index} is a {} which this provider does not declare",
                entity.kind()
            )));
        }
        entity.validate().map_err(|err| {
            ProviderError::data_validation(format!("entity {index}: {err}")).with_source(err)
        })?;
    }
    Ok(entities)
}
