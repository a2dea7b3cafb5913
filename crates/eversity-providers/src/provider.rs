//! Provider trait definition.
//!
//! A [`Provider`] is one integration with a school information system. It
//! describes itself once, answers [`EntityQuery`]s with data model values,
//! and optionally accepts [`Submission`]s. The lifecycle hooks let the
//! registry prepare and release integration resources.

use std::future::Future;
use std::pin::Pin;

use eversity_core::ProviderDescriptor;

use crate::error::{ProviderError, ProviderResult};
use crate::query::{Acknowledgement, Entity, EntityQuery, Submission};

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe, so a registry can hold
/// `Arc<dyn Provider>` values of different types.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The contract every integration implements.
///
/// # Example Implementation
///
/// ```ignore
/// struct SchoolsBy {
///     client: reqwest::Client,
/// }
///
/// impl Provider for SchoolsBy {
///     fn describe(&self) -> ProviderDescriptor {
///         ProviderDescriptor::new(ProviderId::new("schools-by")?, "Schools.by", "1.0.0", "Eversity")
///             .with_capability(Capability::FETCH_ROSTER)
///     }
///
///     fn fetch(&self, query: EntityQuery) -> BoxFuture<'_, ProviderResult<Vec<Entity>>> {
///         Box::pin(async move {
///             // Scrape and convert upstream pages
///             Ok(entities)
///         })
///     }
/// }
/// ```
pub trait Provider: Send + Sync {
    /// Returns the provider's self-description.
    ///
    /// Must be cheap, must not fail, and must return the same value every
    /// time it is called.
    fn describe(&self) -> ProviderDescriptor;

    /// Answers a query.
    ///
    /// Only called with queries whose capability the descriptor declares.
    fn fetch(&self, query: EntityQuery) -> BoxFuture<'_, ProviderResult<Vec<Entity>>>;

    /// Accepts a write.
    ///
    /// The default implementation reports the operation as unsupported.
    fn submit(&self, submission: Submission) -> BoxFuture<'_, ProviderResult<Acknowledgement>> {
        let capability = submission.capability();
        Box::pin(async move {
            Err(ProviderError::capability_mismatch(format!(
                "`{capability}` is not supported by this provider"
            )))
        })
    }

    /// Called once when the provider is added to a registry.
    fn on_load(&self) -> ProviderResult<()> {
        Ok(())
    }

    /// Called when the registry starts.
    fn on_start(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Called when the provider is deregistered, before [`Provider::on_unload`].
    fn on_stop(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Called last, after the registry has stopped routing calls here.
    fn on_unload(&self) {}
}

/// A provider that always returns an error.
///
/// Used as a placeholder when an integration fails to initialize, so a
/// registry still has an entry to report on.
#[derive(Debug)]
pub struct ErrorProvider {
    descriptor: ProviderDescriptor,
    error: ProviderError,
}

impl ErrorProvider {
    /// Creates a new error provider.
    pub fn new(descriptor: ProviderDescriptor, error: ProviderError) -> Self {
        Self { descriptor, error }
    }

    fn error(&self) -> ProviderError {
        self.error.detached().with_provider(&self.descriptor.id)
    }
}

impl Provider for ErrorProvider {
    fn describe(&self) -> ProviderDescriptor {
        self.descriptor.clone()
    }

    fn fetch(&self, _query: EntityQuery) -> BoxFuture<'_, ProviderResult<Vec<Entity>>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn submit(&self, _submission: Submission) -> BoxFuture<'_, ProviderResult<Acknowledgement>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn on_start(&self) -> BoxFuture<'_, ProviderResult<()>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }
}
