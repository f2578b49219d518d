//! The provider owning a flag store for its mounted lifetime.

use tracing::debug;

use crate::compute::Computable;
use crate::consumer::Consumer;
use crate::store::{FlagStore, PublishOutcome, Subscription};
use crate::tree::{Path, Value};
use crate::Error;

/// Owns the [`FlagStore`] every consumer reads from.
///
/// Building the provider mounts a fresh store and publishes the initial
/// flag definitions. Each [`update`](Self::update) re-publishes. Dropping the
/// provider, or calling [`teardown`](Self::teardown), clears the store and
/// releases its subscribers.
///
/// ## Example
///
/// ```
/// use flagtree::{Computable, Consumer, FlagsProvider, Value};
///
/// let spec = Computable::table()
///     .with("feature_x", Computable::compute(|_| Ok(true.into())))
///     .with(
///         "nested",
///         Computable::table().with(
///             "feature_y",
///             Computable::compute(|scope| scope.value("feature_x")),
///         ),
///     );
///
/// let provider = FlagsProvider::builder().with_spec(spec).build()?;
///
/// assert_eq!(provider.flag(["nested", "feature_y"]), Some(Value::Bool(true)));
///
/// let banner = Consumer::builder().name("feature_x").children("on").build()?;
/// assert_eq!(provider.render(&banner), Some("on"));
/// # Ok::<(), flagtree::Error>(())
/// ```
#[derive(Debug)]
pub struct FlagsProvider {
    store: FlagStore,
}

impl FlagsProvider {
    /// Creates a new builder for mounting a provider.
    pub fn builder() -> FlagsProviderBuilder<()> {
        FlagsProviderBuilder { source: () }
    }

    /// Handle to the underlying store, for passing to consumers.
    pub fn store(&self) -> &FlagStore {
        &self.store
    }

    /// Publishes new flag definitions.
    pub fn update(&self, spec: &Computable) -> Result<PublishOutcome, Error> {
        Ok(self.store.publish(spec)?)
    }

    /// The whole current tree, `Null` before anything was published.
    pub fn flags(&self) -> Value {
        self.store.current().unwrap_or_default()
    }

    /// The value at `path` in the current tree.
    pub fn flag(&self, path: impl Into<Path>) -> Option<Value> {
        self.store.flag(path)
    }

    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&Value) + 'static,
    {
        self.store.subscribe(subscriber)
    }

    /// Dispatches `consumer` against the current tree.
    pub fn render<O: Clone>(&self, consumer: &Consumer<O>) -> Option<O> {
        consumer.render(&self.flags())
    }

    /// Unmounts the provider.
    pub fn teardown(self) {}
}

impl Drop for FlagsProvider {
    fn drop(&mut self) {
        debug!(
            subscribers = self.store.subscriber_count(),
            "tearing down flags provider"
        );
        self.store.clear();
    }
}

/// Builder for mounting a [`FlagsProvider`].
///
/// The builder starts without flag definitions (`FlagsProviderBuilder<()>`)
/// and moves to `FlagsProviderBuilder<Computable>` once
/// [`with_spec`](FlagsProviderBuilder::with_spec) is called, or to
/// `FlagsProviderBuilder<FlagStore>` to mount on a store the host already
/// holds.
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct FlagsProviderBuilder<S> {
    source: S,
}

impl FlagsProviderBuilder<()> {
    /// Sets the initial flag definitions published on mount.
    pub fn with_spec(self, spec: Computable) -> FlagsProviderBuilder<Computable> {
        FlagsProviderBuilder { source: spec }
    }

    /// Mounts a provider from an existing store handle instead.
    ///
    /// The provider still owns the store while mounted: dropping it clears
    /// the store's tree and subscribers, even through the host's own clone
    /// of the handle.
    pub fn with_store(self, store: FlagStore) -> FlagsProviderBuilder<FlagStore> {
        FlagsProviderBuilder { source: store }
    }
}

impl FlagsProviderBuilder<Computable> {
    /// Mounts the provider and publishes the initial flag definitions.
    ///
    /// Fails if the definitions cannot be resolved; nothing is mounted in
    /// that case.
    pub fn build(self) -> Result<FlagsProvider, Error> {
        let provider = FlagsProvider {
            store: FlagStore::new(),
        };
        provider.update(&self.source)?;
        debug!("mounted flags provider");
        Ok(provider)
    }
}

impl FlagsProviderBuilder<FlagStore> {
    /// Mounts the provider around the given store, publishing nothing.
    pub fn build(self) -> FlagsProvider {
        debug!("mounted flags provider on existing store");
        FlagsProvider { store: self.source }
    }
}

impl FlagsProviderBuilder<()> {
    /// Always fails: a provider needs initial flag definitions.
    pub fn build(self) -> Result<FlagsProvider, Error> {
        Err(Error::MissingSpec)
    }
}
