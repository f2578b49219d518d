//! Hierarchical feature flags whose values may be derived from other flags.
//!
//! A [`Computable`] definition tree is resolved into a [`Value`] tree, held by
//! a [`FlagStore`] and re-broadcast only when its top level actually changes.
//! [`Consumer`]s pick their content from the published tree.

pub mod compute;
pub mod consumer;
mod error;
pub mod provider;
pub mod store;
pub mod tree;

pub use compute::{resolve, Computable, ResolveError, Scope};
pub use consumer::{Component, Consumer, ConsumerBuilder, DescriptorError, FlagProps};
pub use error::Error;
pub use provider::{FlagsProvider, FlagsProviderBuilder};
pub use store::{should_publish, FlagStore, PublishOutcome, Subscription};
pub use tree::{DecodeError, Path, Segment, Table, Value};
