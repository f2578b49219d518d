//! Computable flag definitions.
//!
//! A [`Computable`] mixes concrete values with functions of other flags.
//! [`resolve`] evaluates every function once and returns the materialized
//! [`Value`](crate::tree::Value) tree.

mod error;
mod resolve;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::tree::{Path, Segment, Value};

pub use error::ResolveError;
pub use resolve::{resolve, Scope};

/// Signature of a computed node.
///
/// The [`Scope`] gives read access to the rest of the tree, addressed from
/// the root.
pub type ComputeFn = dyn Fn(&Scope<'_>) -> Result<Value, ResolveError>;

/// One node of a flag definition tree.
#[derive(Clone)]
pub enum Computable {
    /// A concrete value, passed through untouched.
    Value(Value),
    /// A function evaluated once per resolution pass.
    Compute(Rc<ComputeFn>),
    Table(IndexMap<String, Computable>),
    List(Vec<Computable>),
}

impl Computable {
    pub fn value(value: impl Into<Value>) -> Self {
        Computable::Value(value.into())
    }

    pub fn compute<F>(f: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Result<Value, ResolveError> + 'static,
    {
        Computable::Compute(Rc::new(f))
    }

    /// An empty table node, to be filled with [`with`](Self::with).
    pub fn table() -> Self {
        Computable::Table(IndexMap::new())
    }

    pub fn list(items: impl IntoIterator<Item = Computable>) -> Self {
        Computable::List(items.into_iter().collect())
    }

    /// Adds `key` to a table node, keeping declaration order.
    ///
    /// A non-table node is replaced by a table first.
    pub fn with(mut self, key: impl Into<String>, node: impl Into<Computable>) -> Self {
        if !matches!(self, Computable::Table(_)) {
            self = Computable::table();
        }
        if let Computable::Table(entries) = &mut self {
            entries.insert(key.into(), node.into());
        }
        self
    }

    /// Places `node` at `path`, creating intermediate tables as needed.
    ///
    /// An intermediate that is neither a table nor a list holding the
    /// addressed index is replaced by an empty table. An empty path replaces
    /// the whole node.
    pub fn insert(&mut self, path: &Path, node: Computable) {
        let Some((first, rest)) = path.segments().split_first() else {
            *self = node;
            return;
        };

        if let (Computable::List(items), Segment::Index(i)) = (&mut *self, first) {
            if let Some(child) = items.get_mut(*i) {
                child.insert(&Path::from(rest.to_vec()), node);
                return;
            }
        }

        if !matches!(self, Computable::Table(_)) {
            *self = Computable::table();
        }

        if let Computable::Table(entries) = self {
            let key = first.to_string();
            if rest.is_empty() {
                entries.insert(key, node);
            } else {
                entries
                    .entry(key)
                    .or_insert_with(Computable::table)
                    .insert(&Path::from(rest.to_vec()), node);
            }
        }
    }

    /// Walks one segment down the definition tree without evaluating anything.
    ///
    /// Returns the child together with its canonical segment: keys for
    /// tables, indices for lists.
    pub(crate) fn child(&self, segment: &Segment) -> Option<(Segment, &Computable)> {
        match (self, segment) {
            (Computable::Table(entries), segment) => {
                let key = segment.to_string();
                entries.get(&key).map(|child| (Segment::Key(key), child))
            }
            (Computable::List(items), Segment::Index(i)) => {
                items.get(*i).map(|child| (Segment::Index(*i), child))
            }
            (Computable::List(items), Segment::Key(key)) => {
                let i = key.parse::<usize>().ok()?;
                items.get(i).map(|child| (Segment::Index(i), child))
            }
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Computable {
                fn from(value: $ty) -> Self {
                    Computable::Value(value.into())
                }
            }
        )*
    };
}

impl_from_value!(Value, bool, i64, i32, u32, f64, &str, String, Vec<Value>);

impl fmt::Debug for Computable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computable::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Computable::Compute(_) => f.write_str("Compute(<fn>)"),
            Computable::Table(entries) => f.debug_map().entries(entries.iter()).finish(),
            Computable::List(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}
