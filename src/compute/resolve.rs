//! Evaluation of computable flag definitions.
//!
//! A pass walks the definition tree depth-first, parents before children and
//! siblings in declaration order. Function nodes see the rest of the tree
//! through a [`Scope`]; reading a node that has not been evaluated yet
//! evaluates it on the spot, so forward references work as long as they do
//! not loop back. Reading a container that is still being built yields what
//! it holds so far, leaving out the computations still in progress.

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::trace;

use super::{Computable, ResolveError};
use crate::tree::{self, Path, Table, Value};

/// Materializes `spec` into a [`Value`] tree.
///
/// Every function node is invoked at most once per call. Nothing is cached
/// between calls. A dependency cycle fails the whole pass with
/// [`ResolveError::Cyclic`], even if a function chose to ignore the error it
/// was handed.
pub fn resolve(spec: &Computable) -> Result<Value, ResolveError> {
    let pass = Pass {
        root: spec,
        memo: RefCell::new(HashMap::new()),
        cycle: RefCell::new(None),
    };

    let value = pass.materialize(&Path::root(), spec)?;

    match pass.cycle.into_inner() {
        Some(path) => Err(ResolveError::Cyclic { path }),
        None => Ok(value),
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Done(Value),
    Failed(ResolveError),
}

struct Pass<'s> {
    root: &'s Computable,
    memo: RefCell<HashMap<Path, Slot>>,
    cycle: RefCell<Option<Path>>,
}

impl Pass<'_> {
    fn materialize(&self, path: &Path, node: &Computable) -> Result<Value, ResolveError> {
        if let Computable::Value(value) = node {
            return Ok(value.clone());
        }

        let slot = self.memo.borrow().get(path).cloned();
        match slot {
            Some(Slot::Done(value)) => return Ok(value),
            Some(Slot::Failed(err)) => return Err(err),
            Some(Slot::Pending) => {
                self.cycle.borrow_mut().get_or_insert_with(|| path.clone());
                return Err(ResolveError::Cyclic { path: path.clone() });
            }
            None => {}
        }

        self.memo.borrow_mut().insert(path.clone(), Slot::Pending);

        let result = self.evaluate(path, node);
        let slot = match &result {
            Ok(value) => Slot::Done(value.clone()),
            Err(err) => Slot::Failed(err.clone()),
        };
        self.memo.borrow_mut().insert(path.clone(), slot);
        result
    }

    fn evaluate(&self, path: &Path, node: &Computable) -> Result<Value, ResolveError> {
        let value = match node {
            Computable::Value(value) => value.clone(),
            Computable::Compute(f) => {
                trace!(%path, "evaluating computed flag");
                let scope = Scope { pass: self, path: path.clone() };
                f(&scope)?
            }
            Computable::Table(entries) => {
                let mut table = Table::with_capacity(entries.len());
                for (key, child) in entries {
                    let value = self.materialize(&path.join(key), child)?;
                    table.insert(key.clone(), value);
                }
                Value::from(table)
            }
            Computable::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for (i, child) in items.iter().enumerate() {
                    values.push(self.materialize(&path.join(i), child)?);
                }
                Value::from(values)
            }
        };
        Ok(value)
    }

    /// Materializes `node`, or if it is a container still being built,
    /// returns the part of it that is available.
    ///
    /// Children that are themselves in progress are left out of tables and
    /// read as `Null` in lists; any other child is evaluated on demand.
    fn view(&self, path: &Path, node: &Computable) -> Result<Value, ResolveError> {
        let pending = matches!(self.memo.borrow().get(path), Some(Slot::Pending));

        match node {
            Computable::Table(entries) if pending => {
                let mut table = Table::with_capacity(entries.len());
                for (key, child) in entries {
                    let child_path = path.join(key);
                    if self.in_progress(&child_path, child) {
                        continue;
                    }
                    table.insert(key.clone(), self.view(&child_path, child)?);
                }
                Ok(Value::from(table))
            }
            Computable::List(items) if pending => {
                let mut values = Vec::with_capacity(items.len());
                for (i, child) in items.iter().enumerate() {
                    let child_path = path.join(i);
                    if self.in_progress(&child_path, child) {
                        values.push(Value::Null);
                    } else {
                        values.push(self.view(&child_path, child)?);
                    }
                }
                Ok(Value::from(values))
            }
            _ => self.materialize(path, node),
        }
    }

    fn in_progress(&self, path: &Path, node: &Computable) -> bool {
        matches!(node, Computable::Compute(_))
            && matches!(self.memo.borrow().get(path), Some(Slot::Pending))
    }

    /// Finds the value at `path`, evaluating whatever node it lands on.
    ///
    /// Once the walk reaches a concrete or computed node the remaining
    /// segments are looked up in its materialized value.
    fn lookup(&self, path: &Path) -> Result<Option<Value>, ResolveError> {
        let mut node = self.root;
        let mut walked = Path::root();

        for (i, segment) in path.segments().iter().enumerate() {
            if matches!(node, Computable::Value(_) | Computable::Compute(_)) {
                let value = self.materialize(&walked, node)?;
                let rest = Path::from(path.segments()[i..].to_vec());
                return Ok(tree::get(&value, &rest).cloned());
            }

            match node.child(segment) {
                Some((canonical, child)) => {
                    walked = walked.join(canonical);
                    node = child;
                }
                None => return Ok(None),
            }
        }

        self.view(&walked, node).map(Some)
    }
}

/// Read access to the definition tree from inside a computed node.
///
/// Paths are absolute from the root of the definition tree.
pub struct Scope<'p> {
    pass: &'p Pass<'p>,
    path: Path,
}

impl Scope<'_> {
    /// Path of the node being computed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the materialized value at `path`, or `None` if nothing lives
    /// there.
    pub fn get(&self, path: impl Into<Path>) -> Result<Option<Value>, ResolveError> {
        self.pass.lookup(&path.into())
    }

    /// Like [`get`](Self::get), reading an absent value as `Null`.
    pub fn value(&self, path: impl Into<Path>) -> Result<Value, ResolveError> {
        Ok(self.get(path)?.unwrap_or_default())
    }

    /// Whether the flag at `path` is present and truthy.
    pub fn enabled(&self, path: impl Into<Path>) -> Result<bool, ResolveError> {
        Ok(self.get(path)?.is_some_and(|value| value.is_truthy()))
    }

    /// Builds a computation failure for the current node.
    pub fn fail(&self, reason: impl Into<String>) -> ResolveError {
        ResolveError::Compute {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}
