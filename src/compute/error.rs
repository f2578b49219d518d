use thiserror::Error;

use crate::tree::Path;

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("cyclic computation detected at '{path}'")]
    Cyclic { path: Path },

    #[error("failed to compute '{path}': {reason}")]
    Compute { path: Path, reason: String },
}
