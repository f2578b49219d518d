use crate::compute::ResolveError;
use crate::consumer::DescriptorError;
use crate::tree::DecodeError;
use thiserror::Error;

/// Top-level error type for the flagtree library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("flag resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("invalid consumer: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("flag decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("flags provider requires initial flag definitions")]
    MissingSpec,
}
