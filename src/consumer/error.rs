use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DescriptorError {
    #[error("consumer requires a flag name")]
    MissingName,

    #[error("consumer requires one of children, render or component")]
    MissingPrimary,

    #[error("consumer mixes primary handlers: {0}")]
    MixedPrimary(String),

    #[error("fallback_component can only be used with a component consumer")]
    FallbackComponentWithoutComponent,

    #[error("fallback_render cannot be used with a component consumer")]
    FallbackRenderWithComponent,
}
