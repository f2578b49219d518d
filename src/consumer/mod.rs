//! Flag consumers.
//!
//! A [`Consumer`] names a flag and says what to emit when it is enabled and,
//! optionally, when it is not. The three shapes are a tagged union so the
//! dispatch in [`Consumer::render`] is exhaustive; [`ConsumerBuilder`] takes
//! the loose shape and rejects invalid mixes before anything is rendered.

mod builder;
mod error;

use std::fmt;
use std::rc::Rc;

use crate::tree::{Path, Value};

pub use builder::ConsumerBuilder;
pub use error::DescriptorError;

/// Handler receiving the full flag tree.
pub type RenderFn<O> = Rc<dyn Fn(&Value) -> O>;

/// Props handed to a [`Component`].
#[derive(Debug, Clone, Copy)]
pub struct FlagProps<'a> {
    pub flags: &'a Value,
}

/// A renderer instantiated with [`FlagProps`].
pub trait Component<O> {
    fn render(&self, props: FlagProps<'_>) -> O;
}

impl<O, F> Component<O> for F
where
    F: Fn(FlagProps<'_>) -> O,
{
    fn render(&self, props: FlagProps<'_>) -> O {
        self(props)
    }
}

pub enum Consumer<O> {
    /// Emits `children` as-is when enabled.
    Children {
        name: Path,
        children: O,
        fallback_render: Option<RenderFn<O>>,
    },
    /// Emits `render(flags)` when enabled.
    Render {
        name: Path,
        render: RenderFn<O>,
        fallback_render: Option<RenderFn<O>>,
    },
    /// Emits `component` instantiated with the flags when enabled.
    Component {
        name: Path,
        component: Rc<dyn Component<O>>,
        fallback_component: Option<Rc<dyn Component<O>>>,
    },
}

impl<O> Consumer<O> {
    pub fn builder() -> ConsumerBuilder<O> {
        ConsumerBuilder::new()
    }

    pub fn name(&self) -> &Path {
        match self {
            Consumer::Children { name, .. }
            | Consumer::Render { name, .. }
            | Consumer::Component { name, .. } => name,
        }
    }

    /// Whether the named flag is present and truthy in `flags`.
    pub fn is_enabled(&self, flags: &Value) -> bool {
        flags.get(self.name()).is_some_and(Value::is_truthy)
    }
}

impl<O: Clone> Consumer<O> {
    /// Picks what to emit for the current tree.
    ///
    /// Handlers always receive the full tree, not just the named flag.
    /// Returns `None` when the flag is disabled and no fallback is set.
    pub fn render(&self, flags: &Value) -> Option<O> {
        let enabled = self.is_enabled(flags);

        match self {
            Consumer::Children { children, .. } if enabled => Some(children.clone()),
            Consumer::Render { render, .. } if enabled => Some(render(flags)),
            Consumer::Component { component, .. } if enabled => {
                Some(component.render(FlagProps { flags }))
            }
            Consumer::Children {
                fallback_render, ..
            }
            | Consumer::Render {
                fallback_render, ..
            } => fallback_render.as_ref().map(|fallback| fallback(flags)),
            Consumer::Component {
                fallback_component,
                ..
            } => fallback_component
                .as_ref()
                .map(|fallback| fallback.render(FlagProps { flags })),
        }
    }
}

impl<O> fmt::Debug for Consumer<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, has_fallback) = match self {
            Consumer::Children {
                fallback_render, ..
            } => ("children", fallback_render.is_some()),
            Consumer::Render {
                fallback_render, ..
            } => ("render", fallback_render.is_some()),
            Consumer::Component {
                fallback_component,
                ..
            } => ("component", fallback_component.is_some()),
        };
        f.debug_struct("Consumer")
            .field("kind", &kind)
            .field("name", self.name())
            .field("fallback", &has_fallback)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(beta: Value) -> Value {
        [("beta", beta), ("theme", Value::from("dark"))]
            .into_iter()
            .collect()
    }

    fn theme(flags: &Value) -> String {
        flags
            .get(&"theme".into())
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_children_enabled() {
        let consumer = Consumer::builder()
            .name("beta")
            .children("new ui".to_string())
            .build()
            .unwrap();

        assert_eq!(consumer.render(&tree(true.into())), Some("new ui".into()));
    }

    #[test]
    fn test_children_disabled_uses_fallback_render() {
        let consumer = Consumer::builder()
            .name("beta")
            .children("new ui".to_string())
            .fallback_render(|flags: &Value| format!("old ui ({})", theme(flags)))
            .build()
            .unwrap();

        assert_eq!(
            consumer.render(&tree(0.into())),
            Some("old ui (dark)".into())
        );
    }

    #[test]
    fn test_disabled_without_fallback_emits_nothing() {
        let consumer = Consumer::builder()
            .name("beta")
            .children("new ui".to_string())
            .build()
            .unwrap();

        for value in [Value::Int(0), Value::from(""), Value::Null, Value::Bool(false)] {
            assert_eq!(consumer.render(&tree(value)), None);
        }
    }

    #[test]
    fn test_missing_flag_is_disabled() {
        let consumer = Consumer::builder()
            .name(["nope", "deeper"])
            .children(1)
            .build()
            .unwrap();

        assert_eq!(consumer.render(&tree(true.into())), None);
    }

    #[test]
    fn test_render_receives_full_tree() {
        let consumer = Consumer::builder()
            .name("beta")
            .render(|flags: &Value| theme(flags))
            .build()
            .unwrap();

        assert_eq!(consumer.render(&tree("yes".into())), Some("dark".into()));
    }

    #[test]
    fn test_component_and_fallback_component() {
        fn beta_panel(props: FlagProps<'_>) -> String {
            format!("beta/{}", theme(props.flags))
        }

        fn stable_panel(props: FlagProps<'_>) -> String {
            format!("stable/{}", theme(props.flags))
        }

        let consumer = Consumer::builder()
            .name("beta")
            .component(beta_panel)
            .fallback_component(stable_panel)
            .build()
            .unwrap();

        assert_eq!(consumer.render(&tree(1.into())), Some("beta/dark".into()));
        assert_eq!(consumer.render(&tree(0.into())), Some("stable/dark".into()));
    }

    #[test]
    fn test_truthy_non_boolean_enables() {
        let consumer = Consumer::builder()
            .name("beta")
            .children(true)
            .build()
            .unwrap();

        let table: Value = [("x", 0)].into_iter().collect();
        assert_eq!(consumer.render(&tree(table)), Some(true));
        assert_eq!(consumer.render(&tree(Value::Float(0.1))), Some(true));
    }
}
