use std::rc::Rc;

use super::{Component, Consumer, DescriptorError, RenderFn};
use crate::tree::{Path, Value};

/// Builder for a [`Consumer`].
///
/// Accepts any combination of handlers and validates it in
/// [`build`](Self::build): exactly one of `children`, `render` or
/// `component`, and a fallback of the matching kind.
///
/// ## Example
///
/// ```
/// use flagtree::{Consumer, Value};
///
/// let banner = Consumer::builder()
///     .name(["ui", "banner"])
///     .children("New look!")
///     .fallback_render(|_: &Value| "")
///     .build()?;
///
/// let flags: Value = [("ui", [("banner", true)].into_iter().collect::<Value>())]
///     .into_iter()
///     .collect();
/// assert_eq!(banner.render(&flags), Some("New look!"));
/// # Ok::<(), flagtree::DescriptorError>(())
/// ```
#[must_use = "builders do nothing until .build() is called"]
pub struct ConsumerBuilder<O> {
    name: Option<Path>,
    children: Option<O>,
    render: Option<RenderFn<O>>,
    component: Option<Rc<dyn Component<O>>>,
    fallback_render: Option<RenderFn<O>>,
    fallback_component: Option<Rc<dyn Component<O>>>,
}

impl<O> Default for ConsumerBuilder<O> {
    fn default() -> Self {
        Self {
            name: None,
            children: None,
            render: None,
            component: None,
            fallback_render: None,
            fallback_component: None,
        }
    }
}

impl<O> ConsumerBuilder<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the flag deciding between primary and fallback content.
    pub fn name(mut self, name: impl Into<Path>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn children(mut self, children: O) -> Self {
        self.children = Some(children);
        self
    }

    pub fn render<F>(mut self, render: F) -> Self
    where
        F: Fn(&Value) -> O + 'static,
    {
        self.render = Some(Rc::new(render));
        self
    }

    pub fn component<C>(mut self, component: C) -> Self
    where
        C: Component<O> + 'static,
    {
        self.component = Some(Rc::new(component));
        self
    }

    /// Emitted when the flag is disabled. Valid for `children` and `render`
    /// consumers.
    pub fn fallback_render<F>(mut self, render: F) -> Self
    where
        F: Fn(&Value) -> O + 'static,
    {
        self.fallback_render = Some(Rc::new(render));
        self
    }

    /// Emitted when the flag is disabled. Valid for `component` consumers.
    pub fn fallback_component<C>(mut self, component: C) -> Self
    where
        C: Component<O> + 'static,
    {
        self.fallback_component = Some(Rc::new(component));
        self
    }

    pub fn build(self) -> Result<Consumer<O>, DescriptorError> {
        let name = self.name.ok_or(DescriptorError::MissingName)?;

        let mut primaries = Vec::new();
        if self.children.is_some() {
            primaries.push("children");
        }
        if self.render.is_some() {
            primaries.push("render");
        }
        if self.component.is_some() {
            primaries.push("component");
        }
        if primaries.len() > 1 {
            return Err(DescriptorError::MixedPrimary(primaries.join(", ")));
        }

        match (self.children, self.render, self.component) {
            (Some(children), None, None) => {
                if self.fallback_component.is_some() {
                    return Err(DescriptorError::FallbackComponentWithoutComponent);
                }
                Ok(Consumer::Children {
                    name,
                    children,
                    fallback_render: self.fallback_render,
                })
            }
            (None, Some(render), None) => {
                if self.fallback_component.is_some() {
                    return Err(DescriptorError::FallbackComponentWithoutComponent);
                }
                Ok(Consumer::Render {
                    name,
                    render,
                    fallback_render: self.fallback_render,
                })
            }
            (None, None, Some(component)) => {
                if self.fallback_render.is_some() {
                    return Err(DescriptorError::FallbackRenderWithComponent);
                }
                Ok(Consumer::Component {
                    name,
                    component,
                    fallback_component: self.fallback_component,
                })
            }
            _ => Err(DescriptorError::MissingPrimary),
        }
    }
}
