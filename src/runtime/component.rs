//! Component definitions
//!
//! A component is one of four kinds: a plain function, a sync generator, an
//! async function, or an async generator. Generators are explicit state
//! machines: the engine drives them with [`Resume`] inputs and they answer
//! with a [`Step`].
//!
//! ```ignore
//! // `for props of ctx { yield i++ }`
//! let counter = Component::generator("Counter", |_ctx, _props| {
//!     let mut i = 0;
//!     move |_ctx: &Context, input: Resume| match input {
//!         Resume::Next(_) => {
//!             let step = Step::Yield(Child::from(i));
//!             i += 1;
//!             step
//!         }
//!         _ => Step::Return(Child::Empty),
//!     }
//! });
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use crate::runtime::context::Context;
use crate::runtime::element::{Child, Element, Props, Tag};
use crate::runtime::errors::{RenderError, RenderResult};

/// Component kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Runs to completion on every render.
    Function,
    /// Sync generator resumed once per render.
    Generator,
    /// Runs to settlement on every render.
    AsyncFunction,
    /// Async generator resumed once per render.
    AsyncGenerator,
}

impl ComponentKind {
    /// Generators keep a body across renders.
    #[inline]
    pub fn is_generator(&self) -> bool {
        matches!(self, ComponentKind::Generator | ComponentKind::AsyncGenerator)
    }

    /// Async kinds may settle later than the call that started them.
    #[inline]
    pub fn is_async(&self) -> bool {
        matches!(self, ComponentKind::AsyncFunction | ComponentKind::AsyncGenerator)
    }
}

/// Input fed to a suspended generator.
#[derive(Debug, Clone)]
pub enum Resume {
    /// Next property set, delivered at the iteration point.
    Next(Props),
    /// Resume after an [`Step::Interim`] yield.
    Continue,
    /// A descendant failed; raised at the suspension point.
    Throw(RenderError),
    /// Forced completion on unmount.
    Return,
}

/// What a generator produced when it suspended.
#[derive(Debug, Clone)]
pub enum Step {
    /// Output; the body waits for the next props.
    Yield(Child),
    /// Output; the body resumes with [`Resume::Continue`] immediately.
    Interim(Child),
    /// Final output; the body is finished.
    Return(Child),
    /// The body failed.
    Throw(RenderError),
}

/// A sync generator body.
pub trait Generator {
    /// Run until the next suspension point.
    fn resume(
        &mut self,
        ctx: &Context,
        input: Resume,
    ) -> Step;
}

impl<F> Generator for F
where
    F: FnMut(&Context, Resume) -> Step,
{
    fn resume(
        &mut self,
        ctx: &Context,
        input: Resume,
    ) -> Step {
        self(ctx, input)
    }
}

/// Pending resumption of an async generator; hands the body back with its step.
pub type AsyncResumption = LocalBoxFuture<'static, (Box<dyn AsyncGenerator>, Step)>;

/// An async generator body.
///
/// The body is moved into the resumption future and handed back when it
/// settles, so state can live in `self` across awaits.
pub trait AsyncGenerator: 'static {
    /// Run until the next suspension point.
    fn resume(
        self: Box<Self>,
        ctx: Context,
        input: Resume,
    ) -> AsyncResumption;
}

/// Adapts a closure returning a future of [`Step`] into an [`AsyncGenerator`].
pub struct AsyncGeneratorFn<F>(pub F);

impl<F, Fut> AsyncGenerator for AsyncGeneratorFn<F>
where
    F: FnMut(Context, Resume) -> Fut + 'static,
    Fut: Future<Output = Step> + 'static,
{
    fn resume(
        mut self: Box<Self>,
        ctx: Context,
        input: Resume,
    ) -> AsyncResumption {
        let fut = (self.0)(ctx, input);
        async move {
            let step = fut.await;
            (self as Box<dyn AsyncGenerator>, step)
        }
        .boxed_local()
    }
}

type FunctionBody = dyn Fn(&Context, &Props) -> RenderResult<Child>;
type AsyncFunctionBody = dyn Fn(Context, Props) -> LocalBoxFuture<'static, RenderResult<Child>>;
type GeneratorFactory = dyn Fn(&Context, &Props) -> Box<dyn Generator>;
type AsyncGeneratorFactory = dyn Fn(&Context, &Props) -> Box<dyn AsyncGenerator>;

pub(crate) enum Definition {
    Function(Box<FunctionBody>),
    AsyncFunction(Box<AsyncFunctionBody>),
    Generator(Box<GeneratorFactory>),
    AsyncGenerator(Box<AsyncGeneratorFactory>),
}

struct ComponentDef {
    name: Cow<'static, str>,
    definition: Definition,
}

/// A component reference. Clones share identity.
#[derive(Clone)]
pub struct Component(Rc<ComponentDef>);

impl Component {
    fn from_definition(
        name: impl Into<Cow<'static, str>>,
        definition: Definition,
    ) -> Self {
        Self(Rc::new(ComponentDef {
            name: name.into(),
            definition,
        }))
    }

    /// A plain function component.
    pub fn function<F>(
        name: impl Into<Cow<'static, str>>,
        body: F,
    ) -> Self
    where
        F: Fn(&Context, &Props) -> RenderResult<Child> + 'static,
    {
        Self::from_definition(name, Definition::Function(Box::new(body)))
    }

    /// An async function component.
    pub fn async_function<F, Fut>(
        name: impl Into<Cow<'static, str>>,
        body: F,
    ) -> Self
    where
        F: Fn(Context, Props) -> Fut + 'static,
        Fut: Future<Output = RenderResult<Child>> + 'static,
    {
        Self::from_definition(
            name,
            Definition::AsyncFunction(Box::new(move |ctx, props| body(ctx, props).boxed_local())),
        )
    }

    /// A sync generator component; `factory` runs once per mount (and again
    /// after the body errors).
    pub fn generator<F, G>(
        name: impl Into<Cow<'static, str>>,
        factory: F,
    ) -> Self
    where
        F: Fn(&Context, &Props) -> G + 'static,
        G: Generator + 'static,
    {
        Self::from_definition(
            name,
            Definition::Generator(Box::new(move |ctx, props| Box::new(factory(ctx, props)))),
        )
    }

    /// An async generator component.
    pub fn async_generator<F, G>(
        name: impl Into<Cow<'static, str>>,
        factory: F,
    ) -> Self
    where
        F: Fn(&Context, &Props) -> G + 'static,
        G: AsyncGenerator,
    {
        Self::from_definition(
            name,
            Definition::AsyncGenerator(Box::new(move |ctx, props| Box::new(factory(ctx, props)))),
        )
    }

    /// Component name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Component kind.
    pub fn kind(&self) -> ComponentKind {
        match self.0.definition {
            Definition::Function(_) => ComponentKind::Function,
            Definition::AsyncFunction(_) => ComponentKind::AsyncFunction,
            Definition::Generator(_) => ComponentKind::Generator,
            Definition::AsyncGenerator(_) => ComponentKind::AsyncGenerator,
        }
    }

    /// Start an element of this component.
    #[inline]
    pub fn element(&self) -> Element {
        Element::new(Tag::Component(self.clone()))
    }

    #[inline]
    pub(crate) fn definition(&self) -> &Definition {
        &self.0.definition
    }

    /// Identity comparison.
    #[inline]
    pub fn same(
        &self,
        other: &Component,
    ) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Component {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Component {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}
