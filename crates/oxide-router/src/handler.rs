//! Handler trait and the units a chain is made of.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::BoxError;

/// A boxed future for async handler operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler returns. An `Err` is treated like a panic by the dispatcher.
pub type HandlerResult = Result<(), BoxError>;

/// Something that can take part in a request's handler chain.
///
/// Implemented for every `Fn(&mut Context) -> BoxFuture<'_, HandlerResult>`,
/// so plain functions and closures work:
///
/// ```
/// use oxide_router::{BoxFuture, Context, HandlerResult, Response};
///
/// fn hello(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
///     Box::pin(async move {
///         ctx.send(Response::text("Hello, World!"));
///         Ok(())
///     })
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handles the request in `ctx`.
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        self(ctx)
    }
}

/// A controller method bound to its instance at registration time.
struct Bound<C, M> {
    controller: Arc<C>,
    method: M,
}

impl<C, M> Handler for Bound<C, M>
where
    C: Send + Sync + 'static,
    M: for<'a> Fn(&'a C, &'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        (self.method)(&self.controller, ctx)
    }
}

/// One step of a handler chain.
#[derive(Clone)]
pub enum HandlerUnit {
    /// Runs, then the chain moves on by itself unless a response was sent
    /// or the unit already called [`Context::proceed`].
    Plain(Arc<dyn Handler>),
    /// Runs and decides: the chain only moves on if it calls
    /// [`Context::proceed`].
    Filter(Arc<dyn Handler>),
}

impl HandlerUnit {
    /// Wraps a function or closure as a [`Plain`](Self::Plain) unit.
    pub fn plain<F>(handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        Self::Plain(Arc::new(handler))
    }

    /// Wraps a function or closure as a [`Filter`](Self::Filter) unit.
    pub fn filter<F>(handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        Self::Filter(Arc::new(handler))
    }

    /// Wraps any [`Handler`] implementation as a plain unit.
    pub fn handler(handler: impl Handler) -> Self {
        Self::Plain(Arc::new(handler))
    }

    /// Wraps any [`Handler`] implementation as a filter unit.
    pub fn filter_handler(handler: impl Handler) -> Self {
        Self::Filter(Arc::new(handler))
    }

    /// Binds `method` to `controller`, producing a plain unit.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use oxide_router::{BoxFuture, Context, HandlerResult, HandlerUnit, Response};
    ///
    /// struct Greeter {
    ///     greeting: String,
    /// }
    ///
    /// impl Greeter {
    ///     fn greet<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
    ///         Box::pin(async move {
    ///             ctx.send(Response::text(self.greeting.clone()));
    ///             Ok(())
    ///         })
    ///     }
    /// }
    ///
    /// let greeter = Arc::new(Greeter { greeting: "hi".to_string() });
    /// let unit = HandlerUnit::bind(greeter, Greeter::greet);
    /// assert!(!unit.is_filter());
    /// ```
    pub fn bind<C, M>(controller: Arc<C>, method: M) -> Self
    where
        C: Send + Sync + 'static,
        M: for<'a> Fn(&'a C, &'a mut Context) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Plain(Arc::new(Bound { controller, method }))
    }

    /// Returns true for filter units.
    pub fn is_filter(&self) -> bool {
        matches!(self, Self::Filter(_))
    }

    pub(crate) fn invoke<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            match self {
                Self::Plain(handler) => {
                    let cursor = ctx.chain().cursor();
                    handler.call(ctx).await?;
                    // A unit that advanced the chain itself already let the
                    // rest decide whether to continue.
                    if ctx.chain().cursor() == cursor {
                        ctx.proceed().await
                    } else {
                        Ok(())
                    }
                }
                Self::Filter(handler) => handler.call(ctx).await,
            }
        })
    }
}

impl fmt::Debug for HandlerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain"),
            Self::Filter(_) => f.write_str("Filter"),
        }
    }
}
