//! The middleware trait and chain walker.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tango_core::Value;

use crate::pipeline::PipelineExhausted;

/// A boxed future, the return type of every pipeline stage.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased stage stored in a chain.
pub type Stage<C, E> = Arc<dyn Middleware<C, E>>;

/// One pipeline stage.
///
/// `C` is the context handle (server or client); it is a cheap clone, so a
/// stage passes a copy down the chain and keeps its own for the return
/// path. `E` is the error type of the side the stage runs on.
///
/// # Invariants
///
/// - A stage must return the value produced by `next.run(...)`, or a value
///   of its own when short-circuiting. Swallowing the tail's value breaks
///   the caller's view of the result.
/// - A stage must call `next` at most once; [`Next`] is consumed by `run`,
///   so the type system enforces this.
///
/// # Example
///
/// ```ignore
/// struct Timing;
///
/// impl Middleware<ServerContext, TangoError> for Timing {
///     fn handle(
///         self: Arc<Self>,
///         ctx: ServerContext,
///         next: Next<ServerContext, TangoError>,
///     ) -> BoxFuture<'static, Result<Value, TangoError>> {
///         Box::pin(async move {
///             let result = next.run(ctx.clone()).await?;
///             tracing::debug!(elapsed_ms = ctx.elapsed_ms(), "handled");
///             Ok(result)
///         })
///     }
/// }
/// ```
pub trait Middleware<C, E>: Send + Sync + 'static {
    /// Returns the stage name, used for logging and debugging.
    fn name(&self) -> &'static str {
        "stage"
    }

    /// Processes the call, delegating to the tail via `next` or
    /// short-circuiting with an own result.
    fn handle(self: Arc<Self>, ctx: C, next: Next<C, E>) -> BoxFuture<'static, Result<Value, E>>;
}

/// The remaining chain after the current stage.
///
/// Consumed by [`Next::run`], so a stage can delegate at most once.
pub struct Next<C, E> {
    stages: Arc<[Stage<C, E>]>,
    index: usize,
}

impl<C, E> Next<C, E>
where
    C: Send + 'static,
    E: From<PipelineExhausted> + Send + 'static,
{
    /// Creates a walker over a full chain.
    #[must_use]
    pub fn new(stages: Arc<[Stage<C, E>]>) -> Self {
        Self { stages, index: 0 }
    }

    /// Invokes the next stage in the chain.
    ///
    /// Running past the last stage fails with [`PipelineExhausted`]: the
    /// chain's final stage is expected to return without delegating.
    pub fn run(self, ctx: C) -> BoxFuture<'static, Result<Value, E>> {
        let stage = self.stages.get(self.index).cloned();
        match stage {
            Some(stage) => {
                let next = Self {
                    stages: self.stages,
                    index: self.index + 1,
                };
                stage.handle(ctx, next)
            }
            None => Box::pin(async { Err(E::from(PipelineExhausted)) }),
        }
    }
}

/// A middleware backed by a plain function.
///
/// Created via [`from_fn`]; useful for one-off stages that do not warrant a
/// named type.
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

/// Wraps a function as a middleware stage.
///
/// # Example
///
/// ```ignore
/// let logger = from_fn("logger", |ctx: ServerContext, next| {
///     Box::pin(async move {
///         tracing::debug!("before");
///         let result = next.run(ctx).await;
///         tracing::debug!("after");
///         result
///     })
/// });
/// ```
pub fn from_fn<C, E, F>(name: &'static str, func: F) -> FnMiddleware<F>
where
    F: Fn(C, Next<C, E>) -> BoxFuture<'static, Result<Value, E>> + Send + Sync + 'static,
{
    FnMiddleware { name, func }
}

impl<C, E, F> Middleware<C, E> for FnMiddleware<F>
where
    C: Send + 'static,
    E: Send + 'static,
    F: Fn(C, Next<C, E>) -> BoxFuture<'static, Result<Value, E>> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle(self: Arc<Self>, ctx: C, next: Next<C, E>) -> BoxFuture<'static, Result<Value, E>> {
        (self.func)(ctx, next)
    }
}
