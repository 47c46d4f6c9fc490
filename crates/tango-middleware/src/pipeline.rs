//! Pipeline execution and the exhaustion error.

use std::sync::Arc;

use tango_core::Value;

use crate::middleware::{BoxFuture, Next, Stage};

/// Every stage delegated and none produced a value.
///
/// The chain's final stage — the validated implementation on the server,
/// the transport on the client — must return without calling next. Hitting
/// this error means a chain was run without its terminal stage, or a custom
/// terminal delegated by mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineExhausted;

impl std::fmt::Display for PipelineExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("pipeline exhausted: make the last stage return without calling next")
    }
}

impl std::error::Error for PipelineExhausted {}

impl From<PipelineExhausted> for tango_core::TangoError {
    fn from(_: PipelineExhausted) -> Self {
        Self::PipelineExhausted
    }
}

/// Runs a context through an ordered chain of stages.
///
/// Stage `i` receives a [`Next`] that invokes stage `i + 1`; the last
/// stage's `next` fails with [`PipelineExhausted`]. Rejections propagate
/// upward unchanged; there is no implicit retry.
pub fn run<C, E>(ctx: C, stages: &[Stage<C, E>]) -> BoxFuture<'static, Result<Value, E>>
where
    C: Send + 'static,
    E: From<PipelineExhausted> + Send + 'static,
{
    Next::new(Arc::from(stages)).run(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;
    use tango_core::TangoError;

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let result: Result<Value, TangoError> = run((), &[]).await;
        assert!(matches!(result, Err(TangoError::PipelineExhausted)));
    }

    #[tokio::test]
    async fn test_terminal_returns_without_next() {
        let terminal: Stage<(), TangoError> =
            Arc::new(from_fn("terminal", |(), _next| {
                Box::pin(async { Ok(Value::from(42)) })
            }));
        let result = run((), &[terminal]).await.unwrap();
        assert_eq!(result, Value::from(42));
    }

    #[tokio::test]
    async fn test_all_stages_delegating_exhausts() {
        let passthrough: Stage<(), TangoError> =
            Arc::new(from_fn("passthrough", |(), next: Next<(), TangoError>| {
                next.run(())
            }));
        let result = run((), &[passthrough.clone(), passthrough]).await;
        assert!(matches!(result, Err(TangoError::PipelineExhausted)));
    }
}
