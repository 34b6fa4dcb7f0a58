//! Handler system for the Sprocket framework.
//!
//! Skill handlers are plain async functions whose parameters implement
//! [`FromContext`], in the style of Axum handlers:
//!
//! ```rust,ignore
//! // No parameters
//! async fn tick() {}
//!
//! // Extractors, fallible return
//! async fn greet(MessageText(text): MessageText, config: SkillConfig) -> anyhow::Result<()> {
//!     tracing::info!(skill = %config.name, "greeting {text}");
//!     Ok(())
//! }
//! ```
//!
//! Handlers are stored type-erased as a [`BoxedHandler`], a tower service, so
//! that the supervisor can stack a timeout on top of them.

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;
use tower::util::BoxCloneSyncService;

use crate::context::SkillContext;
use crate::error::{BoxError, HandlerPanic};
use crate::extractor::FromContext;

/// The result every handler call is normalized into.
pub type HandlerResult = Result<(), BoxError>;

// ============================================================================
// IntoHandlerResult - normalize handler return values
// ============================================================================

/// Types that can be returned from a handler.
pub trait IntoHandlerResult: Send + 'static {
    /// Converts the return value into a [`HandlerResult`].
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

/// `Err` values are reported as handler failures.
impl<T, E> IntoHandlerResult for Result<T, E>
where
    T: IntoHandlerResult,
    E: Into<BoxError> + Send + 'static,
{
    fn into_handler_result(self) -> HandlerResult {
        match self {
            Ok(t) => t.into_handler_result(),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for skill handlers.
///
/// Implemented automatically for async functions taking up to eight
/// [`FromContext`] parameters and returning an [`IntoHandlerResult`].
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// Calls the handler with the given context.
    fn call(self, ctx: Arc<SkillContext>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, R> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult,
{
    fn call(self, _ctx: Arc<SkillContext>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async move { (self)().await.into_handler_result() })
    }
}

/// Generates Handler implementations for functions with different arities.
macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case)]
        impl<F, Fut, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoHandlerResult,
            $( $ty: FromContext + Send + 'static, )*
        {
            fn call(self, ctx: Arc<SkillContext>) -> BoxFuture<'static, HandlerResult> {
                Box::pin(async move {
                    $(
                        let $ty = $ty::from_context(&ctx)?;
                    )*

                    (self)($($ty,)*).await.into_handler_result()
                })
            }
        }
    };
}

impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

// ============================================================================
// HandlerService
// ============================================================================

/// A type-erased, cloneable handler service.
pub type BoxedHandler = BoxCloneSyncService<Arc<SkillContext>, (), BoxError>;

/// A tower [`Service`] that calls a single generic handler.
///
/// Panics raised by the handler are caught and surfaced as a
/// [`HandlerPanic`] error, so a misbehaving skill cannot unwind through the
/// dispatcher.
pub struct HandlerService<H, T> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<H: Clone, T> Clone for HandlerService<H, T> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            _marker: PhantomData,
        }
    }
}

impl<H, T> HandlerService<H, T>
where
    H: Handler<T>,
{
    /// Wraps `handler` in a `HandlerService`.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

impl<H, T> Service<Arc<SkillContext>> for HandlerService<H, T>
where
    H: Handler<T>,
    T: 'static,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<SkillContext>) -> Self::Future {
        let handler = self.handler.clone();
        Box::pin(async move {
            match AssertUnwindSafe(handler.call(ctx)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    Err(Box::new(HandlerPanic(message)) as BoxError)
                }
            }
        })
    }
}

/// Converts a handler into a [`BoxedHandler`].
pub fn into_handler<H, T>(handler: H) -> BoxedHandler
where
    H: Handler<T>,
    T: 'static,
{
    BoxCloneSyncService::new(HandlerService::new(handler))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::MessageText;
    use crate::skill::SkillId;
    use sprocket_core::{Event, MatchResult, SkillConfig};
    use tower::ServiceExt;

    fn ctx(event: Event) -> Arc<SkillContext> {
        Arc::new(SkillContext::new(
            SkillId(0),
            Arc::new(event),
            MatchResult::new(0.6),
            Arc::new(SkillConfig::new("test")),
        ))
    }

    #[tokio::test]
    async fn test_unit_handler() {
        let svc = into_handler(|| async {});
        tokio_test::assert_ok!(svc.oneshot(ctx(Event::message("hi"))).await);
    }

    #[tokio::test]
    async fn test_fallible_handler() {
        async fn fails(MessageText(text): MessageText) -> anyhow::Result<()> {
            anyhow::bail!("cannot handle {text}")
        }

        let err = into_handler(fails)
            .oneshot(ctx(Event::message("hi")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot handle hi");
    }

    #[tokio::test]
    async fn test_extraction_failure_is_an_error() {
        async fn needs_text(_text: MessageText) {}

        let result = into_handler(needs_text)
            .oneshot(ctx(Event::timer(chrono::Utc::now())))
            .await;
        tokio_test::assert_err!(result);
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        async fn boom() {
            panic!("kaboom");
        }

        let err = into_handler(boom)
            .oneshot(ctx(Event::message("hi")))
            .await
            .unwrap_err();
        let panic = err.downcast_ref::<HandlerPanic>().unwrap();
        assert_eq!(panic.0, "kaboom");
    }
}
