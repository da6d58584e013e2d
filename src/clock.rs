//! Time as a capability, so tests can drive reconciliation ticks by hand.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;

pub trait Clock: Send + Sync {
    /// Resolves once `duration` has elapsed.
    fn after(&self, duration: Duration) -> BoxFuture<'static, ()>;

    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn after(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
