use std::{
    future::Future,
    time::{Duration, Instant},
};

/// Extension for [`Future`]s that are helpful for testing.
pub(crate) trait AssertPendingFutureExt {
    /// Ensure that the future is pending.
    async fn assert_pending(&mut self);
}

impl<F> AssertPendingFutureExt for F
where
    F: Future + Send + Unpin,
{
    async fn assert_pending(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            _ = self => {
                panic!("not pending");
            }
        }
    }
}

/// Extension for [`Future`]s that are helpful for testing.
pub(crate) trait WithTimeoutFutureExt {
    /// Output of the wrapped future.
    type Output;

    /// Await the future, panicking after a generous timeout.
    async fn with_timeout(self) -> Self::Output;
}

impl<F> WithTimeoutFutureExt for F
where
    F: Future + Send,
{
    type Output = F::Output;

    async fn with_timeout(self) -> Self::Output {
        tokio::time::timeout(Duration::from_secs(1), self)
            .await
            .expect("timeout")
    }
}

/// Assert that the result of `f` converges against the given value.
pub(crate) async fn assert_converge_eq<F, T>(f: F, expected: T)
where
    F: Fn() -> T + Send,
    T: Eq + std::fmt::Debug + Send,
{
    let start = Instant::now();

    loop {
        let actual = f();
        if actual == expected {
            return;
        }
        if start.elapsed() > Duration::from_secs(1) {
            assert_eq!(actual, expected);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
