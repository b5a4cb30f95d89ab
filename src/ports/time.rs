use std::time::Duration;

use time::OffsetDateTime;

pub trait TimeProvider: Clone + Send + Sync + 'static {
    type Sleep<'a>: Future<Output = ()> + Send + 'a
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime;
    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a>;

    /// Time left until `at`, or `None` when `at` is not strictly in the future.
    fn delay_until(&self, at: OffsetDateTime) -> Option<Duration> {
        let delay = at - self.now();
        if delay.is_positive() {
            Some(delay.try_into().unwrap_or(Duration::MAX))
        } else {
            None
        }
    }
}
