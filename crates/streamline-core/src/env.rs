//! Environment abstraction for deterministic testing.
//!
//! Decouples drivers from system time so the same orchestration code runs
//! against the wall clock in production and a virtual clock in tests.
//! The state machines in this crate never call it; only drivers do.

use std::time::Duration;

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production uses `std::time::Instant`; tests may use virtual time
    /// (e.g. `tokio::time::Instant` with a paused clock).
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; it backs reconnect and slow-mode timers.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Used for outbound message timestamps, never for timeouts.
    fn wall_clock_millis(&self) -> u64;
}
