//! Deadline racing
//!
//! A unit of work races against a hard outer deadline: whichever finishes
//! first determines the outcome, and a late result is discarded.
//! Cancellation is cooperative (the losing future is dropped, not
//! forcibly terminated).

use std::future::Future;
use std::time::Duration;

/// Hard outer deadline of the reference deployment
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(9500);

/// Run `work` against a deadline. `None` means the deadline won and the
/// work was dropped mid-flight.
pub async fn with_deadline<F, T>(deadline: Duration, work: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        result = work => Some(result),
        () = tokio::time::sleep(deadline) => None,
    }
}
