//! Deadlines for asynchronous operations.
//!
//! Most sources have no cooperative cancellation, so [`with_timeout`] does not
//! cancel the wrapped operation when the deadline passes: the operation keeps
//! running on its own task and its result is discarded. Such orphaned
//! operations are counted ([`orphaned_operations`]) and logged so leaks stay
//! visible.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};

static ORPHANED_OPERATIONS: AtomicUsize = AtomicUsize::new(0);

/// Number of operations that outlived their deadline and are still running.
pub fn orphaned_operations() -> usize {
    ORPHANED_OPERATIONS.load(Ordering::Relaxed)
}

/// Run `operation` with an optional deadline.
///
/// Without a deadline the operation is simply awaited. With one, the
/// operation is spawned and raced against a timer; on expiry the caller gets
/// [`Error::Timeout`] while the operation finishes in the background.
pub async fn with_timeout<F, T>(operation: F, timeout: Option<Duration>) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let Some(after) = timeout else {
        return operation.await;
    };

    let mut handle = tokio::spawn(operation);
    match tokio::time::timeout(after, &mut handle).await {
        Ok(joined) => joined.map_err(|err| Error::TaskFailed {
            message: err.to_string(),
        })?,
        Err(_) => {
            let orphaned = ORPHANED_OPERATIONS.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                "Operation exceeded its {:?} deadline and was left running ({} orphaned)",
                after,
                orphaned
            );
            tokio::spawn(async move {
                let outcome = handle.await;
                ORPHANED_OPERATIONS.fetch_sub(1, Ordering::Relaxed);
                tracing::debug!(
                    "Orphaned operation finished after its deadline (ok: {})",
                    matches!(outcome, Ok(Ok(_)))
                );
            });
            Err(Error::Timeout { after })
        }
    }
}

/// Like [`with_timeout`], but drops `operation` when the deadline passes.
///
/// Only for futures whose underlying work is owned elsewhere (for example a
/// handle onto a computation already running on its own task).
pub async fn with_timeout_in_place<F, T>(operation: F, timeout: Option<Duration>) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(after) => tokio::time::timeout(after, operation)
            .await
            .map_err(|_| Error::Timeout { after })?,
        None => operation.await,
    }
}

/// Shrink a deadline by `margin` before forwarding it to a downstream hop,
/// so the local wrapper still has time to react after the remote gives up.
/// Deadlines not longer than the margin are forwarded unchanged.
pub fn reduce_timeout(timeout: Option<Duration>, margin: Duration) -> Option<Duration> {
    timeout.map(|timeout| {
        if timeout > margin {
            timeout - margin
        } else {
            timeout
        }
    })
}

/// Parse a human readable duration such as `"10s"`, `"5m"`, `"1w"`,
/// `"250ms"` or `"1.5 hours"`. A bare number is read as milliseconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || Error::InvalidDuration {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }

    let millis_per_unit: f64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        "w" | "week" | "weeks" => 604_800_000.0,
        "y" | "yr" | "yrs" | "year" | "years" => 31_557_600_000.0,
        _ => return Err(invalid()),
    };

    Ok(Duration::from_millis((value * millis_per_unit).round() as u64))
}

/// Optional variant of [`parse_duration`]: `None` means "no deadline".
pub fn parse_timeout(input: Option<&str>) -> Result<Option<Duration>> {
    input.map(parse_duration).transpose()
}
