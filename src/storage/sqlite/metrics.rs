//! Metrics recording for the `SQLite` store.

use std::time::Instant;

/// Records count and latency of one storage operation.
///
/// Emits `ticketcleaner_storage_operations_total` and
/// `ticketcleaner_storage_operation_duration_ms`, labelled by operation and by
/// outcome (`success` or `error`).
pub fn record_operation_metrics<T, E>(
    operation: &'static str,
    start: Instant,
    result: &std::result::Result<T, E>,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!(
        "ticketcleaner_storage_operations_total",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "ticketcleaner_storage_operation_duration_ms",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
