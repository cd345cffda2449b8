//! Status distribution and completion percentages of a run.

use std::collections::HashMap;

use tracing::warn;

use crate::models::{StatusCount, StatusDefinition, StatusSubtotal, StatusTally};

/// Build the status distribution of a run from grouped case run counts.
///
/// Every known status gets an entry, including ones no case run is in.
/// Tallies for status ids absent from `known` are dropped so that `total`
/// always equals the sum of `per_status`.
pub fn compute_subtotal(known: &[StatusDefinition], tallies: &[StatusTally]) -> StatusSubtotal {
    let mut counts: HashMap<i32, u64> = known.iter().map(|s| (s.id, 0)).collect();

    for tally in tallies {
        match counts.get_mut(&tally.status_id) {
            Some(count) => *count += tally.count,
            None => warn!(
                status_id = tally.status_id,
                count = tally.count,
                "Ignoring case runs in unknown status"
            ),
        }
    }

    let mut statuses: Vec<&StatusDefinition> = known.iter().collect();
    statuses.sort_by_key(|s| s.id);
    statuses.dedup_by_key(|s| s.id);

    let per_status: Vec<StatusCount> = statuses
        .into_iter()
        .map(|status| StatusCount {
            status: status.clone(),
            count: counts.get(&status.id).copied().unwrap_or(0),
        })
        .collect();

    let total = per_status.iter().map(|e| e.count).sum();
    let complete_count = per_status
        .iter()
        .filter(|e| e.status.is_complete())
        .map(|e| e.count)
        .sum();
    let failure_count = per_status
        .iter()
        .filter(|e| e.status.is_failure())
        .map(|e| e.count)
        .sum();

    StatusSubtotal {
        per_status,
        total,
        complete_count,
        failure_count,
        complete_percent: ratio_percent(complete_count, total),
        // Failures are measured against concluded case runs, not all of them.
        failure_percent: ratio_percent(failure_count, complete_count),
    }
}

/// `count / total * 100` rounded to two decimals, 0 when `total` is 0.
pub fn percentage_of(total: u64, count: u64) -> f64 {
    (ratio_percent(count, total) * 100.0).round() / 100.0
}

/// Rounded share of complete case runs, the figure automatic closing checks.
pub fn completed_percentage(subtotal: &StatusSubtotal) -> f64 {
    percentage_of(subtotal.total, subtotal.complete_count)
}

fn ratio_percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 * 100.0 / total as f64
}
