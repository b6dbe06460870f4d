//! Utilities - membership ids and by-pixel thresholds.

use std::cell::Cell;

use uuid::Uuid;

// =============================================================================
// Membership IDs
// =============================================================================

thread_local! {
    /// Counter appended to every generated id.
    static UID_COUNTER: Cell<u64> = const { Cell::new(0) };
}

/// Generate a process-unique membership id.
///
/// A random v4 UUID suffixed with a monotonically increasing counter, so two
/// ids generated on the same thread never collide even if the UUIDs did.
pub fn uid() -> String {
    let count = UID_COUNTER.with(|counter| {
        let next = counter.get() + 1;
        counter.set(next);
        next
    });
    format!("{}-{}", Uuid::new_v4(), count)
}

/// Number of ids generated so far on this thread.
pub fn uid_counter() -> u64 {
    UID_COUNTER.with(|counter| counter.get())
}

// =============================================================================
// Thresholds
// =============================================================================

/// Number of steps between 0.0 and 1.0 in the by-pixel threshold list.
pub const PIXEL_THRESHOLD_STEPS: usize = 100;

/// Dense threshold list used by [`Mode::ByPixels`](crate::Mode::ByPixels):
/// 0.00, 0.01, ..., 1.00 (101 values).
pub fn thresholds_by_pixels() -> Vec<f64> {
    (0..=PIXEL_THRESHOLD_STEPS)
        .map(|i| i as f64 / PIXEL_THRESHOLD_STEPS as f64)
        .collect()
}
