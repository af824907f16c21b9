// Copyright The RK322x Secure Firmware Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Bounded busy-wait polling.
//!
//! Every hardware-status wait in the crate goes through [`wait_bit`] or
//! [`poll_until`]. There is no unbounded wait anywhere: a status bit that
//! never shows up turns into `false` after the fixed bound, and the caller
//! decides whether that is a retryable error or fatal.

use crate::{arch, mmio};

/// Maximum number of poll iterations for hardware status waits.
pub(crate) const POLL_ITERATIONS: u32 = 500;

/// Delay between poll iterations, in microseconds. Together with
/// [`POLL_ITERATIONS`] this bounds every status wait at about a millisecond,
/// so a wedged core or PLL cannot hang the secure world.
pub(crate) const POLL_INTERVAL_US: u64 = 2;

/// Polls `predicate` up to `max_iters` times, `interval_us` apart, and
/// returns whether it became true within the bound.
pub(crate) fn poll_until(
    mut predicate: impl FnMut() -> bool,
    max_iters: u32,
    interval_us: u64,
) -> bool {
    for _ in 0..max_iters {
        if predicate() {
            return true;
        }
        arch::udelay(interval_us);
    }
    false
}

/// Waits for any bit of `mask` to read back set in the register at `pa`,
/// bounded by [`POLL_ITERATIONS`] and [`POLL_INTERVAL_US`].
pub(crate) fn wait_bit(pa: usize, mask: u32) -> bool {
    poll_until(
        // SAFETY: `pa` is a register address forwarded from the SoC map.
        || unsafe { mmio::read32(pa) } & mask != 0,
        POLL_ITERATIONS,
        POLL_INTERVAL_US,
    )
}
