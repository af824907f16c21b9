// Copyright The RK322x Secure Firmware Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Core reset and release controller.
//!
//! Drives a core's soft reset line in the shared CRU soft reset register and
//! polls the GRF for the core's standby status. All writes are write-mask
//! protected single stores; the shared register is never read-modify-written,
//! so concurrent callers targeting different cores cannot clobber each other.

use crate::{mmio, poll, soc};

fn cru_write(offset: usize, value: u32) {
    // SAFETY: All offsets used by this module lie within the CRU window.
    unsafe { mmio::write32(soc::CRU_BASE + offset, value) }
}

fn cru_read(offset: usize) -> u32 {
    // SAFETY: All offsets used by this module lie within the CRU window.
    unsafe { mmio::read32(soc::CRU_BASE + offset) }
}

/// Asserts the soft reset line of `core`.
pub(crate) fn assert_reset(core: usize) {
    cru_write(soc::cru_softrst_con(0), soc::core_soft_reset(core));
}

/// Releases the soft reset line of `core`.
pub(crate) fn release_reset(core: usize) {
    cru_write(soc::cru_softrst_con(0), soc::core_soft_release(core));
}

/// Whether `core` is currently held in soft reset. Pure status read.
pub(crate) fn is_held_in_reset(core: usize) -> bool {
    cru_read(soc::cru_softrst_con(0)) & soc::core_held_in_reset_mask(core) != 0
}

/// Polls until `core` reports wait-for-event (or wait-for-interrupt) standby
/// in the GRF, bounded at about a millisecond.
///
/// Returns `false` on timeout; a wedged core must not hang the secure world,
/// so the caller converts the timeout into an error instead of waiting.
pub(crate) fn wait_for_wfe(core: usize) -> bool {
    poll::wait_bit(
        soc::GRF_BASE + soc::GRF_CPU_STATUS1,
        soc::core_wfe_i_mask(core),
    )
}

/// Parks every non-boot core in reset.
///
/// Called once from the boot core's cold boot path, before the non-secure
/// world runs; SMP bring-up then releases the cores one by one via `CPU_ON`.
pub(crate) fn hold_secondaries_in_reset() {
    cru_write(soc::cru_softrst_con(0), soc::NONBOOT_CORES_SOFT_RESET);
}
