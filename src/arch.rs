// Copyright The RK322x Secure Firmware Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Architectural primitives: barriers, event signalling, bounded delays and
//! the terminal wait-for-interrupt spin.
//!
//! On `aarch64` these are the real instructions. In unit tests they are inert
//! or backed by the fake state in [`fake`], and the non-returning
//! [`power_down_wfi`] panics with [`POWER_DOWN_WFI_MAGIC`] so tests can
//! observe that a path powered the core down.

#[cfg(all(target_arch = "aarch64", not(test)))]
use core::arch::asm;

/// Issues a full-system data synchronization barrier (`dsb sy`).
pub(crate) fn dsb_sy() {
    // SAFETY: `dsb` does not violate safe Rust guarantees.
    #[cfg(all(target_arch = "aarch64", not(test)))]
    unsafe {
        asm!("dsb sy", options(nostack));
    }
}

/// Waits for an interrupt (`wfi`). Execution continues when the core is woken.
pub(crate) fn wfi() {
    // SAFETY: `wfi` does not violate safe Rust guarantees.
    #[cfg(all(target_arch = "aarch64", not(test)))]
    unsafe {
        asm!("wfi", options(nostack));
    }
}

/// Broadcasts a hardware event to all cores (`sev`), waking any core parked
/// in `wfe`. This is a wake mechanism, not a lock.
pub(crate) fn sev() {
    // SAFETY: `sev` does not violate safe Rust guarantees.
    #[cfg(all(target_arch = "aarch64", not(test)))]
    unsafe {
        asm!("sev", options(nostack));
    }
    #[cfg(test)]
    {
        fake::state().events_signalled += 1;
    }
}

/// Masks all exception classes (DAIF) on the calling core.
pub(crate) fn mask_all_exceptions() {
    // SAFETY: Masking exceptions at EL3 does not violate safe Rust
    // guarantees; the caller is about to park the core.
    #[cfg(all(target_arch = "aarch64", not(test)))]
    unsafe {
        asm!("msr daifset, #0xf", options(nostack));
    }
    #[cfg(test)]
    {
        fake::state().exceptions_masked = true;
    }
}

/// Returns the linear index of the calling core (affinity level 0).
pub(crate) fn current_core_index() -> usize {
    #[cfg(all(target_arch = "aarch64", not(test)))]
    {
        let mpidr: u64;
        // SAFETY: Reading MPIDR_EL1 has no side effects.
        unsafe {
            asm!("mrs {}, mpidr_el1", out(reg) mpidr, options(nostack));
        }
        (mpidr & 0xff) as usize
    }
    #[cfg(test)]
    {
        fake::state().core_index
    }
    #[cfg(all(not(target_arch = "aarch64"), not(test)))]
    {
        0
    }
}

/// Spins for at least `micros` microseconds on the generic timer.
#[cfg(all(target_arch = "aarch64", not(test)))]
pub(crate) fn udelay(micros: u64) {
    let frequency: u64;
    let start: u64;
    // SAFETY: Reading the counter-timer registers has no side effects.
    unsafe {
        asm!(
            "mrs {freq}, cntfrq_el0",
            "isb",
            "mrs {cnt}, cntpct_el0",
            freq = out(reg) frequency,
            cnt = out(reg) start,
            options(nostack),
        );
    }
    let ticks = (micros * frequency).div_ceil(1_000_000);
    loop {
        let now: u64;
        // SAFETY: Reading the counter-timer registers has no side effects.
        unsafe {
            asm!("isb", "mrs {}, cntpct_el0", out(reg) now, options(nostack));
        }
        if now.wrapping_sub(start) >= ticks {
            break;
        }
    }
}

/// Host and test builds do not wait; polls count iterations instead.
#[cfg(any(not(target_arch = "aarch64"), test))]
pub(crate) fn udelay(_micros: u64) {}

/// Panic payload used by the test build of [`power_down_wfi`].
#[cfg(test)]
pub(crate) const POWER_DOWN_WFI_MAGIC: &str = "POWER_DOWN_WFI_MAGIC";

/// Parks the calling core in a wait-for-interrupt loop.
///
/// Only a hardware reset of the core (or, for SYSTEM_RESET, the whole SoC)
/// takes execution away from here.
#[cfg(not(test))]
pub(crate) fn power_down_wfi() -> ! {
    dsb_sy();
    loop {
        wfi();
    }
}

/// Test build: unwinds with a magic payload so callers can assert that the
/// core would have been parked.
#[cfg(test)]
pub(crate) fn power_down_wfi() -> ! {
    panic!("{}", POWER_DOWN_WFI_MAGIC);
}

/// Fake architectural state for unit tests.
#[cfg(test)]
pub(crate) mod fake {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// Observable side effects of the architectural primitives.
    pub(crate) struct ArchState {
        /// Index reported by `current_core_index`.
        pub(crate) core_index: usize,
        /// Set once `mask_all_exceptions` ran.
        pub(crate) exceptions_masked: bool,
        /// Number of `sev` broadcasts.
        pub(crate) events_signalled: usize,
    }

    impl ArchState {
        const fn new() -> Self {
            Self {
                core_index: 0,
                exceptions_masked: false,
                events_signalled: 0,
            }
        }
    }

    static STATE: Mutex<ArchState> = Mutex::new(ArchState::new());

    pub(crate) fn state() -> MutexGuard<'static, ArchState> {
        STATE.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the fake state to its cold-boot values.
    pub(crate) fn reset() {
        *state() = ArchState::new();
    }
}
