// Copyright The RK322x Secure Firmware Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Clock and PLL power sequencer for system suspend.
//!
//! On the way down: save the clock tree state, force the per-domain gates
//! closed, bypass the PLLs onto the 24 MHz oscillator and power them down,
//! and drop the bus dividers to oscillator speed. On the way up: the exact
//! inverse, restoring every saved register under its own write mask so bits
//! this sequencer never touched keep their hardware values.
//!
//! The snapshot is written before the first power-down register write and
//! consumed by the matching restore; the pairing is enforced by runtime
//! assertions because a second suspend in flight would corrupt it.

use crate::mmio::{self, BitField};
use crate::poll;
use crate::soc::{self, Pll, PllCon1};
use log::{debug, error};

// Clock select register 0.
const CORE_DIV: BitField = BitField::new(0x1f, 0);
const PDBUS_DIV: BitField = BitField::new(0x1f, 8);
// Clock select register 1.
const CORE_ACLK_DIV: BitField = BitField::new(0xf, 0);
const CORE_PERI_DIV: BitField = BitField::new(0x7, 4);
const PDBUS_ACLK_DIV: BitField = BitField::new(0x3, 8);
const PDBUS_PCLK_DIV: BitField = BitField::new(0x7, 12);
// Clock select register 10.
const PERI_ACLK_DIV: BitField = BitField::new(0x1f, 0);
const PERI_HCLK_DIV: BitField = BitField::new(0x3, 8);
const PERI_PCLK_DIV: BitField = BitField::new(0x7, 12);
// Clock select register 21.
const HDMI_CEC_DIV: BitField = BitField::new(0x3fff, 0);
const HDMI_CEC_SEL: BitField = BitField::new(0x3, 14);

/// Divider for the HDMI CEC 32 kHz clock off the 24 MHz oscillator.
const HDMI_CEC_32K_DIV: u32 = 732;
/// CEC clock parent select: the oscillator-derived 32 kHz tap.
const HDMI_CEC_32K_SEL: u32 = 2;

/// Time for PLL output to stabilise after power up, before polling lock.
const PLL_POWER_UP_SETTLE_US: u64 = 200;

fn cru_write(offset: usize, value: u32) {
    // SAFETY: All offsets used by this module lie within the CRU window.
    unsafe { mmio::write32(soc::CRU_BASE + offset, value) }
}

fn cru_read(offset: usize) -> u32 {
    // SAFETY: All offsets used by this module lie within the CRU window.
    unsafe { mmio::read32(soc::CRU_BASE + offset) }
}

/// Pre-suspend image of the clock tree, captured at the start of a suspend
/// cycle and replayed at its end. Valid for one cycle only.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct ClockSnapshot {
    mode_con: u32,
    clksel0: u32,
    clksel1: u32,
    clksel10: u32,
    clksel21: u32,
    clkgate: [u32; soc::CLKGATE_CON_COUNT],
}

/// Owner of the clock/PLL suspend sequencing and its snapshot.
pub(crate) struct ClockController {
    saved: ClockSnapshot,
    suspended: bool,
}

impl ClockController {
    pub(crate) const fn new() -> Self {
        Self {
            saved: ClockSnapshot {
                mode_con: 0,
                clksel0: 0,
                clksel1: 0,
                clksel10: 0,
                clksel21: 0,
                clkgate: [0; soc::CLKGATE_CON_COUNT],
            },
            suspended: false,
        }
    }

    /// Tears the clock tree down for system suspend: gates closed, PLLs
    /// bypassed and powered off, dividers at oscillator speed.
    pub(crate) fn suspend(&mut self) {
        assert!(!self.suspended, "suspend entered with a snapshot in flight");
        debug!("clock tree suspend");

        self.disable_domain_clocks();
        self.power_down_plls();
        self.suspended = true;
    }

    /// Restores the clock tree after wake-up, consuming the snapshot taken
    /// by [`Self::suspend`].
    pub(crate) fn resume(&mut self) {
        assert!(self.suspended, "resume without a preceding suspend");

        self.power_up_and_relock_plls();
        self.restore_domain_clocks();
        self.suspended = false;
        debug!("clock tree restored");
    }

    /// Saves every clock gate register and forces the gates in the gating
    /// table closed, under a full-halfword write mask.
    fn disable_domain_clocks(&mut self) {
        for (i, gate) in soc::CLKS_GATING_TABLE.iter().enumerate() {
            self.saved.clkgate[i] = cru_read(soc::cru_clkgate_con(i));
            cru_write(
                soc::cru_clkgate_con(i),
                BitField::new(0xffff, 0).with_wmask(*gate),
            );
        }
    }

    /// Writes back the saved clock gate registers; strictly paired with
    /// [`Self::disable_domain_clocks`] over the same domain count.
    fn restore_domain_clocks(&self) {
        for (i, gate) in self.saved.clkgate.iter().enumerate() {
            cru_write(
                soc::cru_clkgate_con(i),
                BitField::new(0xffff, 0).with_wmask(*gate),
            );
        }
    }

    /// Selects the external 24 MHz oscillator (slow mode), powers the PLLs
    /// down and reduces the dividers of the affected buses to match.
    ///
    /// The snapshot is taken first; no power-down write precedes it.
    fn power_down_plls(&mut self) {
        self.saved.clksel0 = cru_read(soc::cru_clksel_con(0));
        self.saved.clksel1 = cru_read(soc::cru_clksel_con(1));
        self.saved.clksel10 = cru_read(soc::cru_clksel_con(10));
        self.saved.clksel21 = cru_read(soc::cru_clksel_con(21));
        self.saved.mode_con = cru_read(soc::CRU_MODE_CON);

        pll_power_down(Pll::Gpll);
        pll_power_down(Pll::Cpll);
        pll_power_down(Pll::Apll);

        // core
        cru_write(soc::cru_clksel_con(0), CORE_DIV.with_wmask(0));
        cru_write(
            soc::cru_clksel_con(1),
            CORE_ACLK_DIV.with_wmask(0) | CORE_PERI_DIV.with_wmask(0),
        );

        // peri aclk, hclk, pclk
        cru_write(
            soc::cru_clksel_con(10),
            PERI_ACLK_DIV.with_wmask(0) | PERI_HCLK_DIV.with_wmask(0) | PERI_PCLK_DIV.with_wmask(0),
        );

        // pdbus
        cru_write(soc::cru_clksel_con(0), PDBUS_DIV.with_wmask(0));
        cru_write(
            soc::cru_clksel_con(1),
            PDBUS_ACLK_DIV.with_wmask(0) | PDBUS_PCLK_DIV.with_wmask(0),
        );

        // hdmi cec 32k
        cru_write(
            soc::cru_clksel_con(21),
            HDMI_CEC_DIV.with_wmask(HDMI_CEC_32K_DIV) | HDMI_CEC_SEL.with_wmask(HDMI_CEC_32K_SEL),
        );
    }

    /// Powers the PLLs back up, waits for lock and replays the saved divider
    /// and mode state.
    ///
    /// A PLL that does not lock within the poll bound is an unrecoverable
    /// hardware fault: the clock tree is already torn down and there is no
    /// safe degraded state, so this halts instead of returning an error.
    fn power_up_and_relock_plls(&self) {
        pll_power_up(Pll::Apll);
        pll_power_up(Pll::Gpll);
        pll_power_up(Pll::Cpll);

        crate::arch::udelay(PLL_POWER_UP_SETTLE_US);

        wait_pll_lock(Pll::Apll);
        wait_pll_lock(Pll::Gpll);
        wait_pll_lock(Pll::Cpll);

        // hdmi cec 32k
        cru_write(
            soc::cru_clksel_con(21),
            self.saved.clksel21 | HDMI_CEC_DIV.wmask() | HDMI_CEC_SEL.wmask(),
        );

        // pdbus
        cru_write(soc::cru_clksel_con(0), self.saved.clksel0 | PDBUS_DIV.wmask());
        cru_write(
            soc::cru_clksel_con(1),
            self.saved.clksel1 | PDBUS_ACLK_DIV.wmask() | PDBUS_PCLK_DIV.wmask(),
        );

        // peri aclk, hclk, pclk
        cru_write(
            soc::cru_clksel_con(10),
            self.saved.clksel10 | PERI_ACLK_DIV.wmask() | PERI_HCLK_DIV.wmask()
                | PERI_PCLK_DIV.wmask(),
        );

        // core
        cru_write(soc::cru_clksel_con(0), self.saved.clksel0 | CORE_DIV.wmask());
        cru_write(
            soc::cru_clksel_con(1),
            self.saved.clksel1 | CORE_ACLK_DIV.wmask() | CORE_PERI_DIV.wmask(),
        );

        // resume pll modes
        for pll in [Pll::Apll, Pll::Cpll, Pll::Gpll] {
            cru_write(
                soc::CRU_MODE_CON,
                self.saved.mode_con | pll.mode_field().wmask(),
            );
        }
    }
}

/// Bypasses `pll` onto the oscillator and gates it off.
fn pll_power_down(pll: Pll) {
    cru_write(soc::CRU_MODE_CON, pll.mode_field().with_wmask(0));
    cru_write(pll.con1(), soc::PLL_POWER_DOWN_FIELD.with_wmask(1));
}

fn pll_power_up(pll: Pll) {
    cru_write(pll.con1(), soc::PLL_POWER_DOWN_FIELD.with_wmask(0));
}

/// Polls `pll`'s lock status under the shared bound and halts on timeout.
fn wait_pll_lock(pll: Pll) {
    if !poll::wait_bit(soc::CRU_BASE + pll.con1(), PllCon1::LOCK.bits()) {
        error!("PLL failed to lock: {pll:?}");
        panic!("PLL {pll:?} did not lock within the poll bound");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::fake::{self, Access};
    use crate::poll::POLL_ITERATIONS;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    const MODE_CON: usize = soc::CRU_BASE + soc::CRU_MODE_CON;

    fn preload_running_clock_tree() {
        let mut mem = fake::device_memory();
        // Arbitrary pre-suspend contents; every PLL locked and powered up,
        // every PLL in work mode.
        mem.set(MODE_CON, 0x1111);
        mem.set(soc::CRU_BASE + soc::cru_clksel_con(0), 0x3a1c);
        mem.set(soc::CRU_BASE + soc::cru_clksel_con(1), 0x55aa);
        mem.set(soc::CRU_BASE + soc::cru_clksel_con(10), 0x1f0f);
        mem.set(soc::CRU_BASE + soc::cru_clksel_con(21), 0x8123);
        for i in 0..soc::CLKGATE_CON_COUNT {
            mem.set(
                soc::CRU_BASE + soc::cru_clkgate_con(i),
                0x0101_u32.wrapping_mul(i as u32) & 0xffff,
            );
        }
        for pll in [Pll::Apll, Pll::Cpll, Pll::Gpll] {
            mem.set(soc::CRU_BASE + pll.con1(), PllCon1::LOCK.bits());
        }
    }

    fn clock_registers() -> Vec<(usize, u32)> {
        let mem = fake::device_memory();
        let mut regs = vec![
            (MODE_CON, mem.get(MODE_CON)),
        ];
        for i in [0, 1, 10, 21] {
            let pa = soc::CRU_BASE + soc::cru_clksel_con(i);
            regs.push((pa, mem.get(pa)));
        }
        for i in 0..soc::CLKGATE_CON_COUNT {
            let pa = soc::CRU_BASE + soc::cru_clkgate_con(i);
            regs.push((pa, mem.get(pa)));
        }
        for pll in [Pll::Apll, Pll::Cpll, Pll::Gpll] {
            let pa = soc::CRU_BASE + pll.con1();
            regs.push((pa, mem.get(pa)));
        }
        regs
    }

    #[test]
    fn suspend_resume_round_trips_every_register() {
        let _hw = fake::exclusive();
        preload_running_clock_tree();
        let before = clock_registers();

        let mut clock = ClockController::new();
        clock.suspend();
        assert_ne!(before, clock_registers());

        clock.resume();
        assert_eq!(before, clock_registers());

        // The controller is reusable for the next cycle.
        clock.suspend();
        clock.resume();
        assert_eq!(before, clock_registers());
    }

    #[test]
    fn suspend_applies_the_gating_table() {
        let _hw = fake::exclusive();
        preload_running_clock_tree();

        let mut clock = ClockController::new();
        clock.suspend();

        let mem = fake::device_memory();
        for (i, gate) in soc::CLKS_GATING_TABLE.iter().enumerate() {
            assert_eq!(*gate, mem.get(soc::CRU_BASE + soc::cru_clkgate_con(i)));
        }
        // Slow mode selected and power down asserted on every sequenced PLL.
        for pll in [Pll::Apll, Pll::Cpll, Pll::Gpll] {
            assert_eq!(0, pll.mode_field().read(mem.get(MODE_CON)));
            let con1 = PllCon1::from_bits_retain(mem.get(soc::CRU_BASE + pll.con1()));
            assert!(con1.contains(PllCon1::POWER_DOWN));
        }
    }

    #[test]
    fn snapshot_is_taken_before_any_power_down_write() {
        let _hw = fake::exclusive();
        preload_running_clock_tree();

        let mut clock = ClockController::new();
        clock.suspend();

        let mem = fake::device_memory();
        let log = mem.log();
        let first_mode_read = log
            .iter()
            .position(|access| *access == Access::Read(MODE_CON))
            .unwrap();
        let first_mode_write = log
            .iter()
            .position(|access| matches!(access, Access::Write(pa, _) if *pa == MODE_CON))
            .unwrap();
        assert!(first_mode_read < first_mode_write);
    }

    #[test]
    fn pll_that_never_locks_halts_with_no_further_writes() {
        let _hw = fake::exclusive();
        preload_running_clock_tree();

        let mut clock = ClockController::new();
        clock.suspend();
        let writes_after_suspend = fake::device_memory().writes().len();

        let apll_con1 = soc::CRU_BASE + Pll::Apll.con1();
        // Power down left the lock bit untouched; clear it so no PLL ever
        // reports lock again.
        fake::device_memory().set(apll_con1, 0);
        let reads_before = fake::device_memory().reads_of(apll_con1);

        let result = catch_unwind(AssertUnwindSafe(|| clock.resume()));
        assert!(result.is_err());

        let mem = fake::device_memory();
        // The poll ran to exactly its bound, then nothing was written beyond
        // the three PLL power-up words.
        assert_eq!(
            POLL_ITERATIONS as usize,
            mem.reads_of(apll_con1) - reads_before
        );
        assert_eq!(writes_after_suspend + 3, mem.writes().len());
    }

    #[test]
    fn resume_without_suspend_is_rejected() {
        let _hw = fake::exclusive();
        let mut clock = ClockController::new();
        assert!(catch_unwind(AssertUnwindSafe(|| clock.resume())).is_err());
    }
}
