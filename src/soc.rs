// Copyright The RK322x Secure Firmware Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! RK322x register map.
//!
//! Bases, offsets and bit positions are fixed properties of the SoC family,
//! taken from the RK322x technical reference manual. Everything here is a
//! build-time constant; nothing is probed at runtime.

use crate::mmio::BitField;
use bitflags::bitflags;

/// Number of physical cores. Core 0 is the boot core and is never a valid
/// target of `CPU_ON`.
pub(crate) const CORE_COUNT: usize = 4;

/// Clock and reset unit.
pub(crate) const CRU_BASE: usize = 0x110e_0000;
/// General register file, exposes per-core standby status.
pub(crate) const GRF_BASE: usize = 0x1100_0000;
/// On-chip SRAM holding the secure boot handoff record.
pub(crate) const ISRAM_BASE: usize = 0x1008_0000;

/// PLL work/slow mode select register.
pub(crate) const CRU_MODE_CON: usize = 0x0040;
/// Second global soft reset trigger; takes a full magic value, no write mask.
pub(crate) const CRU_GLB_SRST_SND: usize = 0x01f4;
/// Magic value that fires the global second reset.
pub(crate) const GLB_SRST_SND_MAGIC: u32 = 0xeca8;

/// Clock select register `i`.
pub(crate) const fn cru_clksel_con(i: usize) -> usize {
    0x0044 + i * 4
}

/// Clock gate register `i`.
pub(crate) const fn cru_clkgate_con(i: usize) -> usize {
    0x00d0 + i * 4
}

/// Soft reset register `i`. Register 0 carries the per-core reset lines in
/// its low bits.
pub(crate) const fn cru_softrst_con(i: usize) -> usize {
    0x0110 + i * 4
}

/// Number of per-domain clock gate registers.
pub(crate) const CLKGATE_CON_COUNT: usize = 16;

/// Per-domain gate bits forced closed during system suspend. Gates left open
/// (zero bits) feed blocks that must keep ticking across suspend, such as the
/// DDR and PMU domains.
pub(crate) const CLKS_GATING_TABLE: [u32; CLKGATE_CON_COUNT] = [
    // gate: 0-3
    0xefb8, 0x0ff7, 0xfff4, 0x887f,
    // gate: 4-7
    0x0030, 0x00f8, 0x07e0, 0xc000,
    // gate: 8-11
    0xff84, 0xb047, 0x1ca0, 0x57ff,
    // gate: 12-15
    0x0000, 0x00ff, 0x1cc0, 0x000f,
];

/// The PLLs sequenced around system suspend. The DRAM PLL (slot 1 in the CRU)
/// is deliberately absent: firmware never touches it while DDR is in
/// self-refresh.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Pll {
    /// Core (CPU cluster) PLL.
    Apll,
    /// Codec PLL.
    Cpll,
    /// General PLL.
    Gpll,
}

impl Pll {
    const fn slot(self) -> usize {
        match self {
            Self::Apll => 0,
            Self::Cpll => 2,
            Self::Gpll => 3,
        }
    }

    /// CRU offset of this PLL's CON1 (power down and lock status) register.
    pub(crate) const fn con1(self) -> usize {
        self.slot() * 0x10 + 0x4
    }

    /// Work/slow mode select bit for this PLL within `CRU_MODE_CON`.
    pub(crate) const fn mode_field(self) -> BitField {
        BitField::new(0x1, (self.slot() * 4) as u32)
    }
}

bitflags! {
    /// PLL CON1 control and status bits.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub(crate) struct PllCon1: u32 {
        /// Set by hardware once the PLL output is locked.
        const LOCK = 1 << 10;
        /// Gates the PLL off while set.
        const POWER_DOWN = 1 << 15;
    }
}

/// PLL power down bit as a maskable write field.
pub(crate) const PLL_POWER_DOWN_FIELD: BitField = BitField::new(0x1, 15);

/// Write word switching all three sequenced PLLs to slow (oscillator bypass)
/// mode in one go, used by SYSTEM_RESET.
pub(crate) const PLLS_SLOW_MODE: u32 = Pll::Apll.mode_field().with_wmask(0)
    | Pll::Cpll.mode_field().with_wmask(0)
    | Pll::Gpll.mode_field().with_wmask(0);

/// Core standby status register: WFE flags in bits `[3:0]`, WFI flags in
/// bits `[7:4]`, one per core. Read-only.
pub(crate) const GRF_CPU_STATUS1: usize = 0x0524;

/// Status bits showing that `core` sits in WFE or WFI.
pub(crate) const fn core_wfe_i_mask(core: usize) -> u32 {
    (1 << core) | (1 << (core + 4))
}

/// Status bit showing that `core` sits in WFI.
pub(crate) const fn core_wfi_mask(core: usize) -> u32 {
    1 << (core + 4)
}

/// Write word asserting the soft reset line of `core`.
pub(crate) const fn core_soft_reset(core: usize) -> u32 {
    BitField::new(0x1, core as u32).with_wmask(1)
}

/// Write word releasing the soft reset line of `core`.
pub(crate) const fn core_soft_release(core: usize) -> u32 {
    BitField::new(0x1, core as u32).with_wmask(0)
}

/// Status mask of `core`'s reset line within soft reset register 0.
pub(crate) const fn core_held_in_reset_mask(core: usize) -> u32 {
    1 << core
}

/// Write word parking every non-boot core in reset at once.
pub(crate) const NONBOOT_CORES_SOFT_RESET: u32 = BitField::new(0xf, 0).with_wmask(0xe);

/// Time the reset line is held asserted before release.
pub(crate) const RESET_SETTLE_US: u64 = 2;

/// SRAM offset of the handoff lock tag word.
pub(crate) const LOCK_ADDR_OFFSET: usize = 0x04;
/// SRAM offset of the secure boot address word.
pub(crate) const BOOT_ADDR_OFFSET: usize = 0x08;
/// Tag telling a released core's boot ROM path that the handoff record is
/// owned by the secure monitor.
pub(crate) const HANDOFF_LOCK_TAG: u32 = 0xdead_beaf;
/// Physical load address of the secure monitor image, where a released core
/// enters the secure world.
pub(crate) const SECURE_BOOT_ADDRESS: u32 = 0x6840_0000;
