// Copyright The RK322x Secure Firmware Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Register access primitives.
//!
//! All SoC register traffic goes through [`read32`] and [`write32`] so that
//! unit tests can substitute the fake device memory in [`fake`]. On hardware
//! the monitor flat-maps the device windows, so the physical to virtual
//! translation is the identity.

/// Translates a device physical address to the virtual address it is mapped
/// at. The monitor identity-maps the CRU, GRF and SRAM windows.
pub(crate) const fn phys_to_virt(pa: usize) -> usize {
    pa
}

/// Reads a 32-bit SoC register.
///
/// # Safety
///
/// `pa` must be a register address within one of the mapped device windows of
/// the SoC register map in [`crate::soc`].
#[cfg(not(test))]
pub(crate) unsafe fn read32(pa: usize) -> u32 {
    // SAFETY: The caller guarantees that `pa` lies in a mapped device window,
    // where a volatile 32-bit read has no side effects on memory safety.
    unsafe { (phys_to_virt(pa) as *const u32).read_volatile() }
}

/// Writes a 32-bit SoC register.
///
/// # Safety
///
/// `pa` must be a register address within one of the mapped device windows of
/// the SoC register map in [`crate::soc`].
#[cfg(not(test))]
pub(crate) unsafe fn write32(pa: usize, value: u32) {
    // SAFETY: The caller guarantees that `pa` lies in a mapped device window.
    unsafe { (phys_to_virt(pa) as *mut u32).write_volatile(value) }
}

/// Reads a 32-bit register from the fake device memory.
///
/// # Safety
///
/// Same contract as the hardware version, kept so call sites are identical.
#[cfg(test)]
pub(crate) unsafe fn read32(pa: usize) -> u32 {
    fake::device_memory().read(phys_to_virt(pa))
}

/// Writes a 32-bit register in the fake device memory.
///
/// # Safety
///
/// Same contract as the hardware version, kept so call sites are identical.
#[cfg(test)]
pub(crate) unsafe fn write32(pa: usize, value: u32) {
    fake::device_memory().write(phys_to_virt(pa), value);
}

/// A contiguous bit field within a 32-bit register that is written through a
/// Rockchip write-enable mask.
///
/// The CRU and GRF take the write-enable mask for the low half-word in the
/// high half-word of the written value, so a field can be updated without a
/// read-modify-write and without clobbering unrelated bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct BitField {
    mask: u32,
    shift: u32,
}

impl BitField {
    pub(crate) const fn new(mask: u32, shift: u32) -> Self {
        Self { mask, shift }
    }

    /// Computes the hardware write word setting this field to `value`:
    /// the field bits in the low half-word plus the matching write-enable
    /// bits in the high half-word (`BITS_WITH_WMASK`).
    pub(crate) const fn with_wmask(self, value: u32) -> u32 {
        ((value & self.mask) << self.shift) | (self.mask << (self.shift + 16))
    }

    /// Computes only the write-enable bits for this field (`BITS_WMSK`),
    /// for restoring a saved register image one field at a time.
    pub(crate) const fn wmask(self) -> u32 {
        self.mask << (self.shift + 16)
    }

    /// Extracts this field from a register image.
    #[cfg(test)]
    pub(crate) const fn read(self, word: u32) -> u32 {
        (word >> self.shift) & self.mask
    }
}

/// Fake device memory for unit tests, in the style of a fake register file:
/// a process-wide map of register values plus a log of every access, so tests
/// can assert on write ordering and mask correctness.
#[cfg(test)]
pub(crate) mod fake {
    use crate::soc;
    use std::collections::BTreeMap;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// A single recorded MMIO access.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub(crate) enum Access {
        Read(usize),
        Write(usize, u32),
    }

    /// The fake register file.
    pub(crate) struct DeviceMemory {
        regs: BTreeMap<usize, u32>,
        log: Vec<Access>,
    }

    impl DeviceMemory {
        const fn new() -> Self {
            Self {
                regs: BTreeMap::new(),
                log: Vec::new(),
            }
        }

        fn reset(&mut self) {
            *self = Self::new();
        }

        /// Stores a raw register value without logging or write-mask
        /// semantics, for preloading hardware state.
        pub(crate) fn set(&mut self, pa: usize, value: u32) {
            self.regs.insert(pa, value);
        }

        /// Returns the current register value, zero if never written.
        pub(crate) fn get(&self, pa: usize) -> u32 {
            self.regs.get(&pa).copied().unwrap_or(0)
        }

        /// The access log since the last reset.
        pub(crate) fn log(&self) -> &[Access] {
            &self.log
        }

        /// Number of logged reads of `pa`.
        pub(crate) fn reads_of(&self, pa: usize) -> usize {
            self.log
                .iter()
                .filter(|access| **access == Access::Read(pa))
                .count()
        }

        /// All logged writes, in order.
        pub(crate) fn writes(&self) -> Vec<(usize, u32)> {
            self.log
                .iter()
                .filter_map(|access| match access {
                    Access::Write(pa, value) => Some((*pa, *value)),
                    Access::Read(_) => None,
                })
                .collect()
        }

        pub(crate) fn read(&mut self, pa: usize) -> u32 {
            self.log.push(Access::Read(pa));
            self.get(pa)
        }

        pub(crate) fn write(&mut self, pa: usize, value: u32) {
            self.log.push(Access::Write(pa, value));
            let stored = if has_wmask_semantics(pa) {
                let current = self.get(pa);
                let wmask = value >> 16;
                (current & !wmask) | (value & wmask & 0xffff)
            } else {
                value
            };
            self.regs.insert(pa, stored);
        }
    }

    /// Whether the register at `pa` applies the Rockchip write-enable mask.
    ///
    /// CRU and GRF registers do; the global soft-reset triggers take a full
    /// magic value instead, and the SRAM handoff words are plain memory.
    fn has_wmask_semantics(pa: usize) -> bool {
        let cru = soc::CRU_BASE..soc::CRU_BASE + 0x1000;
        let grf = soc::GRF_BASE..soc::GRF_BASE + 0x1000;
        (cru.contains(&pa) && pa != soc::CRU_BASE + soc::CRU_GLB_SRST_SND)
            || grf.contains(&pa)
    }

    static DEVICE_MEMORY: Mutex<DeviceMemory> = Mutex::new(DeviceMemory::new());

    /// Serializes tests that touch the shared fake hardware.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    /// Locks out other hardware-touching tests and resets all fake state.
    ///
    /// Every test that drives registers or architectural fakes must hold the
    /// returned guard for its whole duration.
    pub(crate) fn exclusive() -> MutexGuard<'static, ()> {
        let guard = TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        device_memory().reset();
        crate::arch::fake::reset();
        guard
    }

    /// Accessor for the fake register file.
    pub(crate) fn device_memory() -> MutexGuard<'static, DeviceMemory> {
        DEVICE_MEMORY.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_field_write_word() {
        let field = BitField::new(0x1f, 8);
        assert_eq!(0x1f00_0a00, field.with_wmask(0xa));
        assert_eq!(0x1f00_0000, field.wmask());
        assert_eq!(0xa, field.read(0x0a55));
    }

    #[test]
    fn bit_field_value_is_truncated_to_mask() {
        let field = BitField::new(0x1, 15);
        assert_eq!(0x8000_8000, field.with_wmask(1));
        assert_eq!(0x8000_0000, field.with_wmask(2));
    }

    #[test]
    fn fake_applies_write_mask_to_cru_registers() {
        let _hw = fake::exclusive();
        let pa = crate::soc::CRU_BASE + crate::soc::CRU_MODE_CON;

        fake::device_memory().set(pa, 0x1111);
        // SAFETY: fake device memory.
        unsafe { write32(pa, BitField::new(0xf, 4).with_wmask(0xa)) };
        assert_eq!(0x11a1, fake::device_memory().get(pa));
    }

    #[test]
    fn fake_stores_sram_words_verbatim() {
        let _hw = fake::exclusive();
        let pa = crate::soc::ISRAM_BASE + 0x8;

        // SAFETY: fake device memory.
        unsafe { write32(pa, 0xdead_0000) };
        assert_eq!(0xdead_0000, fake::device_memory().get(pa));
    }
}
