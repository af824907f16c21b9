// Copyright The RK322x Secure Firmware Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The PSCI state machine.
//!
//! Sequences the reset controller, the clock/PLL sequencer and the SRAM
//! handoff record in response to PSCI requests from the non-secure world,
//! and maps every outcome onto the PSCI result codes. The SMC trap itself
//! belongs to the enclosing monitor runtime; it hands the four parameter
//! registers to [`Psci::handle_smc`].

use crate::clock::ClockController;
use crate::{arch, mmio, reset, soc};
use arm_psci::{AffinityInfo, EntryPoint, ErrorCode, Function, Mpidr, Version};
use log::{debug, error, info};
use spin::mutex::SpinMutex;

const FID_VERSION: u32 = 0x8400_0000;
const FID_CPU_OFF: u32 = 0x8400_0002;
const FID_CPU_ON: u32 = 0x8400_0003;
const FID_CPU_ON_64: u32 = 0xc400_0003;
const FID_SYSTEM_RESET: u32 = 0x8400_0009;
const FID_PSCI_FEATURES: u32 = 0x8400_000a;
const FID_SYSTEM_SUSPEND: u32 = 0x8400_000e;
const FID_SYSTEM_SUSPEND_64: u32 = 0xc400_000e;

/// SoC integration hooks supplied by the enclosing monitor runtime.
///
/// These cover the core-local pieces of the power sequences that live outside
/// this crate: the architectural power-down preparation of the calling core
/// and the data cache maintenance around system suspend.
pub trait PowerPlatform {
    /// Core-local preparation before `CPU_OFF` parks the calling core:
    /// coherency exit, cache clean, SMP bit. A failure is reported to the
    /// caller as INTERNAL_FAILURE.
    fn prepare_core_power_down(&self) -> Result<(), ErrorCode>;

    /// Cleans and invalidates the data cache hierarchy, called after the
    /// clock tree has been torn down for system suspend and before the
    /// suspend wait-for-interrupt.
    fn flush_dcache_all(&self);
}

/// The PSCI service for the RK322x.
///
/// Owns the per-core entry point table and the clock/PLL sequencer; all other
/// coordination with the target cores happens through hardware (the shared
/// reset register, the GRF status bits, the SRAM handoff record and event
/// broadcast), because a core being brought up is not yet running software
/// that could take a lock.
pub struct Psci<P: PowerPlatform> {
    platform: P,
    /// Non-secure resume address per core, written by `CPU_ON` and consumed
    /// once by the warm boot path of the released core.
    entry_points: SpinMutex<[Option<EntryPoint>; soc::CORE_COUNT]>,
    /// System suspend is only ever legal from a single controlling core with
    /// all others parked, so this lock is never contended; `try_lock` turns a
    /// violated precondition into a loud failure instead of a corrupt
    /// snapshot.
    clock: SpinMutex<ClockController>,
}

impl<P: PowerPlatform> Psci<P> {
    /// Creates the PSCI service.
    ///
    /// Call once on the boot core before any secondary core runs and before
    /// the first SMC is dispatched.
    pub fn new(platform: P) -> Self {
        info!("Initializing PSCI, {} cores", soc::CORE_COUNT);

        Self {
            platform,
            entry_points: SpinMutex::new([None; soc::CORE_COUNT]),
            clock: SpinMutex::new(ClockController::new()),
        }
    }

    /// Parks every non-boot core in reset, from the boot core's cold boot
    /// path. SMP bring-up then releases them one by one via `CPU_ON`.
    pub fn hold_secondaries_in_reset(&self) {
        reset::hold_secondaries_in_reset();
    }

    /// Hands an SMC parameter block to the service and returns the PSCI
    /// result word for the first return register.
    pub fn handle_smc(&self, regs: &[u64; 4]) -> u64 {
        match self.handle_smc_inner(regs) {
            Ok(value) => value,
            Err(error) => error.into(),
        }
    }

    /// Consumes the entry point recorded for `core`, if any.
    ///
    /// The warm boot path of a released core calls this exactly once to learn
    /// where the non-secure world wants it to resume.
    pub fn take_entry_point(&self, core: usize) -> Option<EntryPoint> {
        self.entry_points.lock().get_mut(core)?.take()
    }

    fn handle_smc_inner(&self, regs: &[u64; 4]) -> Result<u64, ErrorCode> {
        const SUCCESS: u64 = 0;

        // PSCI_FEATURES takes an arbitrary identifier as its argument, which
        // the typed decoder would reject before the query can be answered, so
        // it is matched on the raw function id first.
        if regs[0] as u32 == FID_PSCI_FEATURES {
            return Self::query_features(regs[1] as u32);
        }

        match Function::try_from(regs)? {
            Function::Version => Ok(u32::from(Self::version()).into()),
            Function::CpuOn { target_cpu, entry } => {
                self.cpu_on(target_cpu, entry)?;
                Ok(SUCCESS)
            }
            Function::CpuOff => {
                self.cpu_off()?;
                Ok(SUCCESS)
            }
            Function::AffinityInfo {
                mpidr,
                lowest_affinity_level,
            } => {
                let affinity_info = self.affinity_info(mpidr, lowest_affinity_level)?;
                Ok(u32::from(affinity_info).into())
            }
            Function::SystemSuspend { entry } => {
                self.system_suspend(entry)?;
                Ok(SUCCESS)
            }
            Function::SystemReset => self.system_reset(),
            _ => Err(ErrorCode::NotSupported),
        }
    }

    /// PSCI 1.0; constant, no side effects.
    fn version() -> Version {
        Version { major: 1, minor: 0 }
    }

    /// Answers `PSCI_FEATURES` for `function_id`: plain SUCCESS for exactly
    /// the subset this service implements, NOT_SUPPORTED for everything else
    /// (including `AFFINITY_INFO`, which is callable but unadvertised, as on
    /// the reference firmware for this SoC).
    fn query_features(function_id: u32) -> Result<u64, ErrorCode> {
        match function_id {
            FID_VERSION
            | FID_PSCI_FEATURES
            | FID_CPU_OFF
            | FID_CPU_ON
            | FID_CPU_ON_64
            | FID_SYSTEM_RESET
            | FID_SYSTEM_SUSPEND
            | FID_SYSTEM_SUSPEND_64 => Ok(0),
            _ => Err(ErrorCode::NotSupported),
        }
    }

    /// Handles `CPU_ON`: releases `target_cpu` from soft reset with its
    /// non-secure entry point recorded for the warm boot path.
    ///
    /// The sequencing contract, in order: record the entry point and barrier;
    /// see the target in standby (unless it is still held in reset); assert
    /// its reset line, settle, release; see it back in standby; only then
    /// publish the SRAM handoff record and broadcast the wake event. Either
    /// bounded standby wait failing is DENIED and the whole operation is the
    /// caller's to re-issue; there is no internal retry and no cancellation
    /// once the reset sequence has begun.
    fn cpu_on(&self, target_cpu: Mpidr, entry: EntryPoint) -> Result<(), ErrorCode> {
        let core = usize::from(target_cpu.aff0);
        if core == 0 || core >= soc::CORE_COUNT {
            return Err(ErrorCode::InvalidParameters);
        }

        debug!("CPU_ON core {core}");

        // Must be visible before the release below lets the core go looking
        // for it.
        self.entry_points.lock()[core] = Some(entry);
        arch::dsb_sy();

        if !reset::is_held_in_reset(core) && !reset::wait_for_wfe(core) {
            error!("core {core} did not reach wfe before soft reset");
            return Err(ErrorCode::Denied);
        }

        reset::assert_reset(core);
        arch::dsb_sy();
        arch::udelay(soc::RESET_SETTLE_US);
        reset::release_reset(core);
        arch::dsb_sy();

        if !reset::wait_for_wfe(core) {
            error!("core {core} did not reach wfe after soft reset");
            return Err(ErrorCode::Denied);
        }

        write_secure_handoff();
        arch::sev();
        arch::dsb_sy();

        Ok(())
    }

    /// Handles `CPU_OFF` for the calling core: all exceptions masked, the
    /// platform's core-local teardown, then a terminal wait-for-interrupt.
    /// Only another core's `CPU_ON` (a hardware reset) takes the core out of
    /// it, so on success this does not return.
    fn cpu_off(&self) -> Result<(), ErrorCode> {
        let core = arch::current_core_index();
        if core == 0 || core >= soc::CORE_COUNT {
            return Err(ErrorCode::InvalidParameters);
        }

        debug!("CPU_OFF core {core}");

        arch::mask_all_exceptions();
        if let Err(error) = self.platform.prepare_core_power_down() {
            error!("core {core} power down preparation failed: {error:?}");
            return Err(ErrorCode::InternalFailure);
        }

        arch::power_down_wfi()
    }

    /// Handles `AFFINITY_INFO`: a pure read of the core's WFI status bit in
    /// the GRF. A core parked by `CPU_OFF` sits in WFI, so the bit being set
    /// maps to OFF and clear to ON. The lowest affinity level argument is
    /// accepted for interface compatibility; core-level queries are the only
    /// granularity this SoC reports.
    fn affinity_info(
        &self,
        affinity: Mpidr,
        _lowest_affinity_level: u32,
    ) -> Result<AffinityInfo, ErrorCode> {
        let core = usize::from(affinity.aff0);
        if core >= soc::CORE_COUNT {
            return Err(ErrorCode::InvalidParameters);
        }

        // SAFETY: `GRF_CPU_STATUS1` lies within the GRF window.
        let status = unsafe { mmio::read32(soc::GRF_BASE + soc::GRF_CPU_STATUS1) };
        debug!("affinity_info core {core} status {status:#x}");

        if status & soc::core_wfi_mask(core) != 0 {
            Ok(AffinityInfo::Off)
        } else {
            Ok(AffinityInfo::On)
        }
    }

    /// Handles `SYSTEM_RESET`: PLLs to slow mode, then the global soft reset
    /// trigger. The SoC resets before the terminal spin gets far.
    fn system_reset(&self) -> ! {
        info!("system reset");

        // SAFETY: `CRU_MODE_CON` lies within the CRU window.
        unsafe { mmio::write32(soc::CRU_BASE + soc::CRU_MODE_CON, soc::PLLS_SLOW_MODE) };
        arch::dsb_sy();
        // SAFETY: `CRU_GLB_SRST_SND` lies within the CRU window.
        unsafe { mmio::write32(soc::CRU_BASE + soc::CRU_GLB_SRST_SND, soc::GLB_SRST_SND_MAGIC) };
        arch::dsb_sy();

        arch::power_down_wfi()
    }

    /// Handles `SYSTEM_SUSPEND`: clock/PLL teardown, dcache clean and
    /// invalidate, wait-for-interrupt, then restore.
    ///
    /// The entry point argument is accepted but not consumed: on this SoC the
    /// suspend subset resumes past the wait-for-interrupt on the calling
    /// core rather than re-entering at `entry`. Callers must only invoke this
    /// from a single controlling core with every other core already parked;
    /// a concurrent invocation trips the sequencer assertion.
    fn system_suspend(&self, _entry: EntryPoint) -> Result<(), ErrorCode> {
        debug!("system suspend");

        let mut clock = self
            .clock
            .try_lock()
            .expect("SYSTEM_SUSPEND invoked while another suspend is in flight");

        clock.suspend();
        self.platform.flush_dcache_all();

        arch::wfi();

        clock.resume();
        Ok(())
    }
}

/// Publishes the secure boot address and lock tag into the SRAM handoff
/// record for a freshly released core, completed with a barrier. The next
/// reset of that core implicitly invalidates the record.
fn write_secure_handoff() {
    // SAFETY: The handoff offsets lie within the reserved on-chip SRAM
    // window.
    unsafe {
        mmio::write32(
            soc::ISRAM_BASE + soc::BOOT_ADDR_OFFSET,
            soc::SECURE_BOOT_ADDRESS,
        );
        mmio::write32(soc::ISRAM_BASE + soc::LOCK_ADDR_OFFSET, soc::HANDOFF_LOCK_TAG);
    }
    arch::dsb_sy();
}
