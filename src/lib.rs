// Copyright The RK322x Secure Firmware Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! PSCI power management for the Rockchip RK322x.
//!
//! Implements the PSCI 1.0 subset this SoC family supports: `CPU_ON`,
//! `CPU_OFF`, `AFFINITY_INFO`, `SYSTEM_SUSPEND`, `SYSTEM_RESET`, plus
//! `PSCI_VERSION` and `PSCI_FEATURES`. Secondary cores are brought up and
//! down through the CRU per-core soft reset lines and a handoff record in
//! on-chip SRAM; system suspend sequences the clock tree and PLLs down and
//! back up around a wait-for-interrupt.
//!
//! The crate is the power management service of a secure monitor, not a
//! monitor itself: the embedding runtime owns the SMC trap, cache
//! maintenance and the warm boot entry, and talks to this crate through
//! [`Psci::handle_smc`], [`Psci::take_entry_point`] and the
//! [`PowerPlatform`] hooks.
//!
//! Unit tests run on the host against fake device memory and fake
//! architectural state, so every register sequence is asserted without
//! hardware.

#![cfg_attr(not(test), no_std)]

mod arch;
mod clock;
mod mmio;
mod poll;
mod psci;
mod reset;
mod soc;

pub use psci::{PowerPlatform, Psci};
