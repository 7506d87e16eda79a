// =============================================================================
// DUET - Cyclone V SoC Crate
// =============================================================================
// Board support for the Cyclone V HPS (DE10-Nano and friends):
// - Address map and translation regions
// - Reset manager (secondary core release) and the AMP handshake
// - Clock manager tree decoding
// - DW APB UART, console macros and the `log` backend
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(not(test), no_std)]

pub mod memory_map;
pub mod rstmgr;
pub mod amp;
pub mod clkmgr;
pub mod uart;
pub mod console;
pub mod logger;
