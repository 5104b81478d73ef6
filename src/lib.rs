//! beaconwatch: portable beacon presence engine.
//!
//! Watches the output of an external WiFi scan tool for one specific
//! emitter (typically a Remote-ID style beacon), decides whether it is
//! currently live, and decodes the vendor information element it carries.
//! The host binary (`host/`) is a thin consumer that runs the scan command
//! and renders reports.
//!
//! The library is organized in two code layers:
//! - **Portable** (`no_std`, no allocator): `scanner`, `iw`, `vendor`,
//!   `presence`, `filter`, `defaults`, `protocol`, `comm`.
//! - **Host** (`std` feature, on by default): `monitor`, the polling driver
//!   and the scan-source seam.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod comm;
pub mod defaults;
pub mod filter;
pub mod iw;
pub mod presence;
pub mod protocol;
pub mod scanner;
pub mod vendor;

#[cfg(feature = "std")]
pub mod monitor;
