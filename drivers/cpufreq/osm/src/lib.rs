//! # Helix OSM CPU Frequency Driver
//!
//! Core of the Operating State Manager (OSM) hardware DVFS driver for
//! Qualcomm-style application processor clusters.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        cpufreq framework                          │
//! │        init / exit / target_index / fast_switch / get             │
//! └───────────────────────────────┬───────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┴───────────────────────────────────┐
//! │                        OsmDriver (domain)                         │
//! │                                                                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │  Synthesizer │─▶│  Sequencer   │─▶│ LUT read-back + OPPs     │ │
//! │  │  (params)    │  │  crossover   │  │ (lut)                    │ │
//! │  └──────────────┘  │  acd         │  └──────────────────────────┘ │
//! │                    └──────────────┘                               │
//! │  ┌─────────────────────────────────────────────────────────────┐  │
//! │  │ Throttle monitor: interrupt → polling → thermal pressure    │  │
//! │  └─────────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────┬───────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┴───────────────────────────────────┐
//! │  Platform collaborators: register windows, secure monitor, OPP    │
//! │  tables, interrupts, deferred work, thermal, interconnect         │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Variants
//!
//! - `qcom,cpufreq-hw`: firmware-programmed OSM with throttle vote
//! - `qcom,cpufreq-hw-8998`: OS-programmed OSM with ACD
//! - `qcom,cpufreq-epss`: firmware-programmed EPSS

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod acd;
pub mod bitfield;
pub mod crossover;
pub mod domain;
pub mod error;
pub mod lut;
pub mod opp;
pub mod params;
pub mod platform;
pub mod policy;
pub mod regs;
pub mod sequencer;
pub mod soc;
pub mod throttle;

#[cfg(test)]
mod testing;

// Re-exports
pub use domain::{OsmDomain, OsmDriver};
pub use error::{ConfigError, Error, ResourceError, Result};
pub use opp::{OperatingPoint, OppNode, OppTable};
pub use platform::{
    BandwidthVoter, Collaborators, CprThresholds, CpuMask, DeferredWork, DomainConfig,
    DriverConfig, InterruptLine, ResourceProvider, SecureMonitor, ThermalPressureSink,
};
pub use policy::{CpufreqDriver, FreqEntry, FrequencyTable, Policy, CPUFREQ_ETERNAL};
pub use regs::{Delay, MmioWindow, RegisterIo};
pub use soc::SocData;
pub use throttle::{ThrottleMonitor, ThrottleState};
