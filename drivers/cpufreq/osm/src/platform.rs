//! # Platform Collaborators
//!
//! Everything the OSM core consumes from the rest of the system: CPU masks,
//! per-domain and driver-wide configuration, and the traits standing in for
//! the secure monitor, interrupt controller, deferred work queue, thermal
//! pressure aggregator, interconnect voter and resource lookup.
//!
//! ```text
//!             ┌──────────────────┐
//!             │     OsmDriver    │
//!             └────────┬─────────┘
//!      ┌───────────┬───┴────┬─────────────┬──────────────┐
//!      ▼           ▼        ▼             ▼              ▼
//!  Resource    Secure    Thermal     Bandwidth        Delay
//!  Provider    Monitor   Pressure    Voter
//!      │
//!      ├── register windows (domain, ACD)
//!      ├── operating point tables (power domain, CPU)
//!      └── throttle interrupt + deferred work
//! ```

use alloc::sync::Arc;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::error::Result;
use crate::opp::OppTable;
use crate::regs::{Delay, RegisterIo};

// =============================================================================
// CPU MASK
// =============================================================================

bitflags! {
    /// Set of logical CPUs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CpuMask: u64 {
        const _ = !0;
    }
}

impl CpuMask {
    /// Mask holding a single CPU
    pub const fn cpu(cpu: u32) -> Self {
        Self::from_bits_retain(1 << cpu)
    }

    /// Whether `cpu` is a member
    pub const fn has_cpu(&self, cpu: u32) -> bool {
        cpu < 64 && self.bits() & (1 << cpu) != 0
    }

    /// Number of CPUs in the mask
    pub const fn weight(&self) -> u32 {
        self.bits().count_ones()
    }

    /// Lowest CPU in the mask
    pub const fn first(&self) -> Option<u32> {
        if self.is_empty() {
            None
        } else {
            Some(self.bits().trailing_zeros())
        }
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Voltage thresholds published by the CPR power domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CprThresholds {
    /// Array power mux switch voltage in µV (0 when missing)
    pub apm_threshold_uv: u32,
    /// Custom mem-acc switch voltage in µV
    pub mem_acc_threshold_uv: Option<u32>,
}

/// Per frequency-domain configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainConfig {
    /// Frequency domain index
    pub index: u32,
    /// CPUs clocked by this domain
    pub cpus: CpuMask,
    /// Physical base of the domain register window
    pub phys_base: u32,
    /// CPR thresholds for table synthesis
    pub thresholds: CprThresholds,
}

/// Driver-wide configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Platform compatible string
    pub compatible: &'static str,
    /// Reference (XO) clock rate in Hz
    pub xo_rate: u64,
    /// Alternate clock rate in Hz, before the variant divider
    pub alternate_rate: u64,
    /// Every frequency domain of the platform
    pub domains: Vec<DomainConfig>,
}

impl DriverConfig {
    /// Domain clocking `cpu`
    pub fn domain_for_cpu(&self, cpu: u32) -> Option<&DomainConfig> {
        self.domains.iter().find(|domain| domain.cpus.has_cpu(cpu))
    }
}

// =============================================================================
// COLLABORATOR TRAITS
// =============================================================================

/// Secure monitor gate for firmware-owned registers
pub trait SecureMonitor: Send + Sync {
    /// Write `value` to the physical register at `address`
    ///
    /// Returns the monitor status code on failure.
    fn io_writel(&self, address: u32, value: u32) -> core::result::Result<(), i32>;
}

/// System-wide thermal pressure aggregator
pub trait ThermalPressureSink: Send + Sync {
    /// Report the frequency the hardware is capping `cpus` at
    fn update(&self, cpus: CpuMask, throttled_khz: u32);
}

/// Interconnect bandwidth voter
pub trait BandwidthVoter: Send + Sync {
    /// Scale the CPU interconnect path for `freq_hz`
    fn set_bandwidth(&self, cpu: u32, freq_hz: u64) -> Result<()>;
}

/// Throttle interrupt line
pub trait InterruptLine: Send + Sync {
    /// Interrupt number, for diagnostics
    fn number(&self) -> u32;

    /// Bind the line under `name`
    fn request(&self, name: &str) -> Result<()>;

    /// Route the line to `cpus`
    fn set_affinity(&self, cpus: CpuMask) -> Result<()>;

    /// Unmask the line
    fn enable(&self);

    /// Mask the line without waiting for a running handler
    fn disable_nosync(&self);

    /// Unbind the line
    fn free(&self);
}

/// High-priority deferred work item
pub trait DeferredWork: Send + Sync {
    /// Queue the work after `delay_ms`, replacing any pending deadline
    fn schedule(&self, delay_ms: u32);

    /// Cancel pending work and wait for a running instance to finish
    fn cancel_sync(&self);
}

/// Per-domain resource lookup
pub trait ResourceProvider: Send + Sync {
    /// Claim and map the frequency domain register window
    fn map_domain(&self, index: u32) -> Result<Arc<dyn RegisterIo>>;

    /// Unmap and release the domain register window
    fn release_domain(&self, index: u32);

    /// Map the ACD window, if the platform describes one
    fn map_acd(&self, index: u32) -> Option<Arc<dyn RegisterIo>>;

    /// Operating points of the CPR power domain feeding the synthesizer
    fn corner_source(&self, index: u32) -> Result<Arc<dyn OppTable>>;

    /// Operating point table of a CPU device
    fn cpu_opp_table(&self, cpu: u32) -> Result<Arc<dyn OppTable>>;

    /// Throttle interrupt, `Ok(None)` when the domain has none
    fn throttle_irq(&self, index: u32) -> Result<Option<Arc<dyn InterruptLine>>>;

    /// Deferred work item bound to the domain throttle monitor
    fn deferred_work(&self, index: u32) -> Result<Arc<dyn DeferredWork>>;
}

/// Collaborators shared by every domain of a driver instance
#[derive(Clone)]
pub struct Collaborators {
    /// Resource lookup
    pub resources: Arc<dyn ResourceProvider>,
    /// Secure monitor
    pub secure: Arc<dyn SecureMonitor>,
    /// Thermal pressure sink
    pub thermal: Arc<dyn ThermalPressureSink>,
    /// Interconnect voter
    pub bandwidth: Arc<dyn BandwidthVoter>,
    /// Busy-wait delay
    pub delay: Arc<dyn Delay>,
}

impl core::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================
