//! # Operating Points
//!
//! Frequency/voltage pairs and the table interface through which the core
//! reads the CPR power domain corners and publishes the levels it reads
//! back from the hardware.

use crate::error::Result;

/// Platform-only annotations attached to an operating point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OppNode {
    /// PLL override parameters (mandatory for synthesis)
    pub pll_override: Option<u32>,
    /// Mem-acc level of the corner
    pub spare_data: Option<u32>,
    /// PLL post-divider
    pub pll_div: Option<u32>,
}

/// One frequency/voltage pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingPoint {
    /// Frequency in Hz
    pub freq_hz: u64,
    /// Voltage in µV
    pub voltage_uv: u32,
    /// Source node annotations, absent for dynamic points
    pub node: Option<OppNode>,
}

impl OperatingPoint {
    /// Point without a source node
    pub const fn new(freq_hz: u64, voltage_uv: u32) -> Self {
        Self {
            freq_hz,
            voltage_uv,
            node: None,
        }
    }

    /// Frequency in kHz
    pub const fn freq_khz(&self) -> u32 {
        (self.freq_hz / 1000) as u32
    }
}

/// Operating point table of one device
///
/// Lookups only consider enabled points.
pub trait OppTable: Send + Sync {
    /// Number of enabled points
    fn count(&self) -> usize;

    /// Lowest enabled point at or above `freq_hz`
    fn find_ceil(&self, freq_hz: u64) -> Option<OperatingPoint>;

    /// Highest enabled point at or below `freq_hz`
    fn find_floor(&self, freq_hz: u64) -> Option<OperatingPoint>;

    /// Enabled point at exactly `freq_hz`
    fn find_exact(&self, freq_hz: u64) -> Option<OperatingPoint>;

    /// Load the statically described table
    ///
    /// `Ok(false)` when the device has no static table.
    fn load_static_table(&self) -> Result<bool>;

    /// Drop the statically described table
    fn remove_static_table(&self);

    /// Add a dynamic point
    fn add(&self, freq_hz: u64, voltage_uv: u32) -> Result<()>;

    /// Set the voltage of an existing point
    fn adjust_voltage(&self, freq_hz: u64, voltage_uv: u32) -> Result<()>;

    /// Enable the point at `freq_hz`
    fn enable(&self, freq_hz: u64) -> Result<()>;

    /// Disable the point at `freq_hz`
    fn disable(&self, freq_hz: u64) -> Result<()>;

    /// Remove every dynamic point
    fn remove_all_dynamic(&self);

    /// Worst-case transition latency in ns, 0 when unknown
    fn max_transition_latency_ns(&self) -> u32 {
        0
    }
}
