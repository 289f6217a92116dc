//! # OSM Error Handling
//!
//! Error types for the OSM DVFS driver.
//!
//! Errors are grouped the way the domain bring-up treats them:
//!
//! | Category          | Fatal to init | Example                          |
//! |-------------------|---------------|----------------------------------|
//! | Config            | Yes           | Voltage outside 150..=1400 mV    |
//! | Resource          | Yes           | Register window cannot be mapped |
//! | HandshakeTimeout  | Yes           | ACD transfer status never set    |
//! | SecureCall        | Yes           | Secure monitor rejected a write  |
//! | Bandwidth         | No            | Interconnect vote failed         |
//!
//! Interrupt setup problems are not errors: they are logged and the domain
//! registers without (or with degraded) throttle reconciliation.

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// OSM Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// OSM unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed or missing platform data
    Config(ConfigError),
    /// Mapping or allocation failure
    Resource(ResourceError),
    /// ACD register-transfer poll exceeded its bound
    HandshakeTimeout {
        /// Status register that was polled
        status_reg: u8,
    },
    /// Secure monitor refused a register write
    SecureCall {
        /// Physical address of the gated register
        address: u32,
        /// Status returned by the monitor
        status: i32,
    },
    /// Interconnect bandwidth request failed (never fatal)
    Bandwidth,
    /// OSM enable bit is clear after setup
    HardwareNotEnabled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {}", e),
            Self::Resource(e) => write!(f, "resource error: {}", e),
            Self::HandshakeTimeout { status_reg } => {
                write!(f, "ACD handshake timed out (status reg {:#x})", status_reg)
            },
            Self::SecureCall { address, status } => {
                write!(f, "secure write to {:#010x} failed: {}", address, status)
            },
            Self::Bandwidth => write!(f, "bandwidth request failed"),
            Self::HardwareNotEnabled => write!(f, "cpufreq hardware not enabled"),
        }
    }
}

// =============================================================================
// SUB-ERROR TYPES
// =============================================================================

/// Platform configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Compatible string matches no known variant
    UnknownPlatform,
    /// Domain has no CPUs attached
    NoRelatedCpus,
    /// No array-power-mux threshold was supplied
    MissingApmThreshold,
    /// Operating point carries no source node
    MissingNode {
        /// Virtual corner being synthesized
        corner: usize,
    },
    /// Mandatory PLL override annotation is absent
    MissingPllOverride {
        /// Virtual corner being synthesized
        corner: usize,
    },
    /// Voltage outside the programmable range
    VoltageOutOfRange {
        /// Offending voltage in millivolts
        millivolts: u32,
    },
    /// Fewer corners than needed for scaling
    TooFewCorners {
        /// Number of corners found
        found: usize,
    },
    /// More operating points than table rows
    TooManyCorners {
        /// Number of operating points available
        available: usize,
    },
    /// Accepted fewer points than the source reported
    MalformedOppTable {
        /// Points the source reported
        expected: usize,
        /// Points actually accepted
        accepted: usize,
    },
    /// Not enough mem-acc level transitions in the table
    InsufficientMemAccCrossovers {
        /// Crossover values found
        found: usize,
    },
    /// Renumbering mem-acc crossovers would go below corner 0
    CrossoverUnderflow,
    /// Static operating point table could not be parsed
    InvalidOppTable,
    /// No operating points were published after read-back
    NoOperatingPoints,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPlatform => write!(f, "unknown platform"),
            Self::NoRelatedCpus => write!(f, "no related CPUs"),
            Self::MissingApmThreshold => write!(f, "missing APM threshold"),
            Self::MissingNode { corner } => write!(f, "corner {} has no source node", corner),
            Self::MissingPllOverride { corner } => {
                write!(f, "corner {} has no PLL override", corner)
            },
            Self::VoltageOutOfRange { millivolts } => {
                write!(f, "invalid voltage: {} mV", millivolts)
            },
            Self::TooFewCorners { found } => write!(f, "not enough LUT entries ({})", found),
            Self::TooManyCorners { available } => {
                write!(f, "too many operating points ({})", available)
            },
            Self::MalformedOppTable { expected, accepted } => write!(
                f,
                "bad OPP table: {} of {} points accepted",
                accepted, expected
            ),
            Self::InsufficientMemAccCrossovers { found } => {
                write!(f, "only {} MEM-ACC crossover values", found)
            },
            Self::CrossoverUnderflow => write!(f, "MEM-ACC crossover below corner 0"),
            Self::InvalidOppTable => write!(f, "invalid OPP table"),
            Self::NoOperatingPoints => write!(f, "no operating points"),
        }
    }
}

/// Resource acquisition errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// Register window not described for the domain
    NotFound,
    /// Register window already claimed
    Busy,
    /// Register window could not be mapped
    MapFailed,
    /// Allocation failed
    OutOfMemory,
    /// Throttle interrupt lookup failed
    InterruptLookup,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "resource not found"),
            Self::Busy => write!(f, "resource busy"),
            Self::MapFailed => write!(f, "mapping failed"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::InterruptLookup => write!(f, "interrupt lookup failed"),
        }
    }
}

// =============================================================================
// ERROR CONVERSION
// =============================================================================

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<ResourceError> for Error {
    fn from(e: ResourceError) -> Self {
        Error::Resource(e)
    }
}

// =============================================================================
// TESTS
// =============================================================================
