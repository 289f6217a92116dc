//! # Governor Policy
//!
//! The per-domain policy shared with the frequency governor, the frequency
//! table built from the hardware lookup table, and the driver contract the
//! governor calls into.

use arrayvec::ArrayVec;

use crate::error::Result;
use crate::platform::CpuMask;
use crate::soc::LUT_MAX_ENTRIES;

/// Transition latency reported when the OPP table gives none
pub const CPUFREQ_ETERNAL: u32 = u32::MAX;

// =============================================================================
// FREQUENCY TABLE
// =============================================================================

/// One row of the governor frequency table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreqEntry {
    /// Selectable frequency
    Valid {
        /// Frequency in kHz
        khz: u32,
        /// Only reachable with boost enabled
        boost: bool,
    },
    /// Row the governor must skip
    Invalid,
}

/// Frequency table indexed by performance state
///
/// The table ends after its last row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: ArrayVec<FreqEntry, LUT_MAX_ENTRIES>,
}

impl FrequencyTable {
    /// Empty table
    pub const fn new() -> Self {
        Self {
            entries: ArrayVec::new_const(),
        }
    }

    /// Append a row, ignoring rows past the hardware table size
    pub fn push(&mut self, entry: FreqEntry) {
        let _ = self.entries.try_push(entry);
    }

    /// Last row, mutable
    pub fn last_mut(&mut self) -> Option<&mut FreqEntry> {
        self.entries.last_mut()
    }

    /// Row at `index`
    pub fn entry(&self, index: usize) -> Option<FreqEntry> {
        self.entries.get(index).copied()
    }

    /// Frequency at `index` in kHz, 0 for invalid or missing rows
    pub fn frequency_at(&self, index: usize) -> u32 {
        match self.entry(index) {
            Some(FreqEntry::Valid { khz, .. }) => khz,
            _ => 0,
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any row is a boost frequency
    pub fn has_boost(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, FreqEntry::Valid { boost: true, .. }))
    }

    /// Drop every row
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// =============================================================================
// POLICY
// =============================================================================

/// Governor policy of one frequency domain
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// CPU owning the policy
    pub cpu: u32,
    /// CPUs managed by the policy
    pub cpus: CpuMask,
    /// CPUs sharing the clock, online or not
    pub related_cpus: CpuMask,
    /// Frequency table read back from the hardware
    pub freq_table: FrequencyTable,
    /// Index resolved by the governor for the fast path
    pub cached_resolved_idx: usize,
    /// Governor may call the fast path
    pub fast_switch_possible: bool,
    /// Any CPU may issue frequency requests
    pub dvfs_possible_from_any_cpu: bool,
    /// Worst-case transition latency in ns
    pub transition_latency_ns: u32,
    /// Boost frequencies are exposed
    pub boost_supported: bool,
}

impl Policy {
    /// Fresh policy for `cpu`
    pub fn new(cpu: u32) -> Self {
        Self {
            cpu,
            cpus: CpuMask::cpu(cpu),
            ..Self::default()
        }
    }

    /// Whether the frequency table exposes boost rows
    pub fn has_boost(&self) -> bool {
        self.freq_table.has_boost()
    }
}

// =============================================================================
// DRIVER CONTRACT
// =============================================================================

/// Callbacks the frequency governor invokes on a scaling driver
pub trait CpufreqDriver: Send + Sync {
    /// Per-policy driver data
    type PData: Send + Sync;

    /// Bring up the domain of `policy.cpu`, fully or not at all
    fn init(&self, policy: &mut Policy) -> Result<Self::PData>;

    /// Tear the domain down
    fn exit(&self, policy: &mut Policy, data: Self::PData) -> Result<()>;

    /// Request performance state `index`
    fn target_index(&self, policy: &Policy, data: &Self::PData, index: usize) -> Result<()>;

    /// Current frequency in kHz
    fn get(&self, policy: &Policy, data: &Self::PData) -> u32;

    /// Low-latency request of the cached index; returns the new frequency
    fn fast_switch(&self, policy: &Policy, data: &Self::PData, target_khz: u32) -> u32;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[FreqEntry]) -> FrequencyTable {
        let mut table = FrequencyTable::new();
        for row in rows {
            table.push(*row);
        }
        table
    }

    const fn valid(khz: u32) -> FreqEntry {
        FreqEntry::Valid { khz, boost: false }
    }

    #[test]
    fn test_frequency_at() {
        let table = table(&[valid(300_000), FreqEntry::Invalid, valid(1_200_000)]);
        assert_eq!(table.frequency_at(0), 300_000);
        assert_eq!(table.frequency_at(1), 0);
        assert_eq!(table.frequency_at(39), 0);
    }

    #[test]
    fn test_has_boost() {
        let mut policy = Policy::new(0);
        policy.freq_table = table(&[valid(300_000)]);
        assert!(!policy.has_boost());
        policy.freq_table.push(FreqEntry::Valid {
            khz: 2_900_000,
            boost: true,
        });
        assert!(policy.has_boost());
    }

    #[test]
    fn test_table_caps_at_hardware_rows() {
        let mut table = FrequencyTable::new();
        for i in 0..(LUT_MAX_ENTRIES as u32 + 5) {
            table.push(valid(i));
        }
        assert_eq!(table.len(), LUT_MAX_ENTRIES);
    }
}
