//! # Crossover Derivation
//!
//! Corner pairs where the sequencer switches the memory-array voltage level
//! (mem-acc) and the array power mux (APM).
//!
//! Mem-acc pairs come from the spare word of every hardware row. The first
//! spare value is always 1 and each increase marks a level transition:
//!
//! ```text
//!  corner  C0  C1  C2  C3  C4  C5
//!  level   M1  M1  M2  M2  M2  M3
//!  pairs       └1-2┘       └4-5┘
//! ```

use arrayvec::ArrayVec;

use crate::error::{ConfigError, Result};
use crate::params::CornerTable;
use crate::soc::{LUT_MAX_ENTRIES, SEQ_MEM_ACC_MAX_LEVELS};

/// Low bits of the APM sequencer parameter word
const APM_PARAM_BASE: u32 = 0x39;

/// Two adjacent corners bracketing a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossoverPair {
    /// Last corner below the threshold
    pub below: usize,
    /// First corner at or above the threshold
    pub above: usize,
}

// =============================================================================
// MEM-ACC
// =============================================================================

/// Mem-acc crossover values ready for the sequencer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemAccCrossovers {
    /// Crossover corners, two per level transition
    pub values: ArrayVec<usize, SEQ_MEM_ACC_MAX_LEVELS>,
    /// L-value of the corner at the last crossover
    pub l_val: u32,
    /// A custom threshold moved the last pair
    pub custom: bool,
}

/// Derive the mem-acc crossovers of `table`
///
/// `mem_acc_regs` is the number of crossover registers in the sequencer.
pub fn mem_acc_crossovers(table: &CornerTable, mem_acc_regs: usize) -> Result<MemAccCrossovers> {
    let regs = mem_acc_regs.min(SEQ_MEM_ACC_MAX_LEVELS);
    let needed = regs.saturating_sub(1);
    let mut values = ArrayVec::<usize, SEQ_MEM_ACC_MAX_LEVELS>::new();
    let mut last_spare = 1;

    for row in 0..LUT_MAX_ENTRIES {
        let spare = table.row(row).spare_word;
        if spare <= last_spare || values.len() >= needed {
            continue;
        }
        let below = row.checked_sub(1).ok_or(ConfigError::CrossoverUnderflow)?;
        if values.remaining_capacity() < 2 {
            break;
        }
        last_spare = spare;
        values.push(below);
        values.push(row);
    }

    if values.len() < needed || values.is_empty() {
        log::error!("OSM: only {} MEM-ACC crossover values", values.len());
        return Err(ConfigError::InsufficientMemAccCrossovers {
            found: values.len(),
        }
        .into());
    }

    let custom = match table.mem_acc_vc {
        Some(vc) if vc > 0 => {
            apply_custom_corner(&mut values, vc)?;
            true
        },
        _ => false,
    };

    let last = values[values.len() - 1];
    let l_val = table.row(last).l_val();

    Ok(MemAccCrossovers {
        values,
        l_val,
        custom,
    })
}

/// Move the last pair down to the custom corner
///
/// The switch happens one corner below the custom corner. Earlier values
/// are pushed down to keep the sequence strictly increasing.
fn apply_custom_corner(values: &mut [usize], custom_vc: usize) -> Result<()> {
    let vc = custom_vc - 1;
    let last = values.len() - 1;

    if vc < values[last] {
        values[last - 1] = vc.checked_sub(1).ok_or(ConfigError::CrossoverUnderflow)?;
        values[last] = vc;
    }

    for i in (0..last - 1).rev() {
        if values[i] >= values[i + 1] {
            values[i] = values[i + 1]
                .checked_sub(1)
                .ok_or(ConfigError::CrossoverUnderflow)?;
        }
    }

    Ok(())
}

// =============================================================================
// APM
// =============================================================================

/// Array power mux crossover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApmCrossover {
    /// Corner pair around the switch
    pub pair: CrossoverPair,
}

impl ApmCrossover {
    /// Crossover of `table`, at the last row when the threshold is never reached
    pub fn from_table(table: &CornerTable) -> Self {
        let vc = table.apm_vc.unwrap_or(LUT_MAX_ENTRIES - 1);
        Self {
            pair: CrossoverPair {
                below: vc.saturating_sub(1),
                above: vc,
            },
        }
    }

    /// Sequencer parameter word
    pub const fn param_word(&self) -> u32 {
        APM_PARAM_BASE | ((self.pair.above as u32) << 6)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::corner_table;

    #[test]
    fn test_pairs_from_spare_levels() {
        let table = corner_table(&[1, 1, 2, 2, 2, 3], None);
        let acc = mem_acc_crossovers(&table, 4).unwrap();
        assert_eq!(acc.values.as_slice(), &[1, 2, 4, 5]);
        assert!(!acc.custom);
        assert_eq!(acc.l_val, table.row(5).l_val());
    }

    #[test]
    fn test_level_cap_ignores_later_transitions() {
        let table = corner_table(&[1, 2, 2, 3, 4, 4], None);
        let acc = mem_acc_crossovers(&table, 4).unwrap();
        assert_eq!(acc.values.as_slice(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_insufficient_crossovers() {
        let table = corner_table(&[1, 1, 2, 2], None);
        assert_eq!(
            mem_acc_crossovers(&table, 4),
            Err(ConfigError::InsufficientMemAccCrossovers { found: 2 }.into())
        );
        let flat = corner_table(&[1, 1, 1], None);
        assert_eq!(
            mem_acc_crossovers(&flat, 4),
            Err(ConfigError::InsufficientMemAccCrossovers { found: 0 }.into())
        );
    }

    #[test]
    fn test_first_row_above_base_level_underflows() {
        let table = corner_table(&[2, 3, 3, 4], None);
        assert_eq!(
            mem_acc_crossovers(&table, 4),
            Err(ConfigError::CrossoverUnderflow.into())
        );
    }

    #[test]
    fn test_custom_corner_moves_last_pair_down() {
        let table = corner_table(&[1, 1, 2, 2, 2, 2, 2, 3, 3], Some(6));
        let acc = mem_acc_crossovers(&table, 4).unwrap();
        // Table pairs (1,2) (6,7); custom corner 6 switches at 5
        assert_eq!(acc.values.as_slice(), &[1, 2, 4, 5]);
        assert!(acc.custom);
        assert_eq!(acc.l_val, table.row(5).l_val());
    }

    #[test]
    fn test_custom_corner_renumbers_earlier_values() {
        let table = corner_table(&[1, 1, 1, 2, 2, 3, 3], Some(4));
        let acc = mem_acc_crossovers(&table, 4).unwrap();
        // Table pairs (2,3) (4,5); custom corner 4 gives (2,3), pushing (2,3) to (0,1)
        assert_eq!(acc.values.as_slice(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_custom_corner_above_last_pair_keeps_table_pairs() {
        let table = corner_table(&[1, 1, 2, 2, 3, 3, 3, 3], Some(7));
        let acc = mem_acc_crossovers(&table, 4).unwrap();
        assert_eq!(acc.values.as_slice(), &[1, 2, 3, 4]);
        assert!(acc.custom);
    }

    #[test]
    fn test_custom_corner_renumbering_below_zero_fails() {
        let table = corner_table(&[1, 2, 3, 3], Some(2));
        assert_eq!(
            mem_acc_crossovers(&table, 4),
            Err(ConfigError::CrossoverUnderflow.into())
        );
    }

    #[test]
    fn test_apm_crossover() {
        let mut table = corner_table(&[1, 1, 1], None);
        table.apm_vc = Some(2);
        let apm = ApmCrossover::from_table(&table);
        assert_eq!(apm.pair, CrossoverPair { below: 1, above: 2 });
        assert_eq!(apm.param_word(), 0x39 | (2 << 6));

        table.apm_vc = None;
        let apm = ApmCrossover::from_table(&table);
        assert_eq!(apm.pair, CrossoverPair { below: 38, above: 39 });

        table.apm_vc = Some(0);
        assert_eq!(ApmCrossover::from_table(&table).pair.below, 0);
    }
}
