//! # Lookup Table Read-back
//!
//! Reads the live OSM lookup table, whoever programmed it, and turns it
//! into the governor frequency table plus operating points on the CPU
//! device.
//!
//! The table ends at the first row repeating the previous frequency. A
//! turbo indicator row (core count 1) right before the end is the boost
//! frequency.

use crate::bitfield::{LUT_CORE_COUNT, LUT_L_VAL, LUT_VOLT};
use crate::error::{ConfigError, Result};
use crate::opp::OppTable;
use crate::policy::{FreqEntry, FrequencyTable};
use crate::regs::RegisterIo;
use crate::soc::{SocData, LUT_MAX_ENTRIES, LUT_TURBO_IND};

/// Outcome of the read-back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBack {
    /// Governor frequency table
    pub table: FrequencyTable,
    /// A static OPP table exists and drives interconnect scaling
    pub bandwidth_scaling: bool,
}

impl ReadBack {
    /// Fast switching needs dynamic operating points
    pub fn fast_switch_possible(&self) -> bool {
        !self.bandwidth_scaling
    }
}

/// Clock rates used to decode the frequency column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutClocks {
    /// Reference clock in Hz
    pub xo_rate: u64,
    /// Divided alternate clock in Hz
    pub cpu_hw_rate: u64,
}

/// Read the lookup table and reconcile it with `opp`
pub fn read_lut(
    regs: &dyn RegisterIo,
    soc: &SocData,
    opp: &dyn OppTable,
    clocks: LutClocks,
) -> Result<ReadBack> {
    let bandwidth_scaling = match opp.load_static_table() {
        Ok(true) => {
            disable_all(opp);
            true
        },
        Ok(false) => false,
        Err(e) => {
            log::error!("OSM: Invalid OPP table: {}", e);
            return Err(ConfigError::InvalidOppTable.into());
        },
    };

    let publish = |khz: u32, voltage_uv: u32| -> Result<()> {
        let freq_hz = khz as u64 * 1000;
        if !bandwidth_scaling {
            return opp.add(freq_hz, voltage_uv);
        }
        opp.adjust_voltage(freq_hz, voltage_uv).map_err(|e| {
            log::error!("OSM: Voltage update failed freq={}", khz);
            e
        })?;
        opp.enable(freq_hz)
    };

    let mut table = FrequencyTable::new();
    let mut prev_khz = 0;

    for row in 0..LUT_MAX_ENTRIES {
        let pos = soc.row(row);
        let freq_word = regs.read32(soc.reg_freq_lut + pos);
        let alternate = soc.lut_src.unpack(freq_word) != 0;
        let l_val = LUT_L_VAL.unpack(freq_word);
        let core_count = LUT_CORE_COUNT.unpack(freq_word);
        let voltage_uv = LUT_VOLT.unpack(regs.read32(soc.reg_volt_lut + pos)) * 1000;

        let khz = if alternate {
            (clocks.xo_rate * l_val as u64 / 1000) as u32
        } else {
            (clocks.cpu_hw_rate / 1000) as u32
        };

        let entry = if khz != prev_khz && core_count != LUT_TURBO_IND {
            match publish(khz, voltage_uv) {
                Ok(()) => {
                    #[cfg(feature = "debug")]
                    log::debug!("OSM: index={} freq={} core_count={}", row, khz, core_count);
                    FreqEntry::Valid { khz, boost: false }
                },
                Err(_) => {
                    log::warn!("OSM: failed to update OPP for freq={}", khz);
                    FreqEntry::Invalid
                },
            }
        } else {
            FreqEntry::Invalid
        };

        if row > 0 && khz == prev_khz {
            if let Some(last) = table.last_mut() {
                if *last == FreqEntry::Invalid {
                    match publish(prev_khz, voltage_uv) {
                        Ok(()) => {
                            *last = FreqEntry::Valid {
                                khz: prev_khz,
                                boost: true,
                            }
                        },
                        Err(_) => log::warn!("OSM: can't update OPP for freq={}", khz),
                    }
                }
            }
            break;
        }

        table.push(entry);
        prev_khz = khz;
    }

    Ok(ReadBack {
        table,
        bandwidth_scaling,
    })
}

/// Disable every point so only levels present in hardware come back
fn disable_all(opp: &dyn OppTable) {
    let mut rate = 0;
    while let Some(point) = opp.find_ceil(rate) {
        if let Err(e) = opp.disable(point.freq_hz) {
            log::warn!("OSM: cannot disable OPP {} Hz: {}", point.freq_hz, e);
        }
        rate = point.freq_hz + 1;
    }
}

/// Frequency currently requested from the OSM, in kHz
///
/// Indexes past the hardware table clamp to its last row.
pub fn current_khz(regs: &dyn RegisterIo, soc: &SocData, table: &FrequencyTable) -> u32 {
    let index = (regs.read32(soc.reg_perf_state) as usize).min(LUT_MAX_ENTRIES - 1);
    table.frequency_at(index)
}

// =============================================================================
// TESTS
// =============================================================================
