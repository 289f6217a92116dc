//! # Parameter Table Synthesizer
//!
//! Turns the CPR power domain operating points into the four register words
//! the OSM expects for every virtual corner.
//!
//! ```text
//!  voltage_word  [21:16] VC       [11:0] mV
//!  freq_word     [src]   ALT SRC  [25:24] PLL DIV  [18:16] CORES  [7:0] L
//!  override_word qcom,pll-override
//!  spare_word    qcom,spare-data (mem-acc level)
//! ```
//!
//! Corner 0 runs from the reference clock, every later corner from the
//! alternate source.

use arrayvec::ArrayVec;

use crate::bitfield::{LUT_CORE_COUNT, LUT_L_VAL, LUT_PLL_DIV, LUT_VOLT, LUT_VOLT_VC};
use crate::error::{ConfigError, Result};
use crate::opp::OppTable;
use crate::platform::CprThresholds;
use crate::soc::{SocData, LUT_MAX_ENTRIES};

/// Lowest frequency searched when walking the operating points
const FIRST_SEARCH_HZ: u64 = 1000;

/// Lowest programmable corner voltage
pub const MIN_CORNER_MV: u32 = 150;

/// Highest programmable corner voltage
pub const MAX_CORNER_MV: u32 = 1400;

// =============================================================================
// CORNER TABLE
// =============================================================================

/// Register words of one virtual corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CornerEntry {
    /// Virtual corner and voltage
    pub voltage_word: u32,
    /// Clock source, core count, divider and L-value
    pub freq_word: u32,
    /// PLL override parameters
    pub override_word: u32,
    /// Mem-acc level
    pub spare_word: u32,
}

impl CornerEntry {
    /// Voltage in millivolts
    pub const fn millivolts(&self) -> u32 {
        LUT_VOLT.unpack(self.voltage_word)
    }

    /// Virtual corner index
    pub const fn virtual_corner(&self) -> u32 {
        LUT_VOLT_VC.unpack(self.voltage_word)
    }

    /// PLL L-value
    pub const fn l_val(&self) -> u32 {
        LUT_L_VAL.unpack(self.freq_word)
    }
}

/// Synthesized corners plus the two crossover corners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CornerTable {
    entries: ArrayVec<CornerEntry, LUT_MAX_ENTRIES>,
    /// First corner at or above the APM threshold
    pub apm_vc: Option<usize>,
    /// First corner at or above the custom mem-acc threshold
    pub mem_acc_vc: Option<usize>,
}

impl CornerTable {
    /// Table from already packed corners
    pub fn from_entries(
        corners: &[CornerEntry],
        apm_vc: Option<usize>,
        mem_acc_vc: Option<usize>,
    ) -> Result<Self> {
        let entries = corners
            .try_into()
            .map_err(|_| ConfigError::TooManyCorners {
                available: corners.len(),
            })?;
        Ok(Self {
            entries,
            apm_vc,
            mem_acc_vc,
        })
    }

    /// Number of synthesized corners
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no corner was synthesized
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Synthesized corners
    pub fn entries(&self) -> &[CornerEntry] {
        &self.entries
    }

    /// Corner programmed into hardware row `row`
    ///
    /// Rows past the synthesized corners repeat the last corner.
    pub fn row(&self, row: usize) -> CornerEntry {
        let last = self.entries.len().saturating_sub(1);
        self.entries
            .get(row.min(last))
            .copied()
            .unwrap_or_default()
    }
}

// =============================================================================
// SYNTHESIS
// =============================================================================

/// Inputs of the synthesizer besides the operating points
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    /// Target layout
    pub soc: &'a SocData,
    /// CPR thresholds
    pub thresholds: CprThresholds,
    /// CPUs in the frequency domain
    pub cpu_count: u32,
    /// Reference clock in Hz
    pub xo_rate: u64,
}

/// Build the corner table from the enabled points of `source`
pub fn synthesize(source: &dyn OppTable, input: &SynthesisInput<'_>) -> Result<CornerTable> {
    let available = source.count();
    if available < 2 {
        return Err(ConfigError::TooFewCorners { found: available }.into());
    }
    if available > LUT_MAX_ENTRIES {
        return Err(ConfigError::TooManyCorners { available }.into());
    }

    let apm_uv = input.thresholds.apm_threshold_uv;
    if apm_uv == 0 {
        return Err(ConfigError::MissingApmThreshold.into());
    }
    let mem_acc_uv = input.thresholds.mem_acc_threshold_uv.filter(|&uv| uv > 0);

    let mut entries = ArrayVec::<CornerEntry, LUT_MAX_ENTRIES>::new();
    let mut apm_vc = None;
    let mut mem_acc_vc = None;
    let mut rate = FIRST_SEARCH_HZ;

    while let Some(point) = source.find_ceil(rate) {
        let corner = entries.len();
        if entries.is_full() {
            return Err(ConfigError::TooManyCorners {
                available: corner + 1,
            }
            .into());
        }

        let node = point.node.ok_or(ConfigError::MissingNode { corner })?;
        let override_word = node
            .pll_override
            .ok_or(ConfigError::MissingPllOverride { corner })?;
        let spare_word = node.spare_data.unwrap_or(0);
        let pll_div = node.pll_div.unwrap_or(0);

        if apm_vc.is_none() && point.voltage_uv >= apm_uv {
            apm_vc = Some(corner);
        }
        if let Some(threshold) = mem_acc_uv {
            if mem_acc_vc.is_none() && point.voltage_uv >= threshold {
                mem_acc_vc = Some(corner);
            }
        }

        let millivolts = point.voltage_uv / 1000;
        if !(MIN_CORNER_MV..=MAX_CORNER_MV).contains(&millivolts) {
            log::error!("OSM: Read invalid voltage: {} mV", millivolts);
            return Err(ConfigError::VoltageOutOfRange { millivolts }.into());
        }

        let alternate = u32::from(corner != 0);
        let l_val = (point.freq_hz / input.xo_rate.max(1)) as u32;
        let entry = CornerEntry {
            voltage_word: LUT_VOLT_VC.pack(corner as u32) | LUT_VOLT.pack(millivolts),
            freq_word: input.soc.lut_src.pack(alternate)
                | LUT_CORE_COUNT.pack(input.cpu_count)
                | LUT_PLL_DIV.pack(pll_div)
                | LUT_L_VAL.pack(l_val),
            override_word,
            spare_word,
        };

        #[cfg(feature = "debug")]
        log::debug!(
            "OSM: [{}] freq={:#x} volt={:#x} override={:#x} spare={:#x}",
            corner,
            entry.freq_word,
            entry.voltage_word,
            entry.override_word,
            entry.spare_word
        );

        entries.push(entry);
        rate = point.freq_hz + 1;
    }

    // A custom mem-acc corner needs enough levels below it to be usable.
    let min_mem_acc_vc = input.soc.mem_acc_regs.saturating_sub(1);
    if let Some(threshold) = mem_acc_uv {
        if mem_acc_vc.map_or(true, |vc| vc < min_mem_acc_vc) {
            log::debug!(
                "OSM: MEM-ACC corner: invalid values VC{:?} {}uV",
                mem_acc_vc,
                threshold
            );
            mem_acc_vc = None;
        }
    }

    if entries.len() < available {
        log::error!("OSM: Got bad OPP table from power domain");
        return Err(ConfigError::MalformedOppTable {
            expected: available,
            accepted: entries.len(),
        }
        .into());
    }
    if entries.len() < 2 {
        return Err(ConfigError::TooFewCorners {
            found: entries.len(),
        }
        .into());
    }

    Ok(CornerTable {
        entries,
        apm_vc,
        mem_acc_vc,
    })
}

// =============================================================================
// TESTS
// =============================================================================
