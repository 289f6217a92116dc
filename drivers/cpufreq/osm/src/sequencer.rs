//! # OSM Programming Sequencer
//!
//! Programs an OSM that firmware left unconfigured: the corner table, the
//! mem-acc and APM crossovers, the DCVS tunables, the boost and droop state
//! machines and ACD, then enables the block.
//!
//! Most registers are written directly through the domain window. The
//! override and spare columns and the sequencer registers are gated by the
//! secure monitor and are written by physical address:
//!
//! ```text
//!  LUT column   phys_base + column + row * row_size
//!  sequencer n  phys_base + reg_osm_sequencer + 4 * n
//! ```

use bitflags::bitflags;

use crate::acd;
use crate::bitfield::{
    bit, BOOST_TIMER_HI, BOOST_TIMER_LO, CYCLE_COUNTER_CLK_RATIO, DROOP_TIMER0, DROOP_TIMER1,
    HYSTERESIS_DN, HYSTERESIS_UP,
};
use crate::crossover::{mem_acc_crossovers, ApmCrossover};
use crate::error::{ConfigError, Error, Result};
use crate::params::CornerTable;
use crate::platform::SecureMonitor;
use crate::regs::{Delay, RegisterIo};
use crate::soc::{SetupRegs, SocData, LUT_MAX_ENTRIES, OSM_BOOT_TIME_US};

// =============================================================================
// CONSTANTS
// =============================================================================

/// OSM to XO clock ratio for the cycle counter (divide by 10)
const OSM_XO_RATIO_VAL: u32 = 10 - 1;
/// Count cycles on XO edges
const CYCLE_COUNTER_USE_XO_EDGE: u32 = bit(8);
/// Cycle counter enable
const CYCLE_COUNTER_EN: u32 = bit(0);

const PLL_WAIT_LOCK_TIME_NS: u32 = 2000;
const SAFE_FREQ_WAIT_NS: u32 = 1000;
const DEXT_DECREMENT_WAIT_NS: u32 = 200;
const BOOST_SYNC_DELAY: u32 = 5;

const HYSTERESIS_CC_NS: u32 = 200;
const HYSTERESIS_LLM_NS: u32 = 65535;

const DROOP_CTRL_VAL: u32 = bit(3) | bit(17) | bit(31);
const DROOP_TIMER_NS: u32 = 100;
const DROOP_WAIT_RELEASE_TIMER_NS: u32 = 50;
const DROOP_RELEASE_TIMER_NS: u32 = 1;
const DROOP_SYNC_DELAY: u32 = 1;

/// PLL droop override enable
const PLL_OVERRIDE_DROOP_EN: u32 = bit(0);

/// Frequency index 0 with override for cluster power collapse
const CC_ZERO_BEHAV_VAL: u32 = bit(0);

// Sequencer register numbers
const SEQ_APM_THRESH_VC: u32 = 15;
const SEQ_APM_THRESH_PREVC: u32 = 31;
const SEQ_MEM_ACC_LVAL: u32 = 32;
const SEQ_MEM_ACC_0: u32 = 55;
const SEQ_APM_CROSSOVER_VC: u32 = 72;
const SEQ_APM_PARAM: u32 = 76;
const SEQ_MEM_ACC_CROSSOVER_VC: u32 = 88;

bitflags! {
    /// Boost and droop state machine enables (`reg_pdn_fsm_ctrl`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PdnFsm: u32 {
        /// Core-count boost
        const CC_BOOST_EN = 1 << 0;
        /// Power-save boost
        const PS_BOOST_EN = 1 << 1;
        /// DCVS boost
        const DCVS_BOOST_EN = 1 << 2;
        /// Droop on power-collapse/retention exit
        const PC_RET_EXIT_DROOP_EN = 1 << 3;
        /// Droop on WFx
        const WFX_DROOP_EN = 1 << 4;
        /// Droop on DCVS
        const DCVS_DROOP_EN = 1 << 5;
    }
}

// =============================================================================
// SEQUENCER
// =============================================================================

/// One-shot programmer for an OS-owned OSM domain
pub struct Sequencer<'a> {
    regs: &'a dyn RegisterIo,
    secure: &'a dyn SecureMonitor,
    delay: &'a dyn Delay,
    soc: &'a SocData,
    setup: &'a SetupRegs,
    phys_base: u32,
}

impl<'a> Sequencer<'a> {
    /// Create a sequencer for the domain at `phys_base`
    ///
    /// Fails for variants whose register space is owned by firmware.
    pub fn new(
        regs: &'a dyn RegisterIo,
        secure: &'a dyn SecureMonitor,
        delay: &'a dyn Delay,
        soc: &'a SocData,
        phys_base: u32,
    ) -> Result<Self> {
        let setup = match (&soc.setup, soc.firmware_owned) {
            (Some(setup), false) => setup,
            _ => return Err(ConfigError::UnknownPlatform.into()),
        };
        Ok(Self {
            regs,
            secure,
            delay,
            soc,
            setup,
            phys_base,
        })
    }

    /// Program everything and enable the OSM
    pub fn program(&self, table: &CornerTable, acd_window: Option<&dyn RegisterIo>) -> Result<()> {
        self.write_lut(table)?;
        self.write_mem_acc(table)?;
        self.write_apm(table)?;
        self.write_tunables();

        if let Some(acd_data) = &self.soc.acd {
            acd::init(acd_window, self.delay, acd_data)?;
        }

        self.regs.write32(self.soc.reg_enable, 1);
        self.delay.udelay(OSM_BOOT_TIME_US);
        Ok(())
    }

    /// Write all hardware rows, repeating the last corner past the table
    pub fn write_lut(&self, table: &CornerTable) -> Result<()> {
        if table.len() < 2 {
            log::error!("OSM: Not enough LUT entries found ({})", table.len());
            return Err(ConfigError::TooFewCorners { found: table.len() }.into());
        }

        let soc = self.soc;
        for row in 0..LUT_MAX_ENTRIES {
            let entry = table.row(row);
            let pos = soc.row(row);

            self.regs.write32(soc.reg_index + pos, row as u32);
            self.regs.write32(soc.reg_volt_lut + pos, entry.voltage_word);
            self.regs.write32(soc.reg_freq_lut + pos, entry.freq_word);
            self.secure_write(self.setup.reg_override + pos, entry.override_word)?;
            self.secure_write(self.setup.reg_spare + pos, entry.spare_word)?;

            #[cfg(feature = "debug")]
            log::debug!(
                "OSM: Writing [{}] v:{:#x} f:{:#x} ovr:{:#x} s:{:#x}",
                row,
                entry.voltage_word,
                entry.freq_word,
                entry.override_word,
                entry.spare_word
            );
        }
        Ok(())
    }

    /// Program the mem-acc crossover corners and L-value
    pub fn write_mem_acc(&self, table: &CornerTable) -> Result<()> {
        let acc = mem_acc_crossovers(table, self.soc.mem_acc_regs)?;

        if acc.custom {
            self.seq_write(SEQ_MEM_ACC_CROSSOVER_VC, table.len() as u32 + 1)?;
        }

        for (n, &value) in acc.values.iter().enumerate() {
            self.seq_write(SEQ_MEM_ACC_0 + n as u32, value as u32)?;
        }
        log::debug!("OSM: Wrote MEM-ACC crossovers {:?}", acc.values.as_slice());

        self.seq_write(SEQ_MEM_ACC_LVAL, acc.l_val)?;
        log::debug!("OSM: MEM-ACC L-Val is {}", acc.l_val);
        Ok(())
    }

    /// Program the APM crossover
    pub fn write_apm(&self, table: &CornerTable) -> Result<()> {
        let apm = ApmCrossover::from_table(table);
        let count = table.len() as u32;

        self.regs.write32(self.setup.reg_seq1, count);
        self.seq_write(SEQ_APM_CROSSOVER_VC, count)?;
        self.seq_write(SEQ_APM_THRESH_VC, apm.pair.above as u32)?;
        self.seq_write(SEQ_APM_THRESH_PREVC, apm.pair.below as u32)?;
        self.seq_write(SEQ_APM_PARAM, apm.param_word())?;

        log::debug!(
            "OSM: Wrote APM pair [{}-{}]",
            apm.pair.below,
            apm.pair.above
        );
        Ok(())
    }

    /// Program the fixed DCVS, boost and droop parameters
    pub fn write_tunables(&self) {
        let regs = self.regs;
        let setup = self.setup;

        let cycle_counter = CYCLE_COUNTER_CLK_RATIO.pack(OSM_XO_RATIO_VAL)
            | CYCLE_COUNTER_USE_XO_EDGE
            | CYCLE_COUNTER_EN;
        regs.write32(setup.reg_cycle_counter, cycle_counter);

        regs.write32(setup.reg_spm_cc_hyst, hysteresis(HYSTERESIS_CC_NS));
        regs.write32(setup.reg_cc_zero_behav, CC_ZERO_BEHAV_VAL);
        // Cores in retention count as active
        regs.write32(setup.reg_spm_core_ret_map, 0);
        regs.write32(setup.reg_spm_cc_dcvs_dis, 0);
        regs.write32(setup.reg_llm_freq_vote_hyst, hysteresis(HYSTERESIS_LLM_NS));
        regs.write32(setup.reg_llm_volt_vote_hyst, hysteresis(HYSTERESIS_LLM_NS));
        regs.write32(setup.reg_llm_intf_dcvs_dis, 0);

        for timer0 in [
            setup.reg_cc_boost_timer,
            setup.reg_dcvs_boost_timer,
            setup.reg_ps_boost_timer,
        ] {
            self.boost_setup(timer0, setup.boost_timer_reg_len);
        }
        regs.write32(setup.reg_boost_sync_delay, BOOST_SYNC_DELAY);

        regs.write32(setup.reg_droop_unstall_ctrl, droop_timers(DROOP_TIMER_NS));
        regs.write32(
            setup.reg_droop_wait_release_ctrl,
            droop_timers(DROOP_WAIT_RELEASE_TIMER_NS),
        );
        regs.write32(setup.reg_droop_sync_delay, DROOP_SYNC_DELAY);
        regs.write32(setup.reg_droop_release_ctrl, DROOP_RELEASE_TIMER_NS);
        regs.write32(setup.reg_droop_timer_ctrl, DROOP_TIMER_NS);
        regs.set_bits32(setup.reg_droop_ctrl, DROOP_CTRL_VAL);

        regs.set_bits32(setup.reg_pdn_fsm_ctrl, PdnFsm::all().bits());
        regs.write32(setup.reg_pll_override, PLL_OVERRIDE_DROOP_EN);
    }

    /// Program one boost timer group starting at `timer0`
    fn boost_setup(&self, timer0: u32, len: u32) {
        let regs = self.regs;
        regs.write32(
            timer0,
            BOOST_TIMER_LO.pack(PLL_WAIT_LOCK_TIME_NS) | BOOST_TIMER_HI.pack(SAFE_FREQ_WAIT_NS),
        );
        regs.write32(
            timer0 + len,
            BOOST_TIMER_LO.pack(PLL_WAIT_LOCK_TIME_NS) | BOOST_TIMER_HI.pack(PLL_WAIT_LOCK_TIME_NS),
        );
        regs.write32(timer0 + 2 * len, BOOST_TIMER_LO.pack(DEXT_DECREMENT_WAIT_NS));
    }

    /// Physical address of sequencer register `n`
    pub fn sequencer_address(&self, n: u32) -> u32 {
        self.phys_base + self.setup.reg_osm_sequencer + n * 4
    }

    fn seq_write(&self, n: u32, value: u32) -> Result<()> {
        self.secure_write_phys(self.sequencer_address(n), value)
    }

    fn secure_write(&self, offset: u32, value: u32) -> Result<()> {
        self.secure_write_phys(self.phys_base + offset, value)
    }

    fn secure_write_phys(&self, address: u32, value: u32) -> Result<()> {
        self.secure.io_writel(address, value).map_err(|status| {
            log::error!("OSM: secure write to {:#010x} failed: {}", address, status);
            Error::SecureCall { address, status }
        })
    }
}

impl core::fmt::Debug for Sequencer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sequencer")
            .field("compatible", &self.soc.compatible)
            .field("phys_base", &self.phys_base)
            .finish()
    }
}

const fn hysteresis(ns: u32) -> u32 {
    HYSTERESIS_UP.pack(ns) | HYSTERESIS_DN.pack(ns)
}

const fn droop_timers(ns: u32) -> u32 {
    DROOP_TIMER1.pack(ns) | DROOP_TIMER0.pack(ns)
}

// =============================================================================
// TESTS
// =============================================================================
