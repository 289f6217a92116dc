//! # SoC Register Layouts
//!
//! Per-variant register offsets and one-time configuration constants of
//! the Operating State Manager.
//!
//! ```text
//! ┌──────────────────────────┬─────────────────┬────────────────────────┐
//! │ Compatible               │ Register owner  │ Setup / ACD data       │
//! ├──────────────────────────┼─────────────────┼────────────────────────┤
//! │ qcom,cpufreq-hw          │ firmware (TZ)   │ none                   │
//! │ qcom,cpufreq-hw-8998     │ operating system│ setup regs + ACD       │
//! │ qcom,cpufreq-epss        │ firmware (TZ)   │ none                   │
//! └──────────────────────────┴─────────────────┴────────────────────────┘
//! ```
//!
//! Every offset below is part of the hardware interface and must match the
//! silicon bit for bit.

use static_assertions::const_assert;

use crate::bitfield::{Field, LUT_SRC_8998, LUT_SRC_845, LUT_VOLT_VC};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Rows in the OSM lookup table
pub const LUT_MAX_ENTRIES: usize = 40;

/// Core-count value marking a turbo (boost) indicator row
pub const LUT_TURBO_IND: u32 = 1;

/// Time the OSM needs after being enabled
pub const OSM_BOOT_TIME_US: u32 = 5;

/// Mem-acc crossover registers on the observed variants (two pairs)
pub const SEQ_MEM_ACC_MAX_LEVELS: usize = 4;

// Every virtual corner must be representable in the voltage word.
const_assert!((LUT_MAX_ENTRIES as u32) - 1 <= LUT_VOLT_VC.max_value());
const_assert!(SEQ_MEM_ACC_MAX_LEVELS % 2 == 0);

// =============================================================================
// SETUP REGISTERS
// =============================================================================

/// Register offsets used to program an OSM left unconfigured by firmware
///
/// Offsets are relative to the frequency-domain window, except
/// `reg_osm_sequencer`, which is added to the domain physical base to
/// address the sequencer through secure calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupRegs {
    /// Sequencer base (physical offset)
    pub reg_osm_sequencer: u32,
    /// PLL override parameters
    pub reg_override: u32,
    /// Spare parameters (mem-acc level per corner)
    pub reg_spare: u32,
    /// Virtual corner for cluster power collapse
    pub reg_cc_zero_behav: u32,
    /// Core-count DCVS hysteresis
    pub reg_spm_cc_hyst: u32,
    /// Core-count DCVS disable
    pub reg_spm_cc_dcvs_dis: u32,
    /// Retention core treatment
    pub reg_spm_core_ret_map: u32,
    /// LLM frequency vote hysteresis
    pub reg_llm_freq_vote_hyst: u32,
    /// LLM voltage vote hysteresis
    pub reg_llm_volt_vote_hyst: u32,
    /// LLM DCVS disable
    pub reg_llm_intf_dcvs_dis: u32,
    /// Sequencer extra register
    pub reg_seq1: u32,
    /// Boost and droop FSM enables
    pub reg_pdn_fsm_ctrl: u32,
    /// Core-count boost timer group
    pub reg_cc_boost_timer: u32,
    /// DCVS boost timer group
    pub reg_dcvs_boost_timer: u32,
    /// Power-save boost timer group
    pub reg_ps_boost_timer: u32,
    /// Stride between registers of a boost timer group
    pub boost_timer_reg_len: u32,
    /// PLL timing control for boost
    pub reg_boost_sync_delay: u32,
    /// Droop control
    pub reg_droop_ctrl: u32,
    /// Droop release wait
    pub reg_droop_release_ctrl: u32,
    /// Droop unstall wait
    pub reg_droop_unstall_ctrl: u32,
    /// Droop state release wait
    pub reg_droop_wait_release_ctrl: u32,
    /// Droop timer
    pub reg_droop_timer_ctrl: u32,
    /// PLL timing control for droop
    pub reg_droop_sync_delay: u32,
    /// PLL droop override enable
    pub reg_pll_override: u32,
    /// CPU cycle counter
    pub reg_cycle_counter: u32,
}

/// Adaptive Clock Distribution register offsets and values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcdRegs {
    /// Tunable-length delay
    pub tl_delay_reg: u8,
    /// Control register
    pub acd_ctrl_reg: u8,
    /// Soft start control
    pub softstart_reg: u8,
    /// External interface configuration
    pub ext_intf_reg: u8,
    /// Auto-transfer start
    pub auto_xfer_reg: u8,
    /// Auto-transfer configuration (pending mask)
    pub auto_xfer_cfg_reg: u8,
    /// Auto-transfer control
    pub auto_xfer_ctl_reg: u8,
    /// Auto-transfer status
    pub auto_xfer_sts_reg: u8,
    /// Software DCVS
    pub dcvs_sw_reg: u8,
    /// Glitch-free mux configuration
    pub gfmux_cfg_reg: u8,
    /// Manual write control
    pub write_ctl_reg: u8,
    /// Manual write status
    pub write_sts_reg: u8,
    /// Tunable-length delay value
    pub tl_delay_val: u32,
    /// Control register value
    pub acd_ctrl_val: u32,
    /// Soft start value
    pub softstart_val: u32,
    /// Initial external interface value
    pub ext_intf0_val: u32,
    /// Final external interface value
    pub ext_intf1_val: u32,
    /// Auto-transfer control value
    pub auto_xfer_val: u32,
}

// =============================================================================
// SOC DATA
// =============================================================================

/// Complete register layout of one OSM variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocData {
    /// Compatible string selecting this layout
    pub compatible: &'static str,
    /// OSM enable status
    pub reg_enable: u32,
    /// Virtual corner index column
    pub reg_index: u32,
    /// Frequency column
    pub reg_freq_lut: u32,
    /// Clock-source field inside the frequency word
    pub lut_src: Field,
    /// Voltage column
    pub reg_volt_lut: u32,
    /// Hardware-enforced frequency vote
    pub reg_current_vote: Option<u32>,
    /// Performance state request
    pub reg_perf_state: u32,
    /// Stride between lookup table rows
    pub lut_row_size: u32,
    /// Divider applied to the alternate clock
    pub clk_hw_div: u32,
    /// Register space already programmed and locked by firmware
    pub firmware_owned: bool,
    /// Mem-acc crossover registers in the sequencer
    pub mem_acc_regs: usize,
    /// Setup offsets, present when the OS programs the OSM
    pub setup: Option<SetupRegs>,
    /// ACD data, present when the OS programs the OSM
    pub acd: Option<AcdRegs>,
}

impl SocData {
    /// Byte offset of a lookup table row
    pub const fn row(&self, index: usize) -> u32 {
        index as u32 * self.lut_row_size
    }

    /// Effective divider for the alternate clock (0 means 1)
    pub const fn alternate_divider(&self) -> u32 {
        if self.clk_hw_div == 0 {
            1
        } else {
            self.clk_hw_div
        }
    }
}

/// Firmware-programmed OSM (SDM845 and friends)
pub static QCOM_SOC_DATA: SocData = SocData {
    compatible: "qcom,cpufreq-hw",
    reg_enable: 0x0,
    reg_index: 0x0,
    reg_freq_lut: 0x110,
    lut_src: LUT_SRC_845,
    reg_volt_lut: 0x114,
    reg_current_vote: Some(0x704),
    reg_perf_state: 0x920,
    lut_row_size: 32,
    clk_hw_div: 2,
    firmware_owned: true,
    mem_acc_regs: SEQ_MEM_ACC_MAX_LEVELS,
    setup: None,
    acd: None,
};

/// OS-programmed OSM (MSM8998)
pub static MSM8998_SOC_DATA: SocData = SocData {
    compatible: "qcom,cpufreq-hw-8998",
    reg_enable: 0x4,
    reg_index: 0x150,
    reg_freq_lut: 0x154,
    lut_src: LUT_SRC_8998,
    reg_volt_lut: 0x158,
    reg_current_vote: None,
    reg_perf_state: 0xf10,
    lut_row_size: 32,
    clk_hw_div: 1,
    firmware_owned: false,
    mem_acc_regs: SEQ_MEM_ACC_MAX_LEVELS,
    setup: Some(SetupRegs {
        reg_osm_sequencer: 0x300,
        reg_override: 0x15c,
        reg_spare: 0x164,
        reg_cc_zero_behav: 0x0c,
        reg_spm_cc_hyst: 0x1c,
        reg_spm_cc_dcvs_dis: 0x20,
        reg_spm_core_ret_map: 0x24,
        reg_llm_freq_vote_hyst: 0x2c,
        reg_llm_volt_vote_hyst: 0x30,
        reg_llm_intf_dcvs_dis: 0x34,
        reg_seq1: 0x48,
        reg_pdn_fsm_ctrl: 0x70,
        reg_cc_boost_timer: 0x74,
        reg_dcvs_boost_timer: 0x84,
        reg_ps_boost_timer: 0x94,
        boost_timer_reg_len: 0x4,
        reg_boost_sync_delay: 0xa0,
        reg_droop_ctrl: 0xa4,
        reg_droop_release_ctrl: 0xa8,
        reg_droop_unstall_ctrl: 0xac,
        reg_droop_wait_release_ctrl: 0xb0,
        reg_droop_timer_ctrl: 0xb8,
        reg_droop_sync_delay: 0xbc,
        reg_pll_override: 0xc0,
        reg_cycle_counter: 0xf00,
    }),
    acd: Some(AcdRegs {
        acd_ctrl_reg: 0x4,
        tl_delay_reg: 0x8,
        softstart_reg: 0x28,
        ext_intf_reg: 0x30,
        dcvs_sw_reg: 0x34,
        gfmux_cfg_reg: 0x3c,
        auto_xfer_cfg_reg: 0x80,
        auto_xfer_reg: 0x84,
        auto_xfer_ctl_reg: 0x88,
        auto_xfer_sts_reg: 0x8c,
        write_ctl_reg: 0x90,
        write_sts_reg: 0x94,
        tl_delay_val: 38417,
        acd_ctrl_val: 0x2b5ffd,
        softstart_val: 0x501,
        ext_intf0_val: 0x2cf9ae8,
        ext_intf1_val: 0x2cf9afe,
        auto_xfer_val: 0x15,
    }),
};

/// Firmware-programmed EPSS
pub static EPSS_SOC_DATA: SocData = SocData {
    compatible: "qcom,cpufreq-epss",
    reg_enable: 0x0,
    reg_index: 0x0,
    reg_freq_lut: 0x100,
    lut_src: LUT_SRC_845,
    reg_volt_lut: 0x200,
    reg_current_vote: None,
    reg_perf_state: 0x320,
    lut_row_size: 4,
    clk_hw_div: 2,
    firmware_owned: true,
    mem_acc_regs: SEQ_MEM_ACC_MAX_LEVELS,
    setup: None,
    acd: None,
};

static SOC_TABLE: [&SocData; 3] = [&QCOM_SOC_DATA, &MSM8998_SOC_DATA, &EPSS_SOC_DATA];

/// Look up the layout for a compatible string
pub fn lookup(compatible: &str) -> Option<&'static SocData> {
    SOC_TABLE
        .iter()
        .copied()
        .find(|data| data.compatible == compatible)
}

// =============================================================================
// TESTS
// =============================================================================
