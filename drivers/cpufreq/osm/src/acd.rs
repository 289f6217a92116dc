//! # Adaptive Clock Distribution
//!
//! Register-transfer protocol used to hand configuration words to the ACD
//! block. Values are staged in the ACD window, then moved into the block
//! either one register at a time (manual transfer) or as a batch selected
//! by a register bitmask (auto transfer). Both modes complete when the
//! hardware sets a status bit.
//!
//! ```text
//!  manual:  reg <- value
//!           write_ctl <- 0
//!           write_ctl <- (reg / 4) << 1 | UPDATE_EN
//!           poll write_sts[reg / 4]
//!
//!  auto:    auto_xfer_cfg <- mask
//!           auto_xfer <- 0, auto_xfer <- 1
//!           poll auto_xfer_sts[0]
//! ```

use crate::bitfield::bit;
use crate::error::Result;
use crate::regs::{read_poll_timeout, Delay, RegisterIo};
use crate::soc::{AcdRegs, OSM_BOOT_TIME_US};

/// Manual transfer enable
const WRITE_CTL_UPDATE_EN: u32 = bit(0);

/// Register selector position in the write control word
const WRITE_CTL_SELECT_SHIFT: u32 = 1;

/// Poll interval
const XFER_POLL_US: u32 = 1;

/// Poll bound
const XFER_TIMEOUT_US: u32 = 3;

/// Clock switch settle time
const CLOCK_SWITCH_US: u32 = 1;

/// Transfer-mask bit of an ACD register
pub const fn regbit(reg: u8) -> u32 {
    bit(reg / 4)
}

/// ACD programming engine over one ACD window
pub struct AcdEngine<'a> {
    regs: &'a dyn RegisterIo,
    delay: &'a dyn Delay,
    data: &'a AcdRegs,
}

impl<'a> AcdEngine<'a> {
    /// Create an engine for `regs` using the variant offsets in `data`
    pub fn new(regs: &'a dyn RegisterIo, delay: &'a dyn Delay, data: &'a AcdRegs) -> Self {
        Self { regs, delay, data }
    }

    /// Stage `value` in `reg` and transfer that single register
    pub fn write_xfer(&self, reg: u8, value: u32) -> Result<()> {
        let data = self.data;
        self.regs.write32(reg as u32, value);

        self.regs.write32(data.write_ctl_reg as u32, 0);
        let ctl = ((reg as u32 / 4) << WRITE_CTL_SELECT_SHIFT) | WRITE_CTL_UPDATE_EN;
        self.regs.write32(data.write_ctl_reg as u32, ctl);

        let done = regbit(reg);
        read_poll_timeout(
            self.regs,
            self.delay,
            data.write_sts_reg as u32,
            |sts| sts & done != 0,
            XFER_POLL_US,
            XFER_TIMEOUT_US,
        )
        .map(|_| ())
    }

    /// Transfer every staged register selected by `mask`
    pub fn write_autoxfer(&self, mask: u32) -> Result<()> {
        let data = self.data;
        self.regs.write32(data.auto_xfer_cfg_reg as u32, mask);

        self.regs.write32(data.auto_xfer_reg as u32, 0);
        self.regs.write32(data.auto_xfer_reg as u32, 1);

        read_poll_timeout(
            self.regs,
            self.delay,
            data.auto_xfer_sts_reg as u32,
            |sts| sts & bit(0) != 0,
            XFER_POLL_US,
            XFER_TIMEOUT_US,
        )
        .map(|_| ())
    }

    /// Run the ACD initialization sequence
    ///
    /// Stops at the first failed transfer; registers written so far stay.
    pub fn init(&self) -> Result<()> {
        let data = self.data;

        self.regs.write32(data.tl_delay_reg as u32, data.tl_delay_val);
        self.regs.write32(data.acd_ctrl_reg as u32, data.acd_ctrl_val);
        self.regs.write32(data.softstart_reg as u32, data.softstart_val);
        self.regs.write32(data.ext_intf_reg as u32, data.ext_intf0_val);
        self.regs.write32(data.auto_xfer_ctl_reg as u32, data.auto_xfer_val);

        let mut mask = regbit(data.acd_ctrl_reg)
            | regbit(data.tl_delay_reg)
            | regbit(data.softstart_reg)
            | regbit(data.ext_intf_reg);
        self.write_autoxfer(mask)?;

        // Switch the CPU subsystem to the ACD clock
        self.write_xfer(data.gfmux_cfg_reg, 1)?;

        // Pulse DCVS_SW
        self.write_xfer(data.dcvs_sw_reg, 1)?;
        self.write_xfer(data.dcvs_sw_reg, 0)?;

        self.delay.udelay(CLOCK_SWITCH_US);

        self.write_xfer(data.ext_intf_reg, data.ext_intf1_val)?;

        mask |= regbit(data.gfmux_cfg_reg);
        self.write_autoxfer(mask)?;

        self.delay.udelay(OSM_BOOT_TIME_US);
        Ok(())
    }
}

impl core::fmt::Debug for AcdEngine<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AcdEngine").field("data", self.data).finish()
    }
}

/// Initialize ACD when the domain has an ACD window
pub fn init(window: Option<&dyn RegisterIo>, delay: &dyn Delay, data: &AcdRegs) -> Result<()> {
    match window {
        Some(regs) => AcdEngine::new(regs, delay, data).init(),
        None => {
            log::debug!("OSM: Skipping ACD initialization");
            Ok(())
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================
