//! # Register Windows
//!
//! Access to the OSM and ACD register spaces.
//!
//! Every frequency domain owns one [`RegisterIo`] window for its OSM
//! registers and, on some platforms, a second one for the ACD block. The
//! production implementation is [`MmioWindow`]; tests substitute a fake
//! register file.

use crate::error::{Error, Result};

// =============================================================================
// REGISTER ACCESS TRAIT
// =============================================================================

/// 32-bit register access relative to a window base
pub trait RegisterIo: Send + Sync {
    /// Read a 32-bit register
    fn read32(&self, offset: u32) -> u32;

    /// Write a 32-bit register
    fn write32(&self, offset: u32, value: u32);

    /// Read-modify-write: OR `bits` into the register
    fn set_bits32(&self, offset: u32, bits: u32) {
        let value = self.read32(offset);
        self.write32(offset, value | bits);
    }
}

/// Busy-wait delay provider
pub trait Delay: Send + Sync {
    /// Spin for `us` microseconds
    fn udelay(&self, us: u32);
}

// =============================================================================
// MMIO WINDOW
// =============================================================================

/// A mapped MMIO window
#[derive(Debug)]
pub struct MmioWindow {
    /// Virtual base address
    virt_addr: usize,
    /// Window size in bytes
    size: usize,
}

impl MmioWindow {
    /// Wrap an already mapped window
    ///
    /// # Safety
    /// - `virt_addr` must map `size` bytes of device memory
    /// - The mapping must outlive the window
    pub unsafe fn new(virt_addr: usize, size: usize) -> Self {
        Self { virt_addr, size }
    }

    /// Get window size
    pub fn size(&self) -> usize {
        self.size
    }

    fn ptr(&self, offset: u32) -> *mut u32 {
        let offset = offset as usize;
        debug_assert!(offset % 4 == 0, "unaligned register offset {:#x}", offset);
        debug_assert!(offset + 4 <= self.size, "register offset {:#x} out of window", offset);
        (self.virt_addr + offset) as *mut u32
    }
}

impl RegisterIo for MmioWindow {
    fn read32(&self, offset: u32) -> u32 {
        // SAFETY: constructor contract guarantees the window is mapped
        unsafe { core::ptr::read_volatile(self.ptr(offset)) }
    }

    fn write32(&self, offset: u32, value: u32) {
        // SAFETY: constructor contract guarantees the window is mapped
        unsafe { core::ptr::write_volatile(self.ptr(offset), value) }
    }
}

// SAFETY: MMIO accesses are single volatile loads/stores
unsafe impl Send for MmioWindow {}
// SAFETY: see above
unsafe impl Sync for MmioWindow {}

// =============================================================================
// POLLING
// =============================================================================

/// Poll a register until `cond` holds or `timeout_us` elapses
///
/// The register is read once more after the last sleep, so a condition
/// that becomes true exactly at the deadline still succeeds.
pub fn read_poll_timeout<R, F>(
    regs: &R,
    delay: &dyn Delay,
    offset: u32,
    mut cond: F,
    sleep_us: u32,
    timeout_us: u32,
) -> Result<u32>
where
    R: RegisterIo + ?Sized,
    F: FnMut(u32) -> bool,
{
    let mut elapsed = 0u32;

    loop {
        let value = regs.read32(offset);
        if cond(value) {
            return Ok(value);
        }

        if elapsed >= timeout_us {
            return Err(Error::HandshakeTimeout {
                status_reg: offset as u8,
            });
        }

        delay.udelay(sleep_us);
        elapsed += sleep_us.max(1);
    }
}

// =============================================================================
// TESTS
// =============================================================================
