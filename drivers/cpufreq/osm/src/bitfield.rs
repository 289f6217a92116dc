//! # Register Bit-Fields
//!
//! Packing and unpacking of fixed-width fields inside 32-bit register
//! words. Out-of-range values are truncated to the field width, the same
//! way the hardware drops the upper bits.

// =============================================================================
// FIELD DESCRIPTOR
// =============================================================================

/// A contiguous bit-field inside a 32-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Lowest bit of the field
    pub offset: u8,
    /// Width in bits (1..=32)
    pub width: u8,
}

impl Field {
    /// Create a field spanning `high:low` (inclusive)
    pub const fn bits(high: u8, low: u8) -> Self {
        Self {
            offset: low,
            width: high - low + 1,
        }
    }

    /// In-place mask of the field
    pub const fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            ((1u32 << self.width) - 1) << self.offset
        }
    }

    /// Largest value the field can hold
    pub const fn max_value(&self) -> u32 {
        self.mask() >> self.offset
    }

    /// Place `value` into the field, truncating to the field width
    pub const fn pack(&self, value: u32) -> u32 {
        (value << self.offset) & self.mask()
    }

    /// Extract the field from `word`
    pub const fn unpack(&self, word: u32) -> u32 {
        (word & self.mask()) >> self.offset
    }
}

/// Single-bit helper
pub const fn bit(n: u8) -> u32 {
    1 << n
}

// =============================================================================
// OSM FIELDS
// =============================================================================

/// Clock source selector, SDM845-style layout
pub const LUT_SRC_845: Field = Field::bits(31, 30);
/// Clock source selector, MSM8998 layout
pub const LUT_SRC_8998: Field = Field::bits(27, 26);
/// PLL post-divider
pub const LUT_PLL_DIV: Field = Field::bits(25, 24);
/// Virtual corner index in the voltage word
pub const LUT_VOLT_VC: Field = Field::bits(21, 16);
/// Core count in the frequency word
pub const LUT_CORE_COUNT: Field = Field::bits(18, 16);
/// Voltage in millivolts
pub const LUT_VOLT: Field = Field::bits(11, 0);
/// PLL L-value (multiplier of the reference clock)
pub const LUT_L_VAL: Field = Field::bits(7, 0);

/// Boost timer, upper half
pub const BOOST_TIMER_HI: Field = Field::bits(31, 16);
/// Boost timer, lower half
pub const BOOST_TIMER_LO: Field = Field::bits(15, 0);

/// Hysteresis before stepping up
pub const HYSTERESIS_UP: Field = Field::bits(31, 16);
/// Hysteresis before stepping down
pub const HYSTERESIS_DN: Field = Field::bits(15, 0);

/// Droop timer 1
pub const DROOP_TIMER1: Field = Field::bits(31, 16);
/// Droop timer 0
pub const DROOP_TIMER0: Field = Field::bits(15, 0);

/// Cycle counter clock ratio
pub const CYCLE_COUNTER_CLK_RATIO: Field = Field::bits(5, 1);

/// Current hardware frequency vote, in 19.2 MHz steps
pub const CURRENT_VOTE: Field = Field::bits(9, 0);

// =============================================================================
// TESTS
// =============================================================================
