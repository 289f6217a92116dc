//! # Throttle Reconciliation
//!
//! Tracks the frequency cap the hardware limits manager (LMh) enforces and
//! reports it as thermal pressure.
//!
//! ```text
//!                 interrupt
//!   ┌────────────────┐ ───────────────▶ ┌──────────┐
//!   │ InterruptArmed │                  │ Polling  │ ◀─┐ tick, vote below
//!   └────────────────┘ ◀─────────────── └──────────┘ ──┘ request (10 ms)
//!           │          tick, vote caught up   │
//!           └──────────── teardown ───────────┴──────▶ Cancelled
//! ```
//!
//! The interrupt handler masks the line before queueing the deferred work,
//! and the work unmasks it only when it stops polling, so the two never run
//! at the same time. The lock covers the cancel flag and the re-arm or
//! reschedule decision; the handler never takes it.

use alloc::sync::Arc;
use core::fmt::Write;
use core::sync::atomic::{AtomicU8, Ordering};

use heapless::HistoryBuffer;
use spin::Mutex;

use crate::bitfield::CURRENT_VOTE;
use crate::error::{ResourceError, Result};
use crate::opp::OppTable;
use crate::platform::{
    CpuMask, DeferredWork, InterruptLine, ResourceProvider, ThermalPressureSink,
};
use crate::policy::FrequencyTable;
use crate::regs::RegisterIo;
use crate::soc::SocData;

/// Polling period while throttled
pub const POLL_PERIOD_MS: u32 = 10;

/// Frequency step of the current vote register
const VOTE_STEP_KHZ: u32 = 19_200;

/// Transitions kept for diagnostics
const HISTORY_LEN: usize = 8;

/// Throttle interrupt name, "dcvsh-irq-" plus the policy CPU
pub type IrqName = heapless::String<20>;

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Throttle loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThrottleState {
    /// Interrupt unmasked, no work queued
    InterruptArmed = 0,
    /// Interrupt masked, work queued
    Polling = 1,
    /// Torn down
    Cancelled = 2,
}

impl ThrottleState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::InterruptArmed,
            1 => Self::Polling,
            _ => Self::Cancelled,
        }
    }
}

/// Input of the throttle state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleEvent {
    /// Throttle interrupt fired
    Interrupt,
    /// Deferred work ran
    Tick {
        /// Hardware vote at or above the requested frequency
        caught_up: bool,
    },
    /// Domain is going away
    Teardown,
}

/// Next state after `event`
pub const fn transition(state: ThrottleState, event: ThrottleEvent) -> ThrottleState {
    use ThrottleEvent::*;
    use ThrottleState::*;

    match (state, event) {
        (Cancelled, _) | (_, Teardown) => Cancelled,
        (InterruptArmed, Interrupt) | (Polling, Interrupt) => Polling,
        (Polling, Tick { caught_up: true }) => InterruptArmed,
        (Polling, Tick { caught_up: false }) => Polling,
        (InterruptArmed, Tick { .. }) => InterruptArmed,
    }
}

// =============================================================================
// MONITOR
// =============================================================================

struct Inner {
    cancelled: bool,
    history: HistoryBuffer<ThrottleState, HISTORY_LEN>,
}

/// Everything a monitor needs from its domain
#[derive(Clone)]
pub struct MonitorParts {
    /// Domain register window
    pub regs: Arc<dyn RegisterIo>,
    /// Register layout
    pub soc: &'static SocData,
    /// Frequency table of the policy
    pub freq_table: FrequencyTable,
    /// CPU operating points, for clamping the vote
    pub opp: Arc<dyn OppTable>,
    /// Thermal pressure sink
    pub thermal: Arc<dyn ThermalPressureSink>,
    /// CPUs sharing the clock
    pub related_cpus: CpuMask,
}

impl core::fmt::Debug for MonitorParts {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MonitorParts")
            .field("soc", &self.soc.compatible)
            .field("related_cpus", &self.related_cpus)
            .finish_non_exhaustive()
    }
}

/// Throttle loop of one frequency domain
pub struct ThrottleMonitor {
    parts: MonitorParts,
    vote_reg: u32,
    irq: Arc<dyn InterruptLine>,
    work: Arc<dyn DeferredWork>,
    irq_name: IrqName,
    state: AtomicU8,
    inner: Mutex<Inner>,
}

impl ThrottleMonitor {
    /// Create a monitor in the armed state
    pub fn new(
        parts: MonitorParts,
        vote_reg: u32,
        irq: Arc<dyn InterruptLine>,
        work: Arc<dyn DeferredWork>,
        irq_name: IrqName,
    ) -> Self {
        Self {
            parts,
            vote_reg,
            irq,
            work,
            irq_name,
            state: AtomicU8::new(ThrottleState::InterruptArmed as u8),
            inner: Mutex::new(Inner {
                cancelled: false,
                history: HistoryBuffer::new(),
            }),
        }
    }

    /// Set up the loop for domain `index` of the policy owned by `cpu`
    ///
    /// Returns `Ok(None)` when the loop does not apply: the variant has no
    /// vote register, the domain has no interrupt, or binding it failed.
    pub fn start(
        parts: MonitorParts,
        resources: &dyn ResourceProvider,
        index: u32,
        cpu: u32,
        cpus: CpuMask,
    ) -> Result<Option<Arc<Self>>> {
        let Some(vote_reg) = parts.soc.reg_current_vote else {
            log::debug!("OSM: {} exposes no throttle vote", parts.soc.compatible);
            return Ok(None);
        };

        let irq = match resources.throttle_irq(index) {
            Ok(Some(irq)) => irq,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::error!("OSM: Domain-{} throttle interrupt lookup failed: {}", index, e);
                return Err(ResourceError::InterruptLookup.into());
            },
        };
        let work = resources.deferred_work(index)?;

        let mut name = IrqName::new();
        let _ = write!(name, "dcvsh-irq-{}", cpu);

        if let Err(e) = irq.request(&name) {
            log::error!("OSM: Error registering {}: {}", name, e);
            return Ok(None);
        }

        if irq.set_affinity(cpus).is_err() {
            log::warn!(
                "OSM: Failed to set CPU affinity of {}[{}]",
                name,
                irq.number()
            );
        }

        log::info!("OSM: Throttle monitor {} armed", name);
        Ok(Some(Arc::new(Self::new(parts, vote_reg, irq, work, name))))
    }

    /// Current state
    pub fn state(&self) -> ThrottleState {
        ThrottleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Interrupt name
    pub fn irq_name(&self) -> &str {
        &self.irq_name
    }

    /// Whether teardown has started
    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }

    /// States entered by deferred runs, oldest first
    pub fn history(&self) -> heapless::Vec<ThrottleState, HISTORY_LEN> {
        self.inner.lock().history.oldest_ordered().copied().collect()
    }

    /// Hardware-enforced frequency in kHz
    pub fn hw_vote_khz(&self) -> u32 {
        CURRENT_VOTE.unpack(self.parts.regs.read32(self.vote_reg)) * VOTE_STEP_KHZ
    }

    /// Hardware vote snapped to an operating point, in kHz
    pub fn throttled_khz(&self) -> u32 {
        let freq_hz = self.hw_vote_khz() as u64 * 1000;
        let opp = &self.parts.opp;
        let snapped = opp
            .find_floor(freq_hz)
            .or_else(|| opp.find_ceil(freq_hz))
            .map_or(freq_hz, |point| point.freq_hz);
        (snapped / 1000) as u32
    }

    /// Throttle interrupt handler
    ///
    /// Masks the line and switches to polling. Never blocks.
    pub fn handle_interrupt(&self) {
        self.irq.disable_nosync();

        let armed = ThrottleState::InterruptArmed as u8;
        let next = transition(ThrottleState::InterruptArmed, ThrottleEvent::Interrupt) as u8;
        if self
            .state
            .compare_exchange(armed, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.work.schedule(0);
        }
    }

    /// Deferred work body
    pub fn run_deferred(&self) {
        if self.state() == ThrottleState::Cancelled {
            return;
        }

        let throttled = self.throttled_khz();
        self.parts.thermal.update(self.parts.related_cpus, throttled);

        let mut inner = self.inner.lock();
        if inner.cancelled {
            return;
        }

        let requested = crate::lut::current_khz(
            self.parts.regs.as_ref(),
            self.parts.soc,
            &self.parts.freq_table,
        );
        let prev = self.state();
        let next = transition(
            prev,
            ThrottleEvent::Tick {
                caught_up: throttled >= requested,
            },
        );
        self.state.store(next as u8, Ordering::Release);
        inner.history.write(next);

        match (prev, next) {
            // The line is only masked while polling
            (ThrottleState::Polling, ThrottleState::InterruptArmed) => self.irq.enable(),
            (_, ThrottleState::Polling) => self.work.schedule(POLL_PERIOD_MS),
            _ => {},
        }
    }

    /// Stop the loop and release the interrupt
    ///
    /// Returns once a deferred run in flight has finished.
    pub fn teardown(&self) {
        {
            let mut inner = self.inner.lock();
            inner.cancelled = true;
            let next = transition(self.state(), ThrottleEvent::Teardown);
            self.state.store(next as u8, Ordering::Release);
            inner.history.write(next);
        }

        self.work.cancel_sync();
        self.irq.free();
        log::debug!("OSM: Throttle monitor {} released", self.irq_name);
    }
}

impl core::fmt::Debug for ThrottleMonitor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThrottleMonitor")
            .field("irq", &self.irq_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================
