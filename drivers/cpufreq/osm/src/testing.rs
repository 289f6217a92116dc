//! Host-side fakes for the platform collaborators.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use crate::bitfield::{LUT_CORE_COUNT, LUT_L_VAL, LUT_SRC_8998, LUT_VOLT, LUT_VOLT_VC};
use crate::error::{ConfigError, Error, ResourceError, Result};
use crate::opp::{OperatingPoint, OppNode, OppTable};
use crate::params::{CornerEntry, CornerTable};
use crate::platform::{
    BandwidthVoter, Collaborators, CpuMask, DeferredWork, InterruptLine, ResourceProvider,
    SecureMonitor, ThermalPressureSink,
};
use crate::regs::{Delay, RegisterIo};

// =============================================================================
// REGISTERS
// =============================================================================

#[derive(Default)]
struct RegFile {
    values: HashMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    reads: HashMap<u32, usize>,
    queued: HashMap<u32, VecDeque<u32>>,
}

/// Register file recording every write
#[derive(Default)]
pub struct FakeRegs {
    file: Mutex<RegFile>,
}

impl FakeRegs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a register without logging a write
    pub fn set(&self, offset: u32, value: u32) {
        self.file.lock().unwrap().values.insert(offset, value);
    }

    pub fn get(&self, offset: u32) -> u32 {
        self.file
            .lock()
            .unwrap()
            .values
            .get(&offset)
            .copied()
            .unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.file.lock().unwrap().writes.clone()
    }

    pub fn writes_to(&self, offset: u32) -> usize {
        self.file
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|&&(o, _)| o == offset)
            .count()
    }

    pub fn reads_of(&self, offset: u32) -> usize {
        self.file
            .lock()
            .unwrap()
            .reads
            .get(&offset)
            .copied()
            .unwrap_or(0)
    }

    /// Values returned by the next reads of `offset`, before the stored one
    pub fn queue_reads(&self, offset: u32, values: &[u32]) {
        self.file
            .lock()
            .unwrap()
            .queued
            .entry(offset)
            .or_default()
            .extend(values.iter().copied());
    }
}

impl RegisterIo for FakeRegs {
    fn read32(&self, offset: u32) -> u32 {
        let mut file = self.file.lock().unwrap();
        *file.reads.entry(offset).or_insert(0) += 1;
        if let Some(value) = file.queued.get_mut(&offset).and_then(VecDeque::pop_front) {
            return value;
        }
        file.values.get(&offset).copied().unwrap_or(0)
    }

    fn write32(&self, offset: u32, value: u32) {
        let mut file = self.file.lock().unwrap();
        file.writes.push((offset, value));
        file.values.insert(offset, value);
    }
}

/// Delay that only records what was asked
#[derive(Default)]
pub struct FakeDelay {
    calls: Mutex<Vec<u32>>,
}

impl FakeDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_us(&self) -> u32 {
        self.calls.lock().unwrap().iter().sum()
    }
}

impl Delay for FakeDelay {
    fn udelay(&self, us: u32) {
        self.calls.lock().unwrap().push(us);
    }
}

/// Secure monitor with optional per-address failures
#[derive(Default)]
pub struct FakeScm {
    writes: Mutex<Vec<(u32, u32)>>,
    failures: Mutex<HashMap<u32, i32>>,
}

impl FakeScm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.writes.lock().unwrap().clone()
    }

    /// Last value written to `address`
    pub fn value_at(&self, address: u32) -> Option<u32> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|&&(a, _)| a == address)
            .map(|&(_, v)| v)
    }

    pub fn fail_at(&self, address: u32, status: i32) {
        self.failures.lock().unwrap().insert(address, status);
    }
}

impl SecureMonitor for FakeScm {
    fn io_writel(&self, address: u32, value: u32) -> core::result::Result<(), i32> {
        if let Some(&status) = self.failures.lock().unwrap().get(&address) {
            return Err(status);
        }
        self.writes.lock().unwrap().push((address, value));
        Ok(())
    }
}

// =============================================================================
// OPERATING POINTS
// =============================================================================

#[derive(Clone, Copy)]
struct OppEntry {
    point: OperatingPoint,
    enabled: bool,
    dynamic: bool,
}

#[derive(Default)]
struct OppState {
    entries: BTreeMap<u64, OppEntry>,
    overstated: Option<usize>,
    has_static: bool,
    static_error: bool,
    rejected: Vec<u64>,
}

/// In-memory operating point table
#[derive(Default)]
pub struct FakeOpp {
    state: Mutex<OppState>,
}

impl FakeOpp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enabled static point without a source node
    pub fn insert(&self, freq_hz: u64, voltage_uv: u32) {
        self.insert_point(OperatingPoint::new(freq_hz, voltage_uv));
    }

    /// Enabled static point with a source node
    pub fn insert_node(&self, freq_hz: u64, voltage_uv: u32, node: OppNode) {
        self.insert_point(OperatingPoint {
            node: Some(node),
            ..OperatingPoint::new(freq_hz, voltage_uv)
        });
    }

    fn insert_point(&self, point: OperatingPoint) {
        self.state.lock().unwrap().entries.insert(
            point.freq_hz,
            OppEntry {
                point,
                enabled: true,
                dynamic: false,
            },
        );
    }

    pub fn set_enabled(&self, freq_hz: u64, enabled: bool) {
        if let Some(entry) = self.state.lock().unwrap().entries.get_mut(&freq_hz) {
            entry.enabled = enabled;
        }
    }

    /// Report `count` points regardless of the table contents
    pub fn overstate_count(&self, count: usize) {
        self.state.lock().unwrap().overstated = Some(count);
    }

    pub fn set_static(&self, has_static: bool) {
        self.state.lock().unwrap().has_static = has_static;
    }

    pub fn set_static_error(&self) {
        self.state.lock().unwrap().static_error = true;
    }

    pub fn reject_add(&self, freq_hz: u64) {
        self.state.lock().unwrap().rejected.push(freq_hz);
    }

    /// Every point, enabled or not, as (Hz, µV)
    pub fn points(&self) -> Vec<(u64, u32)> {
        self.state
            .lock()
            .unwrap()
            .entries
            .values()
            .map(|e| (e.point.freq_hz, e.point.voltage_uv))
            .collect()
    }

    fn enabled(&self) -> Vec<OperatingPoint> {
        self.state
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|e| e.enabled)
            .map(|e| e.point)
            .collect()
    }

    fn update(&self, freq_hz: u64, f: impl FnOnce(&mut OppEntry)) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entries
            .get_mut(&freq_hz)
            .ok_or(ResourceError::NotFound)?;
        f(entry);
        Ok(())
    }
}

impl OppTable for FakeOpp {
    fn count(&self) -> usize {
        let overstated = self.state.lock().unwrap().overstated;
        overstated.unwrap_or_else(|| self.enabled().len())
    }

    fn find_ceil(&self, freq_hz: u64) -> Option<OperatingPoint> {
        self.enabled().into_iter().find(|p| p.freq_hz >= freq_hz)
    }

    fn find_floor(&self, freq_hz: u64) -> Option<OperatingPoint> {
        self.enabled().into_iter().rev().find(|p| p.freq_hz <= freq_hz)
    }

    fn find_exact(&self, freq_hz: u64) -> Option<OperatingPoint> {
        self.enabled().into_iter().find(|p| p.freq_hz == freq_hz)
    }

    fn load_static_table(&self) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.static_error {
            return Err(ConfigError::InvalidOppTable.into());
        }
        Ok(state.has_static)
    }

    fn remove_static_table(&self) {
        self.state
            .lock()
            .unwrap()
            .entries
            .retain(|_, e| e.dynamic);
    }

    fn add(&self, freq_hz: u64, voltage_uv: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.rejected.contains(&freq_hz) {
            return Err(ResourceError::OutOfMemory.into());
        }
        if state.entries.contains_key(&freq_hz) {
            return Err(ResourceError::Busy.into());
        }
        state.entries.insert(
            freq_hz,
            OppEntry {
                point: OperatingPoint::new(freq_hz, voltage_uv),
                enabled: true,
                dynamic: true,
            },
        );
        Ok(())
    }

    fn adjust_voltage(&self, freq_hz: u64, voltage_uv: u32) -> Result<()> {
        self.update(freq_hz, |e| e.point.voltage_uv = voltage_uv)
    }

    fn enable(&self, freq_hz: u64) -> Result<()> {
        self.update(freq_hz, |e| e.enabled = true)
    }

    fn disable(&self, freq_hz: u64) -> Result<()> {
        self.update(freq_hz, |e| e.enabled = false)
    }

    fn remove_all_dynamic(&self) {
        self.state
            .lock()
            .unwrap()
            .entries
            .retain(|_, e| !e.dynamic);
    }
}

// =============================================================================
// THROTTLE PLUMBING
// =============================================================================

#[derive(Default)]
struct IrqState {
    name: Option<String>,
    affinity: Option<CpuMask>,
    enables: usize,
    disables: usize,
    freed: bool,
    fail_request: bool,
    fail_affinity: bool,
}

/// Interrupt line recording every operation
pub struct FakeIrq {
    number: u32,
    state: Mutex<IrqState>,
}

impl FakeIrq {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            state: Mutex::new(IrqState::default()),
        }
    }

    pub fn fail_request(&self) {
        self.state.lock().unwrap().fail_request = true;
    }

    pub fn fail_affinity(&self) {
        self.state.lock().unwrap().fail_affinity = true;
    }

    pub fn requested_name(&self) -> Option<String> {
        self.state.lock().unwrap().name.clone()
    }

    pub fn affinity(&self) -> Option<CpuMask> {
        self.state.lock().unwrap().affinity
    }

    pub fn enables(&self) -> usize {
        self.state.lock().unwrap().enables
    }

    pub fn disables(&self) -> usize {
        self.state.lock().unwrap().disables
    }

    pub fn is_freed(&self) -> bool {
        self.state.lock().unwrap().freed
    }
}

impl InterruptLine for FakeIrq {
    fn number(&self) -> u32 {
        self.number
    }

    fn request(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_request {
            return Err(ResourceError::Busy.into());
        }
        state.name = Some(name.to_string());
        Ok(())
    }

    fn set_affinity(&self, cpus: CpuMask) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_affinity {
            return Err(ResourceError::NotFound.into());
        }
        state.affinity = Some(cpus);
        Ok(())
    }

    fn enable(&self) {
        self.state.lock().unwrap().enables += 1;
    }

    fn disable_nosync(&self) {
        self.state.lock().unwrap().disables += 1;
    }

    fn free(&self) {
        self.state.lock().unwrap().freed = true;
    }
}

/// Deferred work whose runs are driven by the test
///
/// `cancel_sync` waits for a run started through [`FakeWork::run`].
#[derive(Default)]
pub struct FakeWork {
    scheduled: Mutex<Vec<u32>>,
    cancels: AtomicUsize,
    running: Mutex<()>,
}

impl FakeWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<u32> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Execute `f` as the work body
    pub fn run(&self, f: impl FnOnce()) {
        let _running = self.running.lock().unwrap();
        f();
    }
}

impl DeferredWork for FakeWork {
    fn schedule(&self, delay_ms: u32) {
        self.scheduled.lock().unwrap().push(delay_ms);
    }

    fn cancel_sync(&self) {
        drop(self.running.lock().unwrap());
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Thermal sink, optionally parking every report on two barriers
#[derive(Default)]
pub struct FakeThermal {
    reports: Mutex<Vec<(CpuMask, u32)>>,
    gate: Option<(Arc<Barrier>, Arc<Barrier>)>,
}

impl FakeThermal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports meet `entered`, then wait on `release`
    pub fn gated(entered: Arc<Barrier>, release: Arc<Barrier>) -> Self {
        Self {
            reports: Mutex::default(),
            gate: Some((entered, release)),
        }
    }

    pub fn reports(&self) -> Vec<(CpuMask, u32)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ThermalPressureSink for FakeThermal {
    fn update(&self, cpus: CpuMask, throttled_khz: u32) {
        self.reports.lock().unwrap().push((cpus, throttled_khz));
        if let Some((entered, release)) = &self.gate {
            entered.wait();
            release.wait();
        }
    }
}

/// Interconnect voter recording requests
#[derive(Default)]
pub struct FakeBandwidth {
    requests: Mutex<Vec<(u32, u64)>>,
    fail: AtomicBool,
}

impl FakeBandwidth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<(u32, u64)> {
        self.requests.lock().unwrap().clone()
    }
}

impl BandwidthVoter for FakeBandwidth {
    fn set_bandwidth(&self, cpu: u32, freq_hz: u64) -> Result<()> {
        self.requests.lock().unwrap().push((cpu, freq_hz));
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Bandwidth);
        }
        Ok(())
    }
}

// =============================================================================
// RESOURCES
// =============================================================================

/// Resource provider handing out one shared set of fakes
pub struct FakeProvider {
    pub regs: Arc<FakeRegs>,
    acd: Mutex<Option<Arc<FakeRegs>>>,
    pub corners: Arc<FakeOpp>,
    pub cpu_opp: Arc<FakeOpp>,
    pub work: Arc<FakeWork>,
    irq: Mutex<Result<Option<Arc<FakeIrq>>>>,
    map_error: Mutex<Option<ResourceError>>,
    released: Mutex<Vec<u32>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            regs: Arc::new(FakeRegs::new()),
            acd: Mutex::new(None),
            corners: Arc::new(FakeOpp::new()),
            cpu_opp: Arc::new(FakeOpp::new()),
            work: Arc::new(FakeWork::new()),
            irq: Mutex::new(Ok(None)),
            map_error: Mutex::new(None),
            released: Mutex::default(),
        }
    }

    pub fn set_irq(&self, irq: Result<Option<Arc<FakeIrq>>>) {
        *self.irq.lock().unwrap() = irq;
    }

    /// Hand out `regs` as the ACD window of every domain
    pub fn set_acd(&self, regs: Arc<FakeRegs>) {
        *self.acd.lock().unwrap() = Some(regs);
    }

    pub fn fail_map(&self, error: ResourceError) {
        *self.map_error.lock().unwrap() = Some(error);
    }

    /// Domains released so far, in order
    pub fn released(&self) -> Vec<u32> {
        self.released.lock().unwrap().clone()
    }
}

impl ResourceProvider for FakeProvider {
    fn map_domain(&self, _index: u32) -> Result<Arc<dyn RegisterIo>> {
        if let Some(error) = *self.map_error.lock().unwrap() {
            return Err(error.into());
        }
        Ok(self.regs.clone())
    }

    fn release_domain(&self, index: u32) {
        self.released.lock().unwrap().push(index);
    }

    fn map_acd(&self, _index: u32) -> Option<Arc<dyn RegisterIo>> {
        self.acd
            .lock()
            .unwrap()
            .clone()
            .map(|regs| regs as Arc<dyn RegisterIo>)
    }

    fn corner_source(&self, _index: u32) -> Result<Arc<dyn OppTable>> {
        Ok(self.corners.clone())
    }

    fn cpu_opp_table(&self, _cpu: u32) -> Result<Arc<dyn OppTable>> {
        Ok(self.cpu_opp.clone())
    }

    fn throttle_irq(&self, _index: u32) -> Result<Option<Arc<dyn InterruptLine>>> {
        self.irq
            .lock()
            .unwrap()
            .clone()
            .map(|irq| irq.map(|irq| irq as Arc<dyn InterruptLine>))
    }

    fn deferred_work(&self, _index: u32) -> Result<Arc<dyn DeferredWork>> {
        Ok(self.work.clone())
    }
}

/// Every collaborator of a driver instance, kept for inspection
pub struct FakePlatform {
    pub provider: Arc<FakeProvider>,
    pub regs: Arc<FakeRegs>,
    pub corners: Arc<FakeOpp>,
    pub cpu_opp: Arc<FakeOpp>,
    pub work: Arc<FakeWork>,
    pub scm: Arc<FakeScm>,
    pub thermal: Arc<FakeThermal>,
    pub bandwidth: Arc<FakeBandwidth>,
    pub delay: Arc<FakeDelay>,
}

impl FakePlatform {
    pub fn new() -> Self {
        let provider = Arc::new(FakeProvider::new());
        Self {
            regs: provider.regs.clone(),
            corners: provider.corners.clone(),
            cpu_opp: provider.cpu_opp.clone(),
            work: provider.work.clone(),
            provider,
            scm: Arc::new(FakeScm::new()),
            thermal: Arc::new(FakeThermal::new()),
            bandwidth: Arc::new(FakeBandwidth::new()),
            delay: Arc::new(FakeDelay::new()),
        }
    }

    /// Add a CPR corner at `mhz`/`mv` with mem-acc level `spare`
    pub fn add_corner(&self, mhz: u64, mv: u32, spare: u32) {
        let index = self.corners.points().len() as u32;
        self.corners.insert_node(
            mhz * 1_000_000,
            mv * 1000,
            OppNode {
                pll_override: Some(0x4000 + index),
                spare_data: Some(spare),
                pll_div: None,
            },
        );
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            resources: self.provider.clone(),
            secure: self.scm.clone(),
            thermal: self.thermal.clone(),
            bandwidth: self.bandwidth.clone(),
            delay: self.delay.clone(),
        }
    }
}

// =============================================================================
// CORNER TABLES
// =============================================================================

/// Corner table with one corner per mem-acc level in `spares`
///
/// Corner `i` has virtual corner `i`, L-value `10 + i` and rising voltage.
pub fn corner_table(spares: &[u32], mem_acc_vc: Option<usize>) -> CornerTable {
    let entries: Vec<CornerEntry> = spares
        .iter()
        .enumerate()
        .map(|(i, &spare)| {
            let i = i as u32;
            CornerEntry {
                voltage_word: LUT_VOLT_VC.pack(i) | LUT_VOLT.pack(600 + 10 * i),
                freq_word: LUT_SRC_8998.pack(u32::from(i != 0))
                    | LUT_CORE_COUNT.pack(4)
                    | LUT_L_VAL.pack(10 + i),
                override_word: 0x4000 + i,
                spare_word: spare,
            }
        })
        .collect();
    CornerTable::from_entries(&entries, None, mem_acc_vc).unwrap()
}
