//! # OSM Frequency Domains
//!
//! Driver instance, per-domain bring-up and the runtime control surface.
//!
//! ```text
//!  init(policy)
//!    ├── map domain window ─────────────────────────────┐
//!    ├── related CPUs                                   │ released
//!    ├── OS-owned: synthesize + program + enable        │ on any
//!    ├── enable bit check                               │ failure
//!    ├── read back LUT, publish OPPs                    │
//!    └── throttle monitor ──────────────────────────────┘
//!
//!  target_index / fast_switch   one write to reg_perf_state
//!  get                          reg_perf_state through the frequency table
//! ```

use alloc::sync::Arc;

use crate::error::{ConfigError, Error, ResourceError, Result};
use crate::lut::{self, LutClocks};
use crate::opp::OppTable;
use crate::params::{self, SynthesisInput};
use crate::platform::{BandwidthVoter, Collaborators, DomainConfig, DriverConfig};
use crate::policy::{CpufreqDriver, Policy, CPUFREQ_ETERNAL};
use crate::regs::RegisterIo;
use crate::sequencer::Sequencer;
use crate::soc::{self, SocData};
use crate::throttle::{MonitorParts, ThrottleMonitor};

// =============================================================================
// DOMAIN
// =============================================================================

/// State of one initialized frequency domain
pub struct OsmDomain {
    index: u32,
    regs: Arc<dyn RegisterIo>,
    soc: &'static SocData,
    opp: Arc<dyn OppTable>,
    bandwidth: Arc<dyn BandwidthVoter>,
    bandwidth_scaling: bool,
    throttle: Option<Arc<ThrottleMonitor>>,
}

impl OsmDomain {
    /// Frequency domain index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Throttle monitor, when the domain has one
    ///
    /// Platform glue routes the throttle interrupt to
    /// [`ThrottleMonitor::handle_interrupt`] and the deferred work to
    /// [`ThrottleMonitor::run_deferred`].
    pub fn throttle(&self) -> Option<&Arc<ThrottleMonitor>> {
        self.throttle.as_ref()
    }

    /// Whether frequency changes also vote interconnect bandwidth
    pub fn bandwidth_scaling(&self) -> bool {
        self.bandwidth_scaling
    }

    fn set_perf_state(&self, index: usize) {
        self.regs.write32(self.soc.reg_perf_state, index as u32);
    }

    fn vote_bandwidth(&self, cpu: u32, khz: u32) -> Result<()> {
        let point = self
            .opp
            .find_exact(khz as u64 * 1000)
            .ok_or(Error::Bandwidth)?;
        self.bandwidth.set_bandwidth(cpu, point.freq_hz)
    }
}

impl core::fmt::Debug for OsmDomain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OsmDomain")
            .field("index", &self.index)
            .field("soc", &self.soc.compatible)
            .field("bandwidth_scaling", &self.bandwidth_scaling)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// OSM cpufreq driver instance
#[derive(Debug)]
pub struct OsmDriver {
    soc: &'static SocData,
    config: DriverConfig,
    cpu_hw_rate: u64,
    platform: Collaborators,
}

impl OsmDriver {
    /// Bind the driver to the variant named in `config`
    pub fn new(config: DriverConfig, platform: Collaborators) -> Result<Self> {
        let soc = soc::lookup(config.compatible).ok_or(ConfigError::UnknownPlatform)?;
        let cpu_hw_rate = config.alternate_rate / soc.alternate_divider() as u64;

        log::info!(
            "OSM: {} xo={} Hz alternate={} Hz",
            soc.compatible,
            config.xo_rate,
            cpu_hw_rate
        );

        Ok(Self {
            soc,
            config,
            cpu_hw_rate,
            platform,
        })
    }

    /// Register layout in use
    pub fn soc(&self) -> &'static SocData {
        self.soc
    }

    /// Alternate clock rate after the variant divider, in Hz
    pub fn cpu_hw_rate(&self) -> u64 {
        self.cpu_hw_rate
    }

    /// Program an OS-owned OSM from the CPR corners
    fn osm_setup(&self, domain: &DomainConfig, regs: &dyn RegisterIo) -> Result<()> {
        let corners = self.platform.resources.corner_source(domain.index)?;
        let table = params::synthesize(
            corners.as_ref(),
            &SynthesisInput {
                soc: self.soc,
                thresholds: domain.thresholds,
                cpu_count: domain.cpus.weight(),
                xo_rate: self.config.xo_rate,
            },
        )?;

        let acd = self.platform.resources.map_acd(domain.index);
        Sequencer::new(
            regs,
            self.platform.secure.as_ref(),
            self.platform.delay.as_ref(),
            self.soc,
            domain.phys_base,
        )?
        .program(&table, acd.as_deref())
    }

    fn bring_up(
        &self,
        policy: &mut Policy,
        domain: &DomainConfig,
        regs: Arc<dyn RegisterIo>,
    ) -> Result<OsmDomain> {
        if domain.cpus.is_empty() {
            log::error!("OSM: Domain-{} failed to get related CPUs", domain.index);
            return Err(ConfigError::NoRelatedCpus.into());
        }
        policy.cpus = domain.cpus;
        policy.related_cpus = domain.cpus;
        policy.dvfs_possible_from_any_cpu = true;

        if !self.soc.firmware_owned {
            self.osm_setup(domain, regs.as_ref()).map_err(|e| {
                log::error!("OSM: Cannot setup the OSM for CPU{}: {}", policy.cpu, e);
                e
            })?;
        }

        if regs.read32(self.soc.reg_enable) & 0x1 == 0 {
            log::error!("OSM: Domain-{} cpufreq hardware not enabled", domain.index);
            return Err(Error::HardwareNotEnabled);
        }

        let opp = self.platform.resources.cpu_opp_table(policy.cpu)?;
        self.publish(policy, domain, regs, &opp).map_err(|e| {
            opp.remove_all_dynamic();
            opp.remove_static_table();
            e
        })
    }

    /// Read the table back, publish it and start the throttle loop
    ///
    /// Operating points added here are left for the caller to remove on
    /// failure.
    fn publish(
        &self,
        policy: &mut Policy,
        domain: &DomainConfig,
        regs: Arc<dyn RegisterIo>,
        opp: &Arc<dyn OppTable>,
    ) -> Result<OsmDomain> {
        let readback = lut::read_lut(
            regs.as_ref(),
            self.soc,
            opp.as_ref(),
            LutClocks {
                xo_rate: self.config.xo_rate,
                cpu_hw_rate: self.cpu_hw_rate,
            },
        )
        .map_err(|e| {
            log::error!("OSM: Domain-{} failed to read LUT", domain.index);
            e
        })?;

        if opp.count() == 0 {
            log::error!("OSM: Failed to add OPPs");
            return Err(ConfigError::NoOperatingPoints.into());
        }

        policy.fast_switch_possible = readback.fast_switch_possible();
        policy.freq_table = readback.table;

        policy.transition_latency_ns = match opp.max_transition_latency_ns() {
            0 => CPUFREQ_ETERNAL,
            latency => latency,
        };

        if policy.has_boost() {
            policy.boost_supported = true;
            log::info!("OSM: Domain-{} exposes boost frequencies", domain.index);
        }

        let throttle = ThrottleMonitor::start(
            MonitorParts {
                regs: regs.clone(),
                soc: self.soc,
                freq_table: policy.freq_table.clone(),
                opp: opp.clone(),
                thermal: self.platform.thermal.clone(),
                related_cpus: policy.related_cpus,
            },
            self.platform.resources.as_ref(),
            domain.index,
            policy.cpu,
            policy.cpus,
        )?;

        Ok(OsmDomain {
            index: domain.index,
            regs,
            soc: self.soc,
            opp: opp.clone(),
            bandwidth: self.platform.bandwidth.clone(),
            bandwidth_scaling: readback.bandwidth_scaling,
            throttle,
        })
    }
}

impl CpufreqDriver for OsmDriver {
    type PData = Arc<OsmDomain>;

    fn init(&self, policy: &mut Policy) -> Result<Self::PData> {
        let domain = *self.config.domain_for_cpu(policy.cpu).ok_or_else(|| {
            log::error!("OSM: CPU{} belongs to no frequency domain", policy.cpu);
            Error::from(ResourceError::NotFound)
        })?;

        let regs = self.platform.resources.map_domain(domain.index).map_err(|e| {
            log::error!("OSM: failed to map domain {}: {}", domain.index, e);
            e
        })?;

        match self.bring_up(policy, &domain, regs) {
            Ok(data) => {
                log::info!(
                    "OSM: Domain-{} ready, {} levels",
                    domain.index,
                    policy.freq_table.len()
                );
                Ok(Arc::new(data))
            },
            Err(e) => {
                *policy = Policy::new(policy.cpu);
                self.platform.resources.release_domain(domain.index);
                Err(e)
            },
        }
    }

    fn exit(&self, policy: &mut Policy, data: Self::PData) -> Result<()> {
        data.opp.remove_all_dynamic();
        data.opp.remove_static_table();
        if let Some(throttle) = &data.throttle {
            throttle.teardown();
        }
        policy.freq_table.clear();
        self.platform.resources.release_domain(data.index);
        Ok(())
    }

    fn target_index(&self, policy: &Policy, data: &Self::PData, index: usize) -> Result<()> {
        data.set_perf_state(index);

        if data.bandwidth_scaling {
            let khz = policy.freq_table.frequency_at(index);
            if let Err(e) = data.vote_bandwidth(policy.cpu, khz) {
                log::warn!("OSM: bandwidth vote for {} kHz failed: {}", khz, e);
            }
        }
        Ok(())
    }

    fn get(&self, policy: &Policy, data: &Self::PData) -> u32 {
        lut::current_khz(data.regs.as_ref(), data.soc, &policy.freq_table)
    }

    fn fast_switch(&self, policy: &Policy, data: &Self::PData, _target_khz: u32) -> u32 {
        let index = policy.cached_resolved_idx;
        data.set_perf_state(index);
        policy.freq_table.frequency_at(index)
    }
}

// =============================================================================
// TESTS
// =============================================================================
