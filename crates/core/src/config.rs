//! Simulator configuration.
//!
//! This module defines the configuration tree used to parameterize the
//! simulator. It provides:
//! 1. **Defaults:** baseline machine constants in a `defaults` module.
//! 2. **Structures:** hierarchical config for run control, fetch, widths,
//!    window sizes, branch prediction, memory hierarchy, functional units,
//!    and threading.
//! 3. **Validation:** `SimConfig::validate` rejects malformed shapes
//!    (non-power-of-two sizes, zero latencies, out-of-range bounds) before
//!    any machine state is built.
//!
//! Configuration is supplied as JSON (serde) or built from
//! `SimConfig::default()` and adjusted field-wise by the CLI.

use crate::common::error::ConfigError;
use crate::common::{MAX_THREADS, is_pow2};
use serde::Deserialize;

/// Default configuration constants.
mod defaults {
    /// Fetch-queue capacity in instructions (power of two).
    pub const IFQ_SIZE: usize = 16;
    /// Front-end speed multiplier relative to the core.
    pub const FETCH_SPEED: u64 = 1;
    /// Extra fetch-stall cycles after an in-place misprediction recovery.
    pub const MISPRED_PENALTY: u64 = 3;
    /// Decode bandwidth in instructions per cycle.
    pub const DECODE_WIDTH: usize = 4;
    /// Issue bandwidth in instructions per cycle.
    pub const ISSUE_WIDTH: usize = 4;
    /// Commit bandwidth in instructions per cycle.
    pub const COMMIT_WIDTH: usize = 4;
    /// Reorder-buffer (RUU) capacity.
    pub const RUU_SIZE: usize = 16;
    /// Load/store queue capacity.
    pub const LSQ_SIZE: usize = 8;
    /// Bimodal predictor table size.
    pub const BIMOD_SIZE: usize = 2048;
    /// Two-level predictor level-1 table size.
    pub const TWOLEV_L1_SIZE: usize = 1;
    /// Two-level predictor level-2 table size.
    pub const TWOLEV_L2_SIZE: usize = 1024;
    /// Two-level predictor history width in bits.
    pub const TWOLEV_HIST_BITS: usize = 8;
    /// Combining predictor meta-table size.
    pub const COMB_META_SIZE: usize = 1024;
    /// Return-address-stack depth.
    pub const RAS_SIZE: usize = 8;
    /// Branch-target-buffer set count.
    pub const BTB_SETS: usize = 512;
    /// Branch-target-buffer associativity.
    pub const BTB_ASSOC: usize = 4;
    /// L1 data cache: sets.
    pub const DL1_SETS: usize = 128;
    /// L1 data cache: block size in bytes.
    pub const DL1_BSIZE: usize = 32;
    /// L1 data cache: associativity.
    pub const DL1_ASSOC: usize = 4;
    /// L1 data cache: hit latency in cycles.
    pub const DL1_LAT: u64 = 1;
    /// L2 data cache: sets.
    pub const DL2_SETS: usize = 1024;
    /// L2 data cache: block size in bytes.
    pub const DL2_BSIZE: usize = 64;
    /// L2 data cache: associativity.
    pub const DL2_ASSOC: usize = 4;
    /// L2 data cache: hit latency in cycles.
    pub const DL2_LAT: u64 = 6;
    /// L1 instruction cache: sets.
    pub const IL1_SETS: usize = 512;
    /// L1 instruction cache: block size in bytes.
    pub const IL1_BSIZE: usize = 32;
    /// L1 instruction cache: hit latency in cycles.
    pub const IL1_LAT: u64 = 1;
    /// TLB: sets for the instruction TLB.
    pub const ITLB_SETS: usize = 16;
    /// TLB: sets for the data TLB.
    pub const DTLB_SETS: usize = 32;
    /// TLB: page size in bytes.
    pub const TLB_PAGE: usize = 4096;
    /// TLB: associativity.
    pub const TLB_ASSOC: usize = 4;
    /// TLB miss latency in cycles.
    pub const TLB_MISS_LAT: u64 = 30;
    /// Main-memory latency: first chunk.
    pub const MEM_LAT_FIRST: u64 = 18;
    /// Main-memory latency: each additional chunk.
    pub const MEM_LAT_NEXT: u64 = 2;
    /// Memory bus width in bytes.
    pub const MEM_BUS_WIDTH: u64 = 8;
    /// Integer ALU count.
    pub const RES_IALU: usize = 4;
    /// Integer multiplier/divider count.
    pub const RES_IMULT: usize = 1;
    /// Memory port count.
    pub const RES_MEMPORT: usize = 2;
    /// FP adder count.
    pub const RES_FPALU: usize = 4;
    /// FP multiplier/divider count.
    pub const RES_FPMULT: usize = 1;
    /// Simultaneous live threads.
    pub const MAX_LIVE_THREADS: usize = 4;
    /// Consecutive fetches on one thread before the arbiter switches.
    pub const FETCHES_BEFORE_SWITCH: u64 = 4;
}

/// Branch predictor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BpredKind {
    /// Always predict not-taken.
    NotTaken,
    /// Always predict taken (through the BTB).
    Taken,
    /// Oracle prediction; mispredictions never occur.
    Perfect,
    /// Bimodal two-bit counter table.
    #[default]
    Bimod,
    /// Two-level adaptive predictor.
    #[serde(rename = "2lev")]
    TwoLev,
    /// Combining predictor (bimodal + two-level with a meta chooser).
    Comb,
}

impl BpredKind {
    /// Parses a predictor name as spelled on the command line.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        Ok(match name {
            "nottaken" => Self::NotTaken,
            "taken" => Self::Taken,
            "perfect" => Self::Perfect,
            "bimod" => Self::Bimod,
            "2lev" => Self::TwoLev,
            "comb" => Self::Comb,
            _ => {
                return Err(ConfigError::UnknownName {
                    what: "branch predictor",
                    got: name.to_string(),
                });
            }
        })
    }
}

/// When speculative predictor updates are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpecUpdate {
    /// At dispatch (instruction decode).
    Id,
    /// At writeback.
    Wb,
    /// At commit only (non-speculative).
    #[default]
    Ct,
}

impl SpecUpdate {
    /// Parses a policy name as spelled on the command line.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        Ok(match name {
            "ID" | "id" => Self::Id,
            "WB" | "wb" => Self::Wb,
            "CT" | "ct" => Self::Ct,
            _ => {
                return Err(ConfigError::UnknownName {
                    what: "bpred spec-update policy",
                    got: name.to_string(),
                });
            }
        })
    }
}

/// Cache replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Least recently used.
    #[default]
    Lru,
    /// First in, first out.
    Fifo,
    /// Pseudo-random.
    Random,
}

impl CachePolicy {
    /// Parses the single-letter policy code used in cache config strings.
    pub fn parse(code: &str) -> Result<Self, ConfigError> {
        Ok(match code {
            "l" | "lru" => Self::Lru,
            "f" | "fifo" => Self::Fifo,
            "r" | "random" => Self::Random,
            _ => {
                return Err(ConfigError::UnknownName {
                    what: "cache replacement policy",
                    got: code.to_string(),
                });
            }
        })
    }
}

/// Run control.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Stop after this many committed instructions (0 = unlimited).
    #[serde(default)]
    pub max_insts: u64,
    /// Functionally execute this many instructions before timing starts.
    #[serde(default)]
    pub fastfwd: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_insts: 0,
            fastfwd: 0,
        }
    }
}

/// Front-end configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Fetch-queue capacity (power of two).
    #[serde(default = "FetchConfig::default_ifq_size")]
    pub ifq_size: usize,
    /// Front-end speed multiplier.
    #[serde(default = "FetchConfig::default_speed")]
    pub speed: u64,
    /// Fetch-stall cycles charged on in-place misprediction recovery.
    #[serde(default = "FetchConfig::default_mispred_penalty")]
    pub mispred_penalty: u64,
}

impl FetchConfig {
    fn default_ifq_size() -> usize {
        defaults::IFQ_SIZE
    }
    fn default_speed() -> u64 {
        defaults::FETCH_SPEED
    }
    fn default_mispred_penalty() -> u64 {
        defaults::MISPRED_PENALTY
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            ifq_size: defaults::IFQ_SIZE,
            speed: defaults::FETCH_SPEED,
            mispred_penalty: defaults::MISPRED_PENALTY,
        }
    }
}

/// Per-cycle bandwidths and issue policy.
#[derive(Debug, Clone, Deserialize)]
pub struct WidthConfig {
    /// Decode/dispatch bandwidth (power of two).
    #[serde(default = "WidthConfig::default_decode")]
    pub decode: usize,
    /// Issue bandwidth (power of two).
    #[serde(default = "WidthConfig::default_issue")]
    pub issue: usize,
    /// Commit bandwidth (power of two).
    #[serde(default = "WidthConfig::default_commit")]
    pub commit: usize,
    /// Force strict in-order issue.
    #[serde(default)]
    pub inorder_issue: bool,
    /// Dispatch instructions on mis-speculated paths (wrong-path issue).
    #[serde(default = "WidthConfig::default_include_spec")]
    pub include_spec: bool,
}

impl WidthConfig {
    fn default_decode() -> usize {
        defaults::DECODE_WIDTH
    }
    fn default_issue() -> usize {
        defaults::ISSUE_WIDTH
    }
    fn default_commit() -> usize {
        defaults::COMMIT_WIDTH
    }
    fn default_include_spec() -> bool {
        true
    }
}

impl Default for WidthConfig {
    fn default() -> Self {
        Self {
            decode: defaults::DECODE_WIDTH,
            issue: defaults::ISSUE_WIDTH,
            commit: defaults::COMMIT_WIDTH,
            inorder_issue: false,
            include_spec: true,
        }
    }
}

/// Instruction window sizes.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    /// Reorder-buffer (RUU) capacity (power of two, ≥ 2).
    #[serde(default = "WindowConfig::default_ruu")]
    pub ruu_size: usize,
    /// Load/store queue capacity (power of two, ≥ 2).
    #[serde(default = "WindowConfig::default_lsq")]
    pub lsq_size: usize,
}

impl WindowConfig {
    fn default_ruu() -> usize {
        defaults::RUU_SIZE
    }
    fn default_lsq() -> usize {
        defaults::LSQ_SIZE
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            ruu_size: defaults::RUU_SIZE,
            lsq_size: defaults::LSQ_SIZE,
        }
    }
}

/// Branch predictor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BpredConfig {
    /// Predictor algorithm.
    #[serde(default)]
    pub kind: BpredKind,
    /// Bimodal table size.
    #[serde(default = "BpredConfig::default_bimod")]
    pub bimod_size: usize,
    /// Two-level: level-1 history table size.
    #[serde(default = "BpredConfig::default_l1")]
    pub twolev_l1_size: usize,
    /// Two-level: level-2 counter table size.
    #[serde(default = "BpredConfig::default_l2")]
    pub twolev_l2_size: usize,
    /// Two-level: history width in bits.
    #[serde(default = "BpredConfig::default_hist")]
    pub twolev_hist_bits: usize,
    /// Two-level: XOR the history with the PC when indexing.
    #[serde(default)]
    pub twolev_xor: bool,
    /// Combining predictor meta-table size.
    #[serde(default = "BpredConfig::default_meta")]
    pub comb_meta_size: usize,
    /// Return-address-stack depth.
    #[serde(default = "BpredConfig::default_ras")]
    pub ras_size: usize,
    /// BTB set count.
    #[serde(default = "BpredConfig::default_btb_sets")]
    pub btb_sets: usize,
    /// BTB associativity.
    #[serde(default = "BpredConfig::default_btb_assoc")]
    pub btb_assoc: usize,
    /// When speculative predictor updates fire.
    #[serde(default)]
    pub spec_update: SpecUpdate,
}

impl BpredConfig {
    fn default_bimod() -> usize {
        defaults::BIMOD_SIZE
    }
    fn default_l1() -> usize {
        defaults::TWOLEV_L1_SIZE
    }
    fn default_l2() -> usize {
        defaults::TWOLEV_L2_SIZE
    }
    fn default_hist() -> usize {
        defaults::TWOLEV_HIST_BITS
    }
    fn default_meta() -> usize {
        defaults::COMB_META_SIZE
    }
    fn default_ras() -> usize {
        defaults::RAS_SIZE
    }
    fn default_btb_sets() -> usize {
        defaults::BTB_SETS
    }
    fn default_btb_assoc() -> usize {
        defaults::BTB_ASSOC
    }
}

impl Default for BpredConfig {
    fn default() -> Self {
        Self {
            kind: BpredKind::default(),
            bimod_size: defaults::BIMOD_SIZE,
            twolev_l1_size: defaults::TWOLEV_L1_SIZE,
            twolev_l2_size: defaults::TWOLEV_L2_SIZE,
            twolev_hist_bits: defaults::TWOLEV_HIST_BITS,
            twolev_xor: false,
            comb_meta_size: defaults::COMB_META_SIZE,
            ras_size: defaults::RAS_SIZE,
            btb_sets: defaults::BTB_SETS,
            btb_assoc: defaults::BTB_ASSOC,
            spec_update: SpecUpdate::default(),
        }
    }
}

/// One cache level.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Enable this cache.
    #[serde(default = "CacheConfig::default_enabled")]
    pub enabled: bool,
    /// Set count (power of two).
    pub sets: usize,
    /// Block size in bytes (power of two).
    pub bsize: usize,
    /// Associativity.
    pub assoc: usize,
    /// Replacement policy.
    #[serde(default)]
    pub policy: CachePolicy,
    /// Hit latency in cycles.
    pub hit_lat: u64,
}

impl CacheConfig {
    fn default_enabled() -> bool {
        true
    }

    /// Parses a `sets:bsize:assoc:policy` cache description string, or
    /// `none` for a disabled cache.
    pub fn parse(spec: &str, hit_lat: u64) -> Result<Self, ConfigError> {
        if spec == "none" {
            return Ok(Self {
                enabled: false,
                sets: 1,
                bsize: 1,
                assoc: 1,
                policy: CachePolicy::Lru,
                hit_lat,
            });
        }
        let parts: Vec<&str> = spec.split(':').collect();
        if parts.len() != 4 {
            return Err(ConfigError::UnknownName {
                what: "cache configuration",
                got: spec.to_string(),
            });
        }
        let num = |s: &str| -> Result<usize, ConfigError> {
            s.parse().map_err(|_| ConfigError::UnknownName {
                what: "cache configuration",
                got: spec.to_string(),
            })
        };
        Ok(Self {
            enabled: true,
            sets: num(parts[0])?,
            bsize: num(parts[1])?,
            assoc: num(parts[2])?,
            policy: CachePolicy::parse(parts[3])?,
            hit_lat,
        })
    }
}

/// Instruction-cache level selection: its own cache, an alias onto the data
/// hierarchy, or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcacheSel {
    /// This level has its own cache (see the paired `CacheConfig`).
    #[default]
    Own,
    /// Route instruction accesses through the L1 data cache.
    Dl1,
    /// Route instruction accesses through the L2 data cache.
    Dl2,
    /// No cache at this level.
    None,
}

/// Memory hierarchy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemConfig {
    /// L1 data cache.
    #[serde(default = "MemConfig::default_dl1")]
    pub dl1: CacheConfig,
    /// L2 data cache.
    #[serde(default = "MemConfig::default_dl2")]
    pub dl2: CacheConfig,
    /// L1 instruction cache selection.
    #[serde(default)]
    pub il1_sel: IcacheSel,
    /// L1 instruction cache (when `il1_sel` is `Own`).
    #[serde(default = "MemConfig::default_il1")]
    pub il1: CacheConfig,
    /// L2 instruction cache selection (default: unified with L2 data).
    #[serde(default = "MemConfig::default_il2_sel")]
    pub il2_sel: IcacheSel,
    /// L2 instruction cache (when `il2_sel` is `Own`).
    #[serde(default = "MemConfig::default_dl2")]
    pub il2: CacheConfig,
    /// Instruction TLB (disabled with `enabled: false`).
    #[serde(default = "MemConfig::default_itlb")]
    pub itlb: CacheConfig,
    /// Data TLB.
    #[serde(default = "MemConfig::default_dtlb")]
    pub dtlb: CacheConfig,
    /// TLB miss latency in cycles.
    #[serde(default = "MemConfig::default_tlb_miss")]
    pub tlb_miss_lat: u64,
    /// Main-memory latency: first chunk, then per additional chunk.
    #[serde(default = "MemConfig::default_mem_lat")]
    pub mem_lat: [u64; 2],
    /// Memory bus width in bytes.
    #[serde(default = "MemConfig::default_bus_width")]
    pub bus_width: u64,
}

impl MemConfig {
    fn default_dl1() -> CacheConfig {
        CacheConfig {
            enabled: true,
            sets: defaults::DL1_SETS,
            bsize: defaults::DL1_BSIZE,
            assoc: defaults::DL1_ASSOC,
            policy: CachePolicy::Lru,
            hit_lat: defaults::DL1_LAT,
        }
    }
    fn default_dl2() -> CacheConfig {
        CacheConfig {
            enabled: true,
            sets: defaults::DL2_SETS,
            bsize: defaults::DL2_BSIZE,
            assoc: defaults::DL2_ASSOC,
            policy: CachePolicy::Lru,
            hit_lat: defaults::DL2_LAT,
        }
    }
    fn default_il1() -> CacheConfig {
        CacheConfig {
            enabled: true,
            sets: defaults::IL1_SETS,
            bsize: defaults::IL1_BSIZE,
            assoc: 1,
            policy: CachePolicy::Lru,
            hit_lat: defaults::IL1_LAT,
        }
    }
    fn default_il2_sel() -> IcacheSel {
        IcacheSel::Dl2
    }
    fn default_itlb() -> CacheConfig {
        CacheConfig {
            enabled: true,
            sets: defaults::ITLB_SETS,
            bsize: defaults::TLB_PAGE,
            assoc: defaults::TLB_ASSOC,
            policy: CachePolicy::Lru,
            hit_lat: 1,
        }
    }
    fn default_dtlb() -> CacheConfig {
        CacheConfig {
            enabled: true,
            sets: defaults::DTLB_SETS,
            bsize: defaults::TLB_PAGE,
            assoc: defaults::TLB_ASSOC,
            policy: CachePolicy::Lru,
            hit_lat: 1,
        }
    }
    fn default_tlb_miss() -> u64 {
        defaults::TLB_MISS_LAT
    }
    fn default_mem_lat() -> [u64; 2] {
        [defaults::MEM_LAT_FIRST, defaults::MEM_LAT_NEXT]
    }
    fn default_bus_width() -> u64 {
        defaults::MEM_BUS_WIDTH
    }
}

impl Default for MemConfig {
    fn default() -> Self {
        Self {
            dl1: Self::default_dl1(),
            dl2: Self::default_dl2(),
            il1_sel: IcacheSel::Own,
            il1: Self::default_il1(),
            il2_sel: IcacheSel::Dl2,
            il2: Self::default_dl2(),
            itlb: Self::default_itlb(),
            dtlb: Self::default_dtlb(),
            tlb_miss_lat: defaults::TLB_MISS_LAT,
            mem_lat: Self::default_mem_lat(),
            bus_width: defaults::MEM_BUS_WIDTH,
        }
    }
}

/// Functional-unit counts.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    /// Integer ALUs.
    #[serde(default = "ResourceConfig::default_ialu")]
    pub ialu: usize,
    /// Integer multiplier/dividers.
    #[serde(default = "ResourceConfig::default_imult")]
    pub imult: usize,
    /// Memory ports.
    #[serde(default = "ResourceConfig::default_memport")]
    pub memport: usize,
    /// FP adders.
    #[serde(default = "ResourceConfig::default_fpalu")]
    pub fpalu: usize,
    /// FP multiplier/dividers.
    #[serde(default = "ResourceConfig::default_fpmult")]
    pub fpmult: usize,
}

impl ResourceConfig {
    fn default_ialu() -> usize {
        defaults::RES_IALU
    }
    fn default_imult() -> usize {
        defaults::RES_IMULT
    }
    fn default_memport() -> usize {
        defaults::RES_MEMPORT
    }
    fn default_fpalu() -> usize {
        defaults::RES_FPALU
    }
    fn default_fpmult() -> usize {
        defaults::RES_FPMULT
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            ialu: defaults::RES_IALU,
            imult: defaults::RES_IMULT,
            memport: defaults::RES_MEMPORT,
            fpalu: defaults::RES_FPALU,
            fpmult: defaults::RES_FPMULT,
        }
    }
}

/// Speculative-multithreading configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadConfig {
    /// Simultaneous live threads (≤ 16).
    #[serde(default = "ThreadConfig::default_max_threads")]
    pub max_threads: usize,
    /// Fetch-stall cycles charged per successful fork.
    #[serde(default)]
    pub fork_penalty: u64,
    /// Consecutive fetches on one thread before the arbiter switches.
    #[serde(default = "ThreadConfig::default_quota")]
    pub max_fetches_before_switch: u64,
}

impl ThreadConfig {
    fn default_max_threads() -> usize {
        defaults::MAX_LIVE_THREADS
    }
    fn default_quota() -> u64 {
        defaults::FETCHES_BEFORE_SWITCH
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            max_threads: defaults::MAX_LIVE_THREADS,
            fork_penalty: 0,
            max_fetches_before_switch: defaults::FETCHES_BEFORE_SWITCH,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Run control (instruction budget, fast-forward).
    pub run: RunConfig,
    /// Front-end configuration.
    pub fetch: FetchConfig,
    /// Bandwidths and issue policy.
    pub width: WidthConfig,
    /// Instruction window sizes.
    pub window: WindowConfig,
    /// Branch predictor.
    pub bpred: BpredConfig,
    /// Memory hierarchy.
    pub mem: MemConfig,
    /// Functional-unit counts.
    pub res: ResourceConfig,
    /// Threading and forking.
    pub threads: ThreadConfig,
}

impl SimConfig {
    /// Validates the configuration, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pow2 = |name: &'static str, v: usize| -> Result<(), ConfigError> {
            if !is_pow2(v as u64) {
                Err(ConfigError::NotPowerOfTwo {
                    name,
                    value: v as u64,
                })
            } else {
                Ok(())
            }
        };

        pow2("fetch:ifqsize", self.fetch.ifq_size)?;
        pow2("decode:width", self.width.decode)?;
        pow2("issue:width", self.width.issue)?;
        pow2("commit:width", self.width.commit)?;
        pow2("ruu:size", self.window.ruu_size)?;
        pow2("lsq:size", self.window.lsq_size)?;
        if self.window.ruu_size < 2 {
            return Err(ConfigError::TooSmall {
                name: "ruu:size",
                value: self.window.ruu_size as u64,
                min: 2,
            });
        }
        if self.window.lsq_size < 2 {
            return Err(ConfigError::TooSmall {
                name: "lsq:size",
                value: self.window.lsq_size as u64,
                min: 2,
            });
        }
        if self.fetch.speed == 0 {
            return Err(ConfigError::Zero("fetch:speed"));
        }
        if self.threads.max_threads == 0 {
            return Err(ConfigError::Zero("max:threads"));
        }
        if self.threads.max_threads > MAX_THREADS {
            return Err(ConfigError::OutOfRange {
                name: "max:threads",
                value: self.threads.max_threads as u64,
                max: MAX_THREADS as u64,
            });
        }
        if self.threads.max_fetches_before_switch == 0 {
            return Err(ConfigError::Zero("max:fetches_before_switch"));
        }
        if self.res.ialu == 0 {
            return Err(ConfigError::Zero("res:ialu"));
        }
        if self.res.memport == 0 {
            return Err(ConfigError::Zero("res:memport"));
        }
        if self.mem.mem_lat[0] == 0 {
            return Err(ConfigError::Zero("mem:lat"));
        }
        if self.mem.bus_width == 0 {
            return Err(ConfigError::Zero("mem:width"));
        }
        for (name, c) in [
            ("cache:dl1", &self.mem.dl1),
            ("cache:dl2", &self.mem.dl2),
            ("cache:il1", &self.mem.il1),
            ("cache:il2", &self.mem.il2),
            ("tlb:itlb", &self.mem.itlb),
            ("tlb:dtlb", &self.mem.dtlb),
        ] {
            if c.enabled {
                pow2(name, c.sets)?;
                pow2(name, c.bsize)?;
                if c.assoc == 0 {
                    return Err(ConfigError::Zero(name));
                }
                if c.hit_lat == 0 {
                    return Err(ConfigError::Zero(name));
                }
            }
        }
        pow2("bpred:bimod", self.bpred.bimod_size)?;
        pow2("bpred:2lev:l2", self.bpred.twolev_l2_size)?;
        pow2("bpred:btb:sets", self.bpred.btb_sets)?;
        if self.bpred.ras_size == 0 {
            return Err(ConfigError::Zero("bpred:ras"));
        }
        Ok(())
    }
}
