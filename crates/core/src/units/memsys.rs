//! Memory-hierarchy latency model.
//!
//! Chains the cache levels into the `access(cmd, addr, size, now) → cycles`
//! contract the pipeline consumes: an L1 miss pays the L2 access, an L2 miss
//! pays the chunked DRAM latency. Instruction levels may be distinct caches
//! or aliases onto the data hierarchy. TLB probes return their hit latency
//! or the configured miss latency.

use crate::common::{Addr, Cycle};
use crate::config::{IcacheSel, MemConfig};
use crate::units::cache::{Cache, MemCmd};

/// The simulated memory hierarchy.
pub struct MemSys {
    dl1: Option<Cache>,
    dl2: Option<Cache>,
    il1: Option<Cache>,
    il2: Option<Cache>,
    il1_sel: IcacheSel,
    il2_sel: IcacheSel,
    itlb: Option<Cache>,
    dtlb: Option<Cache>,
    tlb_miss_lat: u64,
    mem_lat: [u64; 2],
    bus_width: u64,
}

impl MemSys {
    /// Builds the hierarchy from configuration.
    pub fn new(cfg: &MemConfig) -> Self {
        let build = |c: &crate::config::CacheConfig| c.enabled.then(|| Cache::new(c));
        Self {
            dl1: build(&cfg.dl1),
            dl2: build(&cfg.dl2),
            il1: (cfg.il1_sel == IcacheSel::Own)
                .then(|| build(&cfg.il1))
                .flatten(),
            il2: (cfg.il2_sel == IcacheSel::Own)
                .then(|| build(&cfg.il2))
                .flatten(),
            il1_sel: cfg.il1_sel,
            il2_sel: cfg.il2_sel,
            itlb: build(&cfg.itlb),
            dtlb: build(&cfg.dtlb),
            tlb_miss_lat: cfg.tlb_miss_lat,
            mem_lat: cfg.mem_lat,
            bus_width: cfg.bus_width,
        }
    }

    /// Chunked main-memory latency for a transfer of `size` bytes.
    pub fn mem_latency(&self, size: u64) -> u64 {
        let chunks = size.div_ceil(self.bus_width).max(1);
        self.mem_lat[0] + self.mem_lat[1] * (chunks - 1)
    }

    /// L1 data-cache hit latency (the no-miss baseline for loads).
    pub fn dl1_hit_lat(&self) -> u64 {
        self.dl1.as_ref().map_or(1, |c| c.hit_lat)
    }

    /// L1 instruction hit latency (the no-stall baseline for fetch).
    pub fn il1_hit_lat(&self) -> u64 {
        match self.il1_sel {
            IcacheSel::Own => self.il1.as_ref().map_or(1, |c| c.hit_lat),
            IcacheSel::Dl1 => self.dl1_hit_lat(),
            IcacheSel::Dl2 => self.dl2.as_ref().map_or(1, |c| c.hit_lat),
            IcacheSel::None => 1,
        }
    }

    /// Latency beyond L1 for a data access: the L2 (or memory) path. A miss
    /// in the last cache level refills a full block from memory.
    fn data_l2_latency(&mut self, addr: Addr, size: u64) -> u64 {
        let (lat0, lat1, bus) = (self.mem_lat[0], self.mem_lat[1], self.bus_width);
        let mem = move |sz: u64| lat0 + lat1 * (sz.div_ceil(bus).max(1) - 1);
        match &mut self.dl2 {
            Some(dl2) => {
                if dl2.probe(addr) {
                    dl2.hit_lat
                } else {
                    dl2.hit_lat + mem(dl2.bsize())
                }
            }
            None => mem(size),
        }
    }

    /// Data access latency through the data hierarchy.
    pub fn data_access(&mut self, _cmd: MemCmd, addr: Addr, size: u64, _now: Cycle) -> u64 {
        match &mut self.dl1 {
            Some(dl1) => {
                let hit = dl1.probe(addr);
                let l1_lat = dl1.hit_lat;
                if hit {
                    l1_lat
                } else {
                    l1_lat + self.data_l2_latency(addr, size)
                }
            }
            None => self.mem_latency(size),
        }
    }

    /// Instruction access latency through the instruction hierarchy.
    pub fn inst_access(&mut self, addr: Addr, size: u64, now: Cycle) -> u64 {
        match self.il1_sel {
            IcacheSel::Dl1 => self.data_access(MemCmd::Read, addr, size, now),
            IcacheSel::Dl2 => {
                let lat = self.data_l2_latency(addr, size);
                lat.max(1)
            }
            IcacheSel::None => self.mem_latency(size),
            IcacheSel::Own => {
                let (hit, l1_lat) = match &mut self.il1 {
                    Some(il1) => (il1.probe(addr), il1.hit_lat),
                    None => return self.mem_latency(size),
                };
                if hit {
                    return l1_lat;
                }
                let miss = match self.il2_sel {
                    IcacheSel::Own => match &mut self.il2 {
                        Some(il2) => {
                            if il2.probe(addr) {
                                il2.hit_lat
                            } else {
                                il2.hit_lat + self.mem_lat[0] + self.mem_lat[1]
                            }
                        }
                        None => self.mem_latency(size),
                    },
                    IcacheSel::Dl1 => self.data_access(MemCmd::Read, addr, size, now),
                    IcacheSel::Dl2 => self.data_l2_latency(addr, size),
                    IcacheSel::None => self.mem_latency(size),
                };
                l1_lat + miss
            }
        }
    }

    /// Instruction-TLB probe latency.
    pub fn itlb_access(&mut self, addr: Addr, _now: Cycle) -> u64 {
        match &mut self.itlb {
            Some(tlb) => {
                if tlb.probe(addr) {
                    tlb.hit_lat
                } else {
                    self.tlb_miss_lat
                }
            }
            None => 1,
        }
    }

    /// Data-TLB probe latency.
    pub fn dtlb_access(&mut self, addr: Addr, _now: Cycle) -> u64 {
        match &mut self.dtlb {
            Some(tlb) => {
                if tlb.probe(addr) {
                    tlb.hit_lat
                } else {
                    self.tlb_miss_lat
                }
            }
            None => 1,
        }
    }

    /// True when a data TLB is configured.
    pub fn has_dtlb(&self) -> bool {
        self.dtlb.is_some()
    }

    /// True when an L1 data cache is configured.
    pub fn has_dl1(&self) -> bool {
        self.dl1.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemConfig;

    fn memsys() -> MemSys {
        MemSys::new(&MemConfig::default())
    }

    #[test]
    fn test_mem_latency_chunks() {
        let m = memsys();
        // 8-byte bus: one chunk.
        assert_eq!(m.mem_latency(8), 18);
        assert_eq!(m.mem_latency(32), 18 + 2 * 3);
    }

    #[test]
    fn test_dcache_warms_up() {
        let mut m = memsys();
        let cold = m.data_access(MemCmd::Read, 0x2000, 8, 0);
        let warm = m.data_access(MemCmd::Read, 0x2000, 8, 1);
        assert!(cold > warm);
        assert_eq!(warm, m.dl1_hit_lat());
    }

    #[test]
    fn test_icache_warms_up() {
        let mut m = memsys();
        let cold = m.inst_access(0x1000, 8, 0);
        let warm = m.inst_access(0x1000, 8, 1);
        assert!(cold > warm);
        assert_eq!(warm, m.il1_hit_lat());
    }

    #[test]
    fn test_tlb_miss_costs_miss_latency() {
        let mut m = memsys();
        assert_eq!(m.dtlb_access(0x5000, 0), 30);
        assert_eq!(m.dtlb_access(0x5000, 1), 1);
    }
}
